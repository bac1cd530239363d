use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::Store;

/// Process-local store. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, Value>> {
        let data = self.data.read().await;
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.data.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        store.put("nodes/a", json!({"n": 1})).await.unwrap();

        assert_eq!(store.get("nodes/a").await.unwrap(), Some(json!({"n": 1})));
        assert_eq!(store.get("nodes/b").await.unwrap(), None);

        store.delete("nodes/a").await.unwrap();
        store.delete("nodes/a").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_respects_prefix_boundary() {
        let store = MemoryStore::new();
        store.put("pods/default/b", json!(2)).await.unwrap();
        store.put("pods/default/a", json!(1)).await.unwrap();
        store.put("pods/defaults/x", json!(3)).await.unwrap();
        store.put("nodes/n1", json!(4)).await.unwrap();

        let listed = store.list("pods/default/").await.unwrap();
        let keys: Vec<&str> = listed.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["pods/default/a", "pods/default/b"]);

        assert_eq!(store.list("pods/").await.unwrap().len(), 3);
        assert_eq!(store.len().await, 4);
    }
}
