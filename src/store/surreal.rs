use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::Store;
use crate::db::{DatabaseConfig, Db, create_connection, ensure_schema};

/// Store backed by SurrealDB (embedded `memory` or `surrealkv` engine, or a
/// remote server).
#[derive(Clone)]
pub struct SurrealStore {
    db: Db,
}

#[derive(Debug, Deserialize)]
struct StoredRow {
    key: String,
    value: String,
}

impl StoredRow {
    fn decode(self) -> Result<(String, Value)> {
        let value = serde_json::from_str(&self.value)
            .with_context(|| format!("stored value at {} is not JSON", self.key))?;
        Ok((self.key, value))
    }
}

impl SurrealStore {
    /// Wrap an existing connection. The schema must already exist.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Connect and make sure the `resource` table is defined.
    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        let db = create_connection(config).await?;
        ensure_schema(&db).await?;
        Ok(Self { db })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

#[async_trait]
impl Store for SurrealStore {
    async fn put(&self, key: &str, value: Value) -> Result<()> {
        let text = serde_json::to_string(&value)?;

        self.db
            .query(
                r#"
                UPSERT type::thing('resource', $key) CONTENT {
                    key: $key,
                    value: $value
                }
                "#,
            )
            .bind(("key", key.to_string()))
            .bind(("value", text))
            .await?
            .check()?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut res = self
            .db
            .query("SELECT key, value FROM type::thing('resource', $key)")
            .bind(("key", key.to_string()))
            .await?;

        let row: Option<StoredRow> = res.take(0)?;
        row.map(|r| r.decode().map(|(_, value)| value)).transpose()
    }

    async fn list(&self, prefix: &str) -> Result<BTreeMap<String, Value>> {
        let mut res = self
            .db
            .query(
                r#"
                SELECT key, value FROM resource
                WHERE string::starts_with(key, $prefix)
                ORDER BY key
                "#,
            )
            .bind(("prefix", prefix.to_string()))
            .await?;

        let rows: Vec<StoredRow> = res.take(0)?;
        rows.into_iter().map(StoredRow::decode).collect()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.db
            .query("DELETE type::thing('resource', $key)")
            .bind(("key", key.to_string()))
            .await?
            .check()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup_test_store() -> SurrealStore {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        SurrealStore::connect(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_surrealkv_store_writes_to_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cluster.db");
        let config = DatabaseConfig {
            url: crate::db::local_db_url(&path),
            ..Default::default()
        };
        let store = SurrealStore::connect(config).await.unwrap();

        store
            .put("nodes/node-a", json!({"metadata": {"name": "node-a"}}))
            .await
            .unwrap();
        let listed = store.list("nodes/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_put_overwrites_and_get_round_trips() {
        let store = setup_test_store().await;

        store
            .put("nodes/node-a", json!({"metadata": {"name": "node-a"}}))
            .await
            .unwrap();
        store
            .put("nodes/node-a", json!({"metadata": {"name": "node-a"}, "spec": {}}))
            .await
            .unwrap();

        let value = store.get("nodes/node-a").await.unwrap().unwrap();
        assert_eq!(value, json!({"metadata": {"name": "node-a"}, "spec": {}}));
        assert!(store.get("nodes/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_prefix_is_ordered() {
        let store = setup_test_store().await;
        store.put("pods/default/web-b", json!(2)).await.unwrap();
        store.put("pods/default/web-a", json!(1)).await.unwrap();
        store.put("pods/other/web-c", json!(3)).await.unwrap();

        let listed = store.list("pods/default/").await.unwrap();
        let keys: Vec<&str> = listed.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["pods/default/web-a", "pods/default/web-b"]);
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let store = setup_test_store().await;
        store.put("nodes/node-a", json!({})).await.unwrap();

        store.delete("nodes/node-a").await.unwrap();
        store.delete("nodes/node-a").await.unwrap();
        assert!(store.get("nodes/node-a").await.unwrap().is_none());
    }
}
