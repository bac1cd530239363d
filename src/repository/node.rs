use std::sync::Arc;

use super::{decode, encode, wrong_kind};
use crate::error::{OrchestratorError, ResourceKind, Result};
use crate::model::{Node, Resource};
use crate::store::Store;

const PREFIX: &str = "nodes/";

#[derive(Clone)]
pub struct NodeRepository {
    store: Arc<dyn Store>,
}

impl NodeRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert or overwrite a node record.
    pub async fn save(&self, node: &Node) -> Result<()> {
        let value = encode(Resource::Node(node.clone()))?;
        self.store
            .put(&node.key(), value)
            .await
            .map_err(OrchestratorError::store)
    }

    pub async fn find(&self, name: &str) -> Result<Option<Node>> {
        let key = Node::key_for(name);
        let value = self
            .store
            .get(&key)
            .await
            .map_err(OrchestratorError::store)?;

        value.map(|v| Self::decode_node(&key, v)).transpose()
    }

    /// All nodes ordered by name. This is the candidate list the scheduler
    /// rotates over.
    pub async fn list(&self) -> Result<Vec<Node>> {
        let entries = self
            .store
            .list(PREFIX)
            .await
            .map_err(OrchestratorError::store)?;

        let mut nodes = entries
            .into_iter()
            .map(|(key, value)| Self::decode_node(&key, value))
            .collect::<Result<Vec<_>>>()?;
        nodes.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(nodes)
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.store
            .delete(&Node::key_for(name))
            .await
            .map_err(OrchestratorError::store)
    }

    fn decode_node(key: &str, value: serde_json::Value) -> Result<Node> {
        match decode(key, value)? {
            Resource::Node(node) => Ok(node),
            other => Err(wrong_kind(key, ResourceKind::Node, &other)),
        }
    }
}
