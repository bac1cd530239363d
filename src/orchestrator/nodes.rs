use crate::error::{OrchestratorError, ResourceKind, Result};
use crate::model::Node;
use crate::repository::NodeRepository;

/// Registration and lookup of scheduling targets.
///
/// Nodes carry no back-reference to their pods; removing a node leaves any
/// pods assigned to it untouched.
#[derive(Clone)]
pub struct NodeManager {
    nodes: NodeRepository,
}

impl NodeManager {
    pub fn new(nodes: NodeRepository) -> Self {
        Self { nodes }
    }

    pub async fn register_node(&self, node: Node) -> Result<Node> {
        if self.nodes.find(node.name().as_str()).await?.is_some() {
            return Err(OrchestratorError::already_exists(
                ResourceKind::Node,
                node.name().as_str(),
            ));
        }

        self.nodes.save(&node).await?;
        tracing::info!("Registered node {}", node.name());
        Ok(node)
    }

    pub async fn get_node(&self, name: &str) -> Result<Option<Node>> {
        self.nodes.find(name).await
    }

    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.nodes.list().await
    }

    /// Replace a stored node; the name always comes from `name`.
    pub async fn update_node(&self, name: &str, mut node: Node) -> Result<Node> {
        if self.nodes.find(name).await?.is_none() {
            return Err(OrchestratorError::not_found(ResourceKind::Node, name));
        }

        node.metadata.name = name.into();
        self.nodes.save(&node).await?;
        Ok(node)
    }

    pub async fn delete_node(&self, name: &str) -> Result<()> {
        if self.nodes.find(name).await?.is_none() {
            return Err(OrchestratorError::not_found(ResourceKind::Node, name));
        }

        self.nodes.delete(name).await?;
        tracing::info!("Deleted node {}", name);
        Ok(())
    }
}
