//! Nodes: scheduling targets that host pods.
//!
//! A node carries no back-reference to its pods; the pods assigned to a node
//! are found by filtering on `spec.nodeName`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Labels;
use crate::types::NodeName;

/// Resource capacity as opaque quantity strings (e.g. `"4"`, `"8Gi"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    pub cpu: String,
    pub memory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub name: NodeName,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Capacity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeStatus {
    #[serde(default)]
    pub conditions: Vec<NodeCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocatable: Option<Capacity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub metadata: NodeMeta,
    #[serde(default)]
    pub spec: NodeSpec,
    #[serde(default)]
    pub status: NodeStatus,
}

impl Node {
    /// A node reported as `Ready`. There is no health probing; readiness is
    /// synthesized on construction.
    pub fn new(name: impl Into<NodeName>, capacity: Option<Capacity>) -> Self {
        Self {
            metadata: NodeMeta {
                name: name.into(),
                labels: Labels::new(),
            },
            spec: NodeSpec { capacity },
            status: NodeStatus {
                conditions: vec![NodeCondition {
                    condition_type: "Ready".to_string(),
                    status: "True".to_string(),
                }],
                allocatable: None,
            },
        }
    }

    pub fn name(&self) -> &NodeName {
        &self.metadata.name
    }

    /// Storage key, `nodes/<name>`.
    pub fn key(&self) -> String {
        Self::key_for(self.metadata.name.as_str())
    }

    pub fn key_for(name: &str) -> String {
        format!("nodes/{}", name)
    }

    pub fn is_ready(&self) -> bool {
        self.status
            .conditions
            .iter()
            .any(|c| c.condition_type == "Ready" && c.status == "True")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_is_ready() {
        let node = Node::new(
            "node-a",
            Some(Capacity {
                cpu: "4".to_string(),
                memory: "8Gi".to_string(),
            }),
        );
        assert!(node.is_ready());
        assert_eq!(node.key(), "nodes/node-a");
    }

    #[test]
    fn test_condition_type_field_name() {
        let node = Node::new("node-a", None);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["status"]["conditions"][0]["type"], "Ready");
        assert_eq!(value["metadata"]["name"], "node-a");
    }
}
