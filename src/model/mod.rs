//! Resource data model: pods, nodes and deployments, plus the tagged envelope
//! they are persisted in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Uid;

pub mod deployment;
pub mod node;
pub mod pod;

pub use deployment::{Deployment, DeploymentSpec, LabelSelector, PodTemplateSpec, TemplateMeta};
pub use node::{Capacity, Node, NodeCondition, NodeMeta, NodeSpec, NodeStatus};
pub use pod::{
    ContainerPort, ContainerSpec, ContainerState, ContainerStatus, EnvVar, Pod, PodPhase, PodSpec,
    PodStatus,
};

/// Namespace used when a resource does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Equality label map. Ordered so serialized records are stable.
pub type Labels = BTreeMap<String, String>;

/// Metadata shared by namespaced resources (pods and deployments).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
    pub uid: Uid,
}

impl ObjectMeta {
    /// Metadata with a freshly generated UID. An empty namespace falls back
    /// to [`DEFAULT_NAMESPACE`].
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: effective_namespace(&namespace.into()).to_string(),
            labels: Labels::new(),
            uid: Uid::generate(),
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Resolve the namespace a request refers to.
pub fn effective_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    }
}

/// Whether `labels` carries every key/value pair in `selector`.
///
/// An empty selector matches everything.
pub fn labels_match(selector: &Labels, labels: &Labels) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

/// Tagged envelope for persisted records.
///
/// The store holds untyped JSON; decoding through this enum rejects blobs
/// whose `kind` does not match what the repository asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Resource {
    Pod(Pod),
    Node(Node),
    Deployment(Deployment),
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pod(_) => "Pod",
            Self::Node(_) => "Node",
            Self::Deployment(_) => "Deployment",
        }
    }
}
