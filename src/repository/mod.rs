//! Typed repositories over the untyped [`Store`](crate::store::Store).
//!
//! Every record is written inside the tagged [`Resource`] envelope and decoded
//! back through it, so a blob of the wrong kind or shape surfaces as
//! `InvalidRecord` instead of a half-populated entity.

use serde_json::Value;

use crate::error::{OrchestratorError, ResourceKind, Result};
use crate::model::Resource;

pub mod deployment;
pub mod node;
pub mod pod;

pub use deployment::DeploymentRepository;
pub use node::NodeRepository;
pub use pod::{PodFilter, PodRepository};

fn encode(resource: Resource) -> Result<Value> {
    serde_json::to_value(resource).map_err(|e| OrchestratorError::store(e.into()))
}

fn decode(key: &str, value: Value) -> Result<Resource> {
    serde_json::from_value(value).map_err(|e| OrchestratorError::InvalidRecord {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn wrong_kind(key: &str, expected: ResourceKind, found: &Resource) -> OrchestratorError {
    OrchestratorError::InvalidRecord {
        key: key.to_string(),
        message: format!("expected kind {}, found {}", expected, found.kind()),
    }
}
