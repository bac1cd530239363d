//! Placement decisions: pick one node for a pod.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Node, Pod};

pub mod round_robin;

pub use round_robin::RoundRobinScheduler;

/// Pluggable placement policy.
///
/// Implementations fail with `NoAvailableTargets` when `nodes` is empty. The
/// caller commits the choice; there is no reservation step, so two decisions
/// made back to back may land on an already busy node.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule(&self, pod: &Pod, nodes: &[Node]) -> Result<Node>;
}
