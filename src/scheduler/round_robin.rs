use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::Scheduler;
use crate::error::{OrchestratorError, Result};
use crate::model::{Node, Pod};

/// Rotates over whatever candidates it is given.
///
/// No capacity matching, no affinity, no readiness filtering. The counter
/// lives as long as the scheduler and is shared by all callers; concurrent
/// calls may observe the same index, which is harmless since any index is a
/// valid pick.
#[derive(Debug, Default)]
pub struct RoundRobinScheduler {
    next: AtomicUsize,
}

impl RoundRobinScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Scheduler for RoundRobinScheduler {
    async fn schedule(&self, pod: &Pod, nodes: &[Node]) -> Result<Node> {
        if nodes.is_empty() {
            return Err(OrchestratorError::NoAvailableTargets);
        }

        let index = self.next.fetch_add(1, Ordering::Relaxed) % nodes.len();
        let node = nodes[index].clone();
        tracing::debug!("Round-robin placed {} on {} (index {})", pod.key(), node.name(), index);
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContainerSpec;

    fn nodes(names: &[&str]) -> Vec<Node> {
        names.iter().map(|n| Node::new(*n, None)).collect()
    }

    fn pod() -> Pod {
        Pod::new("default", "web", vec![ContainerSpec::new("main", "busybox")])
    }

    #[tokio::test]
    async fn test_visits_each_node_once_in_order() {
        let scheduler = RoundRobinScheduler::new();
        let candidates = nodes(&["a", "b", "c"]);

        let mut picked = Vec::new();
        for _ in 0..candidates.len() {
            let node = scheduler.schedule(&pod(), &candidates).await.unwrap();
            picked.push(node.name().to_string());
        }
        assert_eq!(picked, vec!["a", "b", "c"]);

        let wrapped = scheduler.schedule(&pod(), &candidates).await.unwrap();
        assert_eq!(wrapped.name().as_str(), "a");
    }

    #[tokio::test]
    async fn test_counter_carries_across_candidate_lists() {
        let scheduler = RoundRobinScheduler::new();
        scheduler.schedule(&pod(), &nodes(&["a", "b", "c"])).await.unwrap();

        let node = scheduler.schedule(&pod(), &nodes(&["x", "y"])).await.unwrap();
        assert_eq!(node.name().as_str(), "y");
    }

    #[tokio::test]
    async fn test_empty_candidates_fail() {
        let scheduler = RoundRobinScheduler::new();
        let err = scheduler.schedule(&pod(), &[]).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NoAvailableTargets));

        // A failed call does not advance the rotation.
        let node = scheduler.schedule(&pod(), &nodes(&["a", "b"])).await.unwrap();
        assert_eq!(node.name().as_str(), "a");
    }
}
