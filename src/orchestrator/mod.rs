//! The control plane proper: pod lifecycle, node registration and the
//! deployment reconciler, wired over one store, scheduler and runtime.

use std::sync::Arc;

use crate::repository::{DeploymentRepository, NodeRepository, PodRepository};
use crate::runtime::ContainerRuntime;
use crate::scheduler::Scheduler;
use crate::store::Store;

pub mod deployments;
pub mod nodes;
pub mod pods;
pub mod reconcile_loop;

pub use deployments::{DeploymentController, ReconcileFailure, ReconcileOutcome, ReconcileReport};
pub use nodes::NodeManager;
pub use pods::PodLifecycle;
pub use reconcile_loop::ReconcileLoop;

/// Entry point bundling the three services. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    pods: PodLifecycle,
    nodes: NodeManager,
    deployments: DeploymentController,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        scheduler: Arc<dyn Scheduler>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        let pod_repo = PodRepository::new(store.clone());
        let node_repo = NodeRepository::new(store.clone());
        let deployment_repo = DeploymentRepository::new(store);

        let pods = PodLifecycle::new(pod_repo.clone(), node_repo.clone(), scheduler, runtime);
        let nodes = NodeManager::new(node_repo);
        let deployments = DeploymentController::new(deployment_repo, pod_repo, pods.clone());

        Self {
            pods,
            nodes,
            deployments,
        }
    }

    pub fn pods(&self) -> &PodLifecycle {
        &self.pods
    }

    pub fn nodes(&self) -> &NodeManager {
        &self.nodes
    }

    pub fn deployments(&self) -> &DeploymentController {
        &self.deployments
    }

    /// Start the background reconcile loop over this orchestrator's
    /// deployments.
    pub fn spawn_reconcile_loop(&self, every: std::time::Duration) -> ReconcileLoop {
        ReconcileLoop::spawn(self.deployments.clone(), every)
    }
}
