//! Pod lifecycle: sequences repository, scheduler and runtime calls for a
//! single pod. Every operation is a strict chain of awaited calls and nothing
//! is rolled back on failure.

use std::sync::Arc;

use crate::error::{OrchestratorError, ResourceKind, Result};
use crate::model::{DEFAULT_NAMESPACE, Pod, effective_namespace};
use crate::repository::{NodeRepository, PodFilter, PodRepository};
use crate::runtime::ContainerRuntime;
use crate::scheduler::Scheduler;
use crate::types::RuntimeHandle;

#[derive(Clone)]
pub struct PodLifecycle {
    pods: PodRepository,
    nodes: NodeRepository,
    scheduler: Arc<dyn Scheduler>,
    runtime: Arc<dyn ContainerRuntime>,
}

impl PodLifecycle {
    pub fn new(
        pods: PodRepository,
        nodes: NodeRepository,
        scheduler: Arc<dyn Scheduler>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Self {
            pods,
            nodes,
            scheduler,
            runtime,
        }
    }

    /// Persist, schedule, bind and launch a pod.
    ///
    /// If the launch fails the pod stays persisted with its node assigned and
    /// no runtime handle; see [`PodLifecycle::find_unlaunched`].
    pub async fn create_pod(&self, mut pod: Pod) -> Result<Pod> {
        if pod.metadata.namespace.is_empty() {
            pod.metadata.namespace = DEFAULT_NAMESPACE.to_string();
        }
        self.pods.create(&pod).await?;
        tracing::debug!("Pod {} persisted", pod.key());

        let nodes = self.nodes.list().await?;
        let node = self.scheduler.schedule(&pod, &nodes).await?;
        pod.spec.node_name = Some(node.name().clone());
        self.pods.update(&pod).await?;
        tracing::info!("Pod {} scheduled to node {}", pod.key(), node.name());

        let launched = match self.runtime.launch(&pod).await {
            Ok(launched) => launched,
            Err(e) => {
                tracing::warn!(
                    "Pod {} launch failed, left assigned to {} without a runtime handle: {}",
                    pod.key(),
                    node.name(),
                    e
                );
                return Err(OrchestratorError::runtime(e));
            }
        };
        pod.record_launch(launched.handle, launched.running, &launched.status);
        self.pods.update(&pod).await?;
        tracing::info!("Pod {} launched ({:?})", pod.key(), pod.status.phase);

        Ok(pod)
    }

    /// Stop the pod's workload if it has one, then drop the record.
    ///
    /// Deleting a pod that does not exist succeeds. A failed stop aborts the
    /// delete so no running workload is orphaned.
    pub async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let namespace = effective_namespace(namespace);
        let existing = self.pods.find(namespace, name).await?;
        if let Some(handle) = existing.as_ref().and_then(|pod| pod.runtime_handle.as_ref()) {
            self.runtime
                .stop(handle)
                .await
                .map_err(OrchestratorError::runtime)?;
            tracing::debug!("Stopped workload {} for pod {}/{}", handle, namespace, name);
        }

        self.pods.delete(namespace, name).await?;
        tracing::info!("Pod {}/{} deleted", namespace, name);
        Ok(())
    }

    /// Stop and relaunch a pod from its stored spec, then persist the new
    /// handle and phase.
    pub async fn restart_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let (mut pod, handle) = self.launched_pod(namespace, name).await?;

        self.runtime
            .stop(&handle)
            .await
            .map_err(OrchestratorError::runtime)?;

        // The old workload is gone; a failed relaunch must not keep its handle.
        let launched = match self.runtime.launch(&pod).await {
            Ok(launched) => launched,
            Err(e) => {
                pod.clear_launch();
                self.pods.update(&pod).await?;
                tracing::warn!(
                    "Pod {} relaunch failed, left assigned without a runtime handle: {}",
                    pod.key(),
                    e
                );
                return Err(OrchestratorError::runtime(e));
            }
        };

        pod.record_launch(launched.handle, launched.running, &launched.status);
        self.pods.update(&pod).await?;
        tracing::info!("Pod {} restarted", pod.key());
        Ok(pod)
    }

    /// The pod with its live runtime status folded in. The folded view is
    /// returned only, not persisted.
    pub async fn pod_status(&self, namespace: &str, name: &str) -> Result<Pod> {
        let (mut pod, handle) = self.launched_pod(namespace, name).await?;

        let status = self
            .runtime
            .inspect(&handle)
            .await
            .map_err(OrchestratorError::runtime)?;
        pod.fold_runtime_status(status.running, &status.status);
        Ok(pod)
    }

    /// Runtime log output for the pod, unmodified.
    pub async fn pod_logs(&self, namespace: &str, name: &str) -> Result<String> {
        let (_, handle) = self.launched_pod(namespace, name).await?;

        self.runtime
            .fetch_logs(&handle)
            .await
            .map_err(OrchestratorError::runtime)
    }

    pub async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        self.pods.find(effective_namespace(namespace), name).await
    }

    pub async fn list_pods(&self, filter: &PodFilter) -> Result<Vec<Pod>> {
        self.pods.list(filter).await
    }

    /// Replace a stored pod's containers and labels.
    ///
    /// Identity (name, namespace, UID) and runtime state (assigned node,
    /// runtime handle, status) always come from the existing record.
    pub async fn update_pod(&self, namespace: &str, name: &str, mut pod: Pod) -> Result<Pod> {
        let existing = self.require_pod(namespace, name).await?;

        pod.metadata.name = existing.metadata.name;
        pod.metadata.namespace = existing.metadata.namespace;
        pod.metadata.uid = existing.metadata.uid;
        pod.spec.node_name = existing.spec.node_name;
        pod.runtime_handle = existing.runtime_handle;
        pod.status = existing.status;
        self.pods.update(&pod).await?;
        Ok(pod)
    }

    /// Pods that were scheduled but never got a runtime handle.
    pub async fn find_unlaunched(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        let filter = match namespace {
            Some(ns) => PodFilter::in_namespace(effective_namespace(ns)),
            None => PodFilter::all(),
        };
        let pods = self.pods.list(&filter).await?;
        Ok(pods
            .into_iter()
            .filter(Pod::is_assigned_unlaunched)
            .collect())
    }

    async fn require_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let namespace = effective_namespace(namespace);
        self.pods
            .find(namespace, name)
            .await?
            .ok_or_else(|| {
                OrchestratorError::not_found(ResourceKind::Pod, format!("{}/{}", namespace, name))
            })
    }

    async fn launched_pod(&self, namespace: &str, name: &str) -> Result<(Pod, RuntimeHandle)> {
        let pod = self.require_pod(namespace, name).await?;
        match pod.runtime_handle.clone() {
            Some(handle) => Ok((pod, handle)),
            None => Err(OrchestratorError::missing_handle(pod.namespace(), pod.name())),
        }
    }
}
