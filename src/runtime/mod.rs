//! The boundary to whatever actually runs a pod's workload.

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::model::Pod;
use crate::types::RuntimeHandle;

pub mod docker;
pub mod simulated;

pub use docker::DockerCliRuntime;
pub use simulated::SimulatedRuntime;

/// Result of a successful launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedUnit {
    pub handle: RuntimeHandle,
    pub status: String,
    pub running: bool,
}

/// Live observation of a launched workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStatus {
    pub status: String,
    pub running: bool,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Start the pod's workload. Must reject a pod with no containers.
    async fn launch(&self, pod: &Pod) -> Result<LaunchedUnit>;

    /// Stop and remove the workload. A handle the runtime no longer knows is
    /// already stopped and must not fail.
    async fn stop(&self, handle: &RuntimeHandle) -> Result<()>;

    async fn inspect(&self, handle: &RuntimeHandle) -> Result<RuntimeStatus>;

    async fn fetch_logs(&self, handle: &RuntimeHandle) -> Result<String>;
}

/// Shared launch precondition for every runtime.
pub fn ensure_launchable(pod: &Pod) -> Result<()> {
    if pod.spec.containers.is_empty() {
        bail!("pod {} has no containers to launch", pod.key());
    }
    Ok(())
}
