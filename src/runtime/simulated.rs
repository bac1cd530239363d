use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ContainerRuntime, LaunchedUnit, RuntimeStatus, ensure_launchable};
use crate::model::Pod;
use crate::types::RuntimeHandle;

#[derive(Debug, Clone)]
struct SimulatedWorkload {
    pod_key: String,
    image: String,
    logs: Vec<String>,
}

/// In-process runtime that pretends every launch succeeds and stays running.
///
/// Used for local development and for running the control plane without a
/// container engine. Handles are random; unknown handles fail.
#[derive(Debug, Default)]
pub struct SimulatedRuntime {
    workloads: Mutex<HashMap<RuntimeHandle, SimulatedWorkload>>,
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of workloads currently running.
    pub async fn running(&self) -> usize {
        self.workloads.lock().await.len()
    }
}

#[async_trait]
impl ContainerRuntime for SimulatedRuntime {
    async fn launch(&self, pod: &Pod) -> Result<LaunchedUnit> {
        ensure_launchable(pod)?;

        let container = &pod.spec.containers[0];
        let handle = RuntimeHandle::new(Uuid::new_v4().simple().to_string());
        let started = chrono::Utc::now().to_rfc3339();
        let workload = SimulatedWorkload {
            pod_key: pod.key(),
            image: container.image.clone(),
            logs: vec![format!(
                "{} started {} ({}) for {}",
                started,
                container.name,
                container.image,
                pod.key()
            )],
        };

        self.workloads.lock().await.insert(handle.clone(), workload);
        tracing::debug!("Simulated launch of {} as {}", pod.key(), handle);

        Ok(LaunchedUnit {
            handle,
            status: "running".to_string(),
            running: true,
        })
    }

    /// Stopping a handle this runtime does not know is a no-op: the workload
    /// is already gone (or was started by another process).
    async fn stop(&self, handle: &RuntimeHandle) -> Result<()> {
        let removed = self.workloads.lock().await.remove(handle);
        match removed {
            Some(workload) => tracing::debug!("Simulated stop of {} for {}", handle, workload.pod_key),
            None => tracing::debug!("Simulated stop of unknown handle {}", handle),
        }
        Ok(())
    }

    async fn inspect(&self, handle: &RuntimeHandle) -> Result<RuntimeStatus> {
        let workloads = self.workloads.lock().await;
        workloads
            .get(handle)
            .map(|_| RuntimeStatus {
                status: "running".to_string(),
                running: true,
            })
            .ok_or_else(|| anyhow!("no such container: {}", handle))
    }

    async fn fetch_logs(&self, handle: &RuntimeHandle) -> Result<String> {
        let workloads = self.workloads.lock().await;
        let workload = workloads
            .get(handle)
            .ok_or_else(|| anyhow!("no such container: {}", handle))?;

        let mut out = workload.logs.join("\n");
        out.push_str(&format!("\nimage {} healthy\n", workload.image));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContainerSpec;

    #[tokio::test]
    async fn test_launch_inspect_stop() {
        let runtime = SimulatedRuntime::new();
        let pod = Pod::new("default", "web", vec![ContainerSpec::new("nginx", "nginx:1.27")]);

        let launched = runtime.launch(&pod).await.unwrap();
        assert!(launched.running);
        assert_eq!(runtime.running().await, 1);

        let status = runtime.inspect(&launched.handle).await.unwrap();
        assert!(status.running);

        let logs = runtime.fetch_logs(&launched.handle).await.unwrap();
        assert!(logs.contains("nginx:1.27"));

        runtime.stop(&launched.handle).await.unwrap();
        assert_eq!(runtime.running().await, 0);
        assert!(runtime.inspect(&launched.handle).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_unknown_handle_is_noop() {
        let runtime = SimulatedRuntime::new();
        runtime.stop(&RuntimeHandle::new("stale")).await.unwrap();
        assert_eq!(runtime.running().await, 0);
    }

    #[tokio::test]
    async fn test_rejects_pod_without_containers() {
        let runtime = SimulatedRuntime::new();
        let pod = Pod::new("default", "empty", Vec::new());

        let err = runtime.launch(&pod).await.unwrap_err();
        assert!(err.to_string().contains("no containers"));
        assert_eq!(runtime.running().await, 0);
    }
}
