use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::process::Command;

use super::{ContainerRuntime, LaunchedUnit, RuntimeStatus, ensure_launchable};
use crate::model::Pod;
use crate::types::RuntimeHandle;

/// Runs each pod's first container through the `docker` command line.
///
/// Additional containers in a pod are not started.
#[derive(Debug, Clone)]
pub struct DockerCliRuntime {
    binary: String,
}

impl Default for DockerCliRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCliRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn docker(&self, args: &[String]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "{} {} exited with {}: {}",
                self.binary,
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Container name used for a pod, `pod-<namespace>-<name>`.
pub fn container_name(pod: &Pod) -> String {
    format!("pod-{}-{}", pod.namespace(), pod.name())
}

/// Arguments for `docker run` for the pod's first container.
pub fn run_args(pod: &Pod) -> Result<Vec<String>> {
    ensure_launchable(pod)?;
    let container = &pod.spec.containers[0];

    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        container_name(pod),
        "--label".to_string(),
        format!("cluster-orchestrator/pod={}", pod.key()),
    ];
    for var in &container.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", var.name, var.value));
    }
    for port in &container.ports {
        let protocol = port
            .protocol
            .as_deref()
            .unwrap_or("tcp")
            .to_ascii_lowercase();
        args.push("--expose".to_string());
        args.push(format!("{}/{}", port.container_port, protocol));
    }
    args.push(container.image.clone());

    Ok(args)
}

fn is_missing_container(err: &anyhow::Error) -> bool {
    err.to_string().contains("No such container")
}

fn parse_inspect(output: &str) -> Result<RuntimeStatus> {
    let mut parts = output.split_whitespace();
    let status = parts
        .next()
        .ok_or_else(|| anyhow!("empty docker inspect output"))?;
    let running = parts
        .next()
        .map(|flag| flag == "true")
        .ok_or_else(|| anyhow!("unexpected docker inspect output: {}", output.trim()))?;

    Ok(RuntimeStatus {
        status: status.to_string(),
        running,
    })
}

#[async_trait]
impl ContainerRuntime for DockerCliRuntime {
    async fn launch(&self, pod: &Pod) -> Result<LaunchedUnit> {
        let args = run_args(pod)?;
        let id = self.docker(&args).await?;
        let id = id.trim();
        if id.is_empty() {
            return Err(anyhow!("docker run returned no container id"));
        }

        tracing::info!("Docker container {} started for {}", id, pod.key());
        Ok(LaunchedUnit {
            handle: RuntimeHandle::new(id),
            status: "running".to_string(),
            running: true,
        })
    }

    /// Stop and remove the container. A container docker no longer knows
    /// counts as stopped.
    async fn stop(&self, handle: &RuntimeHandle) -> Result<()> {
        for command in ["stop", "rm"] {
            if let Err(e) = self.docker(&[command.to_string(), handle.to_string()]).await {
                if is_missing_container(&e) {
                    tracing::debug!("Container {} already gone", handle);
                    return Ok(());
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn inspect(&self, handle: &RuntimeHandle) -> Result<RuntimeStatus> {
        let output = self
            .docker(&[
                "inspect".to_string(),
                "--format".to_string(),
                "{{.State.Status}} {{.State.Running}}".to_string(),
                handle.to_string(),
            ])
            .await?;
        parse_inspect(&output)
    }

    async fn fetch_logs(&self, handle: &RuntimeHandle) -> Result<String> {
        self.docker(&["logs".to_string(), handle.to_string()]).await
    }
}
