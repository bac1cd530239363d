//! Pods: the minimal deployable group of one or more containers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Labels, ObjectMeta, labels_match};
use crate::types::{NodeName, RuntimeHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ports: Vec::new(),
            env: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    /// Set once the scheduler has picked a node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<NodeName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerState {
    #[serde(rename_all = "camelCase")]
    Running { started_at: DateTime<Utc> },
    Waiting { reason: String },
    #[serde(rename_all = "camelCase")]
    Terminated { exit_code: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub state: ContainerState,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    #[serde(default)]
    pub phase: PodPhase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
    #[serde(default)]
    pub status: PodStatus,
    /// Present only after a successful launch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_handle: Option<RuntimeHandle>,
}

impl Pod {
    /// A new pod in the `Pending` phase with no node and no runtime handle.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        containers: Vec<ContainerSpec>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: PodSpec {
                containers,
                node_name: None,
            },
            status: PodStatus::default(),
            runtime_handle: None,
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.metadata.labels = labels;
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Storage key, `pods/<namespace>/<name>`.
    pub fn key(&self) -> String {
        Self::key_for(self.namespace(), self.name())
    }

    pub fn key_for(namespace: &str, name: &str) -> String {
        format!("pods/{}/{}", namespace, name)
    }

    pub fn matches(&self, selector: &Labels) -> bool {
        labels_match(selector, &self.metadata.labels)
    }

    /// Scheduled onto a node but never launched (or the launch failed).
    ///
    /// This is an observable state, not an error: a later reconcile or an
    /// operator can find these pods and retry them.
    pub fn is_assigned_unlaunched(&self) -> bool {
        self.spec.node_name.is_some() && self.runtime_handle.is_none()
    }

    /// Attach the result of a successful launch.
    ///
    /// A pod holding a handle never stays `Pending`: a runtime that reports
    /// the workload as not running yields `Unknown`.
    pub fn record_launch(&mut self, handle: RuntimeHandle, running: bool, status: &str) {
        self.runtime_handle = Some(handle);
        self.status.phase = if running {
            PodPhase::Running
        } else {
            PodPhase::Unknown
        };
        self.set_first_container_state(container_state(running, status));
    }

    /// Forget a workload that no longer exists. The node assignment stays, so
    /// the pod shows up as assigned but unlaunched.
    pub fn clear_launch(&mut self) {
        self.runtime_handle = None;
        self.status.phase = PodPhase::Pending;
        self.set_first_container_state(ContainerState::Waiting {
            reason: "relaunch failed".to_string(),
        });
    }

    /// Fold a live runtime observation into phase and the first container's
    /// status record. Other containers are left untouched.
    pub fn fold_runtime_status(&mut self, running: bool, status: &str) {
        self.status.phase = if running {
            PodPhase::Running
        } else {
            PodPhase::Pending
        };
        self.set_first_container_state(container_state(running, status));
    }

    fn set_first_container_state(&mut self, state: ContainerState) {
        let Some(first) = self.spec.containers.first() else {
            return;
        };
        let record = ContainerStatus {
            name: first.name.clone(),
            state,
        };
        match self.status.container_statuses.first_mut() {
            Some(existing) => *existing = record,
            None => self.status.container_statuses.push(record),
        }
    }
}

fn container_state(running: bool, status: &str) -> ContainerState {
    if running {
        ContainerState::Running {
            started_at: Utc::now(),
        }
    } else {
        ContainerState::Waiting {
            reason: status.to_string(),
        }
    }
}
