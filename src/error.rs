//! Error taxonomy for the control plane.
//!
//! Collaborators (stores, runtimes) report failures as `anyhow::Error`; the
//! core wraps them into [`OrchestratorError::Collaborator`] without dropping
//! the original message. Nothing in the core retries.

use std::fmt;

use thiserror::Error;

/// Which collaborator a wrapped failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Store,
    Runtime,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

/// Resource kinds that can be missing or duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Pod,
    Node,
    Deployment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pod => write!(f, "Pod"),
            Self::Node => write!(f, "Node"),
            Self::Deployment => write!(f, "Deployment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{kind} {key} not found")]
    NotFound { kind: ResourceKind, key: String },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: ResourceKind, key: String },

    #[error("No available nodes")]
    NoAvailableTargets,

    /// The pod was never successfully launched, so there is nothing to
    /// restart, inspect or read logs from.
    #[error("Runtime handle not found for pod {namespace}/{name}")]
    MissingRuntimeHandle { namespace: String, name: String },

    #[error("Invalid record at {key}: {message}")]
    InvalidRecord { key: String, message: String },

    #[error("{component} failure: {source}")]
    Collaborator {
        component: Component,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

impl OrchestratorError {
    pub fn not_found(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub fn already_exists(kind: ResourceKind, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            key: key.into(),
        }
    }

    pub fn missing_handle(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::MissingRuntimeHandle {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn store(source: anyhow::Error) -> Self {
        Self::Collaborator {
            component: Component::Store,
            source,
        }
    }

    pub fn runtime(source: anyhow::Error) -> Self {
        Self::Collaborator {
            component: Component::Runtime,
            source,
        }
    }

    /// True for the `NotFound` variant regardless of kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
