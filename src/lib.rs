// Data model and boundaries
pub mod error;
pub mod model;
pub mod types;
pub mod runtime;
pub mod scheduler;
pub mod store;

// Persistence
pub mod db;
pub mod repository;

// Control plane
pub mod config;
pub mod orchestrator;

pub use config::{ClusterConfig, RuntimeKind, load_cluster_config};
pub use db::{DatabaseConfig, create_connection, ensure_schema};
pub use error::{OrchestratorError, Result};
pub use model::{Deployment, Node, Pod};
pub use orchestrator::{Orchestrator, ReconcileLoop, ReconcileOutcome, ReconcileReport};
pub use repository::PodFilter;
pub use runtime::{ContainerRuntime, DockerCliRuntime, SimulatedRuntime};
pub use scheduler::{RoundRobinScheduler, Scheduler};
pub use store::{MemoryStore, Store, SurrealStore};

use std::sync::Arc;

/// Build the runtime selected by the cluster config.
pub fn build_runtime(config: &ClusterConfig) -> Arc<dyn ContainerRuntime> {
    match config.runtime {
        RuntimeKind::Simulated => Arc::new(SimulatedRuntime::new()),
        RuntimeKind::Docker => match &config.docker_binary {
            Some(binary) => Arc::new(DockerCliRuntime::new(binary.clone())),
            None => Arc::new(DockerCliRuntime::default()),
        },
    }
}

/// Convenience function to create an orchestrator over SurrealDB.
///
/// Connects, ensures the schema and wires a round-robin scheduler with the
/// given runtime.
pub async fn connect_orchestrator(
    db_config: DatabaseConfig,
    runtime: Arc<dyn ContainerRuntime>,
) -> anyhow::Result<Orchestrator> {
    let store = SurrealStore::connect(db_config).await?;

    Ok(Orchestrator::new(
        Arc::new(store),
        Arc::new(RoundRobinScheduler::new()),
        runtime,
    ))
}
