use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use cluster_orchestrator::db::DEFAULT_CLI_DB_URL;
use cluster_orchestrator::error::OrchestratorError;
use cluster_orchestrator::model::{
    Capacity, ContainerSpec, Deployment, DeploymentSpec, LabelSelector, Labels, Node, PodSpec,
    PodTemplateSpec, TemplateMeta,
};
use cluster_orchestrator::{
    ClusterConfig, DatabaseConfig, Orchestrator, PodFilter, RuntimeKind, build_runtime,
    connect_orchestrator, load_cluster_config,
};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cluster-orchestrator")]
#[command(about = "Miniature cluster control plane: pods, nodes and deployments")]
struct Cli {
    /// SurrealDB endpoint: `surrealkv://<path>` (embedded, on disk), `ws://host:port`,
    /// or `memory` for a process-local store
    #[arg(long, global = true, env = "CLUSTER_DB_URL", default_value = DEFAULT_CLI_DB_URL)]
    db_url: String,
    /// Cluster config file (defaults to CLUSTER_CONFIG, XDG or ./cluster.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the runtime named in the cluster config
    #[arg(long, global = true, value_enum)]
    runtime: Option<RuntimeKind>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,
    /// Register configured nodes and reconcile deployments until Ctrl-C
    Serve {
        /// Seconds between reconcile passes
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Register a node
    RegisterNode {
        name: String,
        #[arg(long)]
        cpu: Option<String>,
        #[arg(long)]
        memory: Option<String>,
    },
    /// List registered nodes
    ListNodes,
    /// Create a deployment with a single-container template
    CreateDeployment {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
        #[arg(short, long, default_value_t = 1)]
        replicas: u32,
        #[arg(long)]
        image: String,
        /// Container name (defaults to the deployment name)
        #[arg(long)]
        container_name: Option<String>,
        /// Selector label, repeatable (`--selector app=web`)
        #[arg(long = "selector", value_parser = parse_label)]
        selector: Vec<(String, String)>,
        /// Extra template label, repeatable
        #[arg(long = "label", value_parser = parse_label)]
        labels: Vec<(String, String)>,
    },
    /// Set a deployment's desired replica count
    Scale {
        name: String,
        replicas: u32,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Reconcile one deployment, or all of them when no name is given
    Reconcile {
        name: Option<String>,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// List pods
    ListPods {
        #[arg(short, long)]
        namespace: Option<String>,
        #[arg(long = "selector", value_parser = parse_label)]
        selector: Vec<(String, String)>,
        #[arg(long)]
        node: Option<String>,
        /// Only pods that are assigned but were never launched
        #[arg(long, default_value_t = false)]
        unlaunched: bool,
    },
    /// Stop and delete a pod
    DeletePod {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Stop and relaunch a pod
    RestartPod {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Show a pod with its live runtime status
    PodStatus {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Print a pod's runtime logs
    PodLogs {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Delete a deployment and every pod it selects
    DeleteDeployment {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("cluster_orchestrator=info".parse()?)
                .add_directive("surrealdb=warn".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    let mut cluster_config = match &cli.config {
        Some(path) => ClusterConfig::from_path(path)?,
        None => load_cluster_config()?,
    };
    if let Some(runtime) = cli.runtime {
        cluster_config.runtime = runtime;
    }

    let db_config = DatabaseConfig {
        url: cli.db_url.clone(),
        ..Default::default()
    };
    info!("Using database url: {}", db_config.url);

    if let Commands::Init = cli.command {
        info!("Initializing database...");
        let db = cluster_orchestrator::create_connection(db_config).await?;
        cluster_orchestrator::ensure_schema(&db).await?;
        info!("Database initialized successfully");
        return Ok(());
    }

    let orchestrator = connect_orchestrator(db_config, build_runtime(&cluster_config)).await?;

    match cli.command {
        Commands::Init => {}
        Commands::Serve { interval_secs } => {
            if let Some(secs) = interval_secs {
                cluster_config.reconcile_interval_secs = secs;
            }
            serve(&orchestrator, &cluster_config).await?;
        }
        Commands::RegisterNode { name, cpu, memory } => {
            let capacity = match (cpu, memory) {
                (None, None) => None,
                (cpu, memory) => Some(Capacity {
                    cpu: cpu.unwrap_or_default(),
                    memory: memory.unwrap_or_default(),
                }),
            };
            let node = orchestrator
                .nodes()
                .register_node(Node::new(name.as_str(), capacity))
                .await?;
            println!("Registered node {}", node.name());
        }
        Commands::ListNodes => {
            let nodes = orchestrator.nodes().list_nodes().await?;
            if nodes.is_empty() {
                println!("No nodes registered.");
                return Ok(());
            }

            println!("{:<24} {:<8} {:<10} {:<10}", "NAME", "READY", "CPU", "MEMORY");
            for node in nodes {
                let (cpu, memory) = node
                    .spec
                    .capacity
                    .as_ref()
                    .map(|c| (c.cpu.clone(), c.memory.clone()))
                    .unwrap_or_else(|| ("-".to_string(), "-".to_string()));
                println!(
                    "{:<24} {:<8} {:<10} {:<10}",
                    node.name(),
                    node.is_ready(),
                    cpu,
                    memory
                );
            }
        }
        Commands::CreateDeployment {
            name,
            namespace,
            replicas,
            image,
            container_name,
            selector,
            labels,
        } => {
            let container = ContainerSpec::new(container_name.unwrap_or_else(|| name.clone()), image);
            let mut selector: Labels = selector.into_iter().collect();
            if selector.is_empty() {
                selector.insert("app".to_string(), name.clone());
            }
            let spec = DeploymentSpec {
                replicas,
                selector: LabelSelector {
                    match_labels: selector,
                },
                template: PodTemplateSpec {
                    metadata: TemplateMeta {
                        labels: labels.into_iter().collect(),
                    },
                    spec: PodSpec {
                        containers: vec![container],
                        node_name: None,
                    },
                },
            };

            let deployment = orchestrator
                .deployments()
                .create_deployment(Deployment::new(namespace, name, spec))
                .await?;
            println!(
                "Created deployment {}/{} ({} replicas)",
                deployment.namespace(),
                deployment.name(),
                deployment.spec.replicas
            );
        }
        Commands::Scale {
            name,
            replicas,
            namespace,
        } => {
            orchestrator
                .deployments()
                .scale_deployment(&namespace, &name, replicas)
                .await?;
            println!("Scaled {}/{} to {} replicas", namespace, name, replicas);
        }
        Commands::Reconcile { name, namespace } => match name {
            Some(name) => {
                let outcome = orchestrator.deployments().reconcile(&namespace, &name).await?;
                print_outcome(&outcome);
            }
            None => {
                let report = orchestrator.deployments().reconcile_all().await?;
                for outcome in &report.outcomes {
                    print_outcome(outcome);
                }
                for failure in &report.failures {
                    println!("{}/{}: {}", failure.namespace, failure.name, failure.error);
                }
                if !report.failures.is_empty() {
                    return Err(anyhow!("{} deployments failed to reconcile", report.failures.len()));
                }
            }
        },
        Commands::ListPods {
            namespace,
            selector,
            node,
            unlaunched,
        } => {
            let pods = if unlaunched {
                orchestrator.pods().find_unlaunched(namespace.as_deref()).await?
            } else {
                let mut filter = match namespace {
                    Some(ns) => PodFilter::in_namespace(ns),
                    None => PodFilter::all(),
                };
                filter = filter.with_selector(selector.into_iter().collect());
                if let Some(node) = node {
                    filter = filter.on_node(node);
                }
                orchestrator.pods().list_pods(&filter).await?
            };

            if pods.is_empty() {
                println!("No pods found.");
                return Ok(());
            }

            println!(
                "{:<12} {:<36} {:<10} {:<16} {:<16}",
                "NAMESPACE", "NAME", "PHASE", "NODE", "HANDLE"
            );
            for pod in pods {
                println!(
                    "{:<12} {:<36} {:<10} {:<16} {:<16}",
                    pod.namespace(),
                    pod.name(),
                    format!("{:?}", pod.status.phase),
                    pod.spec
                        .node_name
                        .as_ref()
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    pod.runtime_handle
                        .as_ref()
                        .map(|h| h.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                );
            }
        }
        Commands::DeletePod { name, namespace } => {
            orchestrator.pods().delete_pod(&namespace, &name).await?;
            println!("Deleted pod {}/{}", namespace, name);
        }
        Commands::RestartPod { name, namespace } => {
            let pod = orchestrator.pods().restart_pod(&namespace, &name).await?;
            println!(
                "Restarted pod {}/{} ({:?})",
                pod.namespace(),
                pod.name(),
                pod.status.phase
            );
        }
        Commands::PodStatus { name, namespace } => {
            let pod = orchestrator.pods().pod_status(&namespace, &name).await?;
            println!("{}", serde_json::to_string_pretty(&pod)?);
        }
        Commands::PodLogs { name, namespace } => {
            let logs = orchestrator.pods().pod_logs(&namespace, &name).await?;
            print!("{}", logs);
        }
        Commands::DeleteDeployment { name, namespace } => {
            let removed = orchestrator
                .deployments()
                .delete_deployment(&namespace, &name)
                .await?;
            println!("Deleted deployment {}/{} and {} pods", namespace, name, removed);
        }
    }

    Ok(())
}

/// Register configured nodes, then run the reconcile loop until Ctrl-C.
async fn serve(orchestrator: &Orchestrator, config: &ClusterConfig) -> Result<()> {
    for node_config in &config.nodes {
        match orchestrator.nodes().register_node(node_config.to_node()).await {
            Ok(_) | Err(OrchestratorError::AlreadyExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        "Starting reconcile loop every {:?} with {:?} runtime",
        config.reconcile_interval(),
        config.runtime
    );
    let reconcile_loop = orchestrator.spawn_reconcile_loop(config.reconcile_interval());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let passes = reconcile_loop.shutdown().await;
    info!("Stopped after {} reconcile passes", passes);
    Ok(())
}

fn print_outcome(outcome: &cluster_orchestrator::ReconcileOutcome) {
    println!(
        "{}/{}: desired={} observed={} created={} deleted={}",
        outcome.namespace,
        outcome.name,
        outcome.desired,
        outcome.observed,
        outcome.created.len(),
        outcome.deleted.len()
    );
    for name in &outcome.created {
        println!("  + {}", name);
    }
    for name in &outcome.deleted {
        println!("  - {}", name);
    }
}

/// Parse a `key=value` label argument.
fn parse_label(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{}`", raw)),
    }
}
