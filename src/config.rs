use anyhow::Context;
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::model::{Capacity, Labels, Node};

const CONFIG_ENV: &str = "CLUSTER_CONFIG";
const CONFIG_FILE: &str = "cluster.json";

/// Which container runtime `serve` drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    #[default]
    Simulated,
    Docker,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    #[serde(default)]
    pub capacity: Option<Capacity>,
    #[serde(default)]
    pub labels: Labels,
}

impl NodeConfig {
    pub fn to_node(&self) -> Node {
        let mut node = Node::new(self.name.as_str(), self.capacity.clone());
        node.metadata.labels = self.labels.clone();
        node
    }
}

/// Bootstrap state for a long-running control plane.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
    #[serde(default)]
    pub runtime: RuntimeKind,
    /// Path or name of the docker executable.
    #[serde(default)]
    pub docker_binary: Option<String>,
}

fn default_reconcile_interval() -> u64 {
    10
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            reconcile_interval_secs: default_reconcile_interval(),
            runtime: RuntimeKind::default(),
            docker_binary: None,
        }
    }
}

impl ClusterConfig {
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let cfg: ClusterConfig = serde_json::from_str(raw)?;
        Ok(cfg.expanded())
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    fn expanded(mut self) -> Self {
        for node in &mut self.nodes {
            node.name = expand_env_vars(&node.name);
            if let Some(capacity) = node.capacity.as_mut() {
                capacity.cpu = expand_env_vars(&capacity.cpu);
                capacity.memory = expand_env_vars(&capacity.memory);
            }
            for val in node.labels.values_mut() {
                *val = expand_env_vars(val);
            }
        }
        if let Some(binary) = self.docker_binary.as_mut() {
            *binary = expand_env_vars(binary);
        }
        self
    }
}

/// Locate `cluster.json`: `$CLUSTER_CONFIG`, then
/// `$XDG_CONFIG_HOME/cluster-orchestrator/cluster.json`, then `./cluster.json`.
pub fn resolve_cluster_config_path() -> Option<PathBuf> {
    resolve_with(
        env::var(CONFIG_ENV).ok().map(PathBuf::from),
        env::var("XDG_CONFIG_HOME").ok().map(PathBuf::from),
        PathBuf::from(CONFIG_FILE),
    )
}

fn resolve_with(
    explicit: Option<PathBuf>,
    xdg_home: Option<PathBuf>,
    local: PathBuf,
) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p);
    }

    if let Some(xdg) = xdg_home {
        let candidate = xdg.join("cluster-orchestrator").join(CONFIG_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if local.exists() {
        return Some(local);
    }

    None
}

/// Load the cluster config, or defaults when no file is found.
///
/// An explicitly named file (`$CLUSTER_CONFIG`) must exist.
pub fn load_cluster_config() -> anyhow::Result<ClusterConfig> {
    match resolve_cluster_config_path() {
        Some(path) => {
            tracing::info!("Loading cluster config from {}", path.display());
            ClusterConfig::from_path(&path)
        }
        None => Ok(ClusterConfig::default()),
    }
}

/// Replace `${NAME}` with the value of environment variable `NAME`.
/// Unknown variables are left as written.
fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            match env::var(&name) {
                Ok(val) => out.push_str(&val),
                Err(_) => {
                    out.push_str("${");
                    out.push_str(&name);
                    out.push('}');
                }
            }
        } else {
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults_when_fields_missing() {
        let cfg = ClusterConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, ClusterConfig::default());
        assert_eq!(cfg.reconcile_interval(), Duration::from_secs(10));
        assert_eq!(cfg.runtime, RuntimeKind::Simulated);
    }

    #[test]
    fn test_parse_full_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "nodes": [
                    {{"name": "node-a", "capacity": {{"cpu": "4", "memory": "8Gi"}}}},
                    {{"name": "node-b", "labels": {{"zone": "eu-1"}}}}
                ],
                "reconcileIntervalSecs": 3,
                "runtime": "docker",
                "dockerBinary": "/usr/local/bin/docker"
            }}"#
        )
        .unwrap();

        let cfg = ClusterConfig::from_path(file.path()).unwrap();
        assert_eq!(cfg.nodes.len(), 2);
        assert_eq!(cfg.reconcile_interval(), Duration::from_secs(3));
        assert_eq!(cfg.runtime, RuntimeKind::Docker);
        assert_eq!(cfg.docker_binary.as_deref(), Some("/usr/local/bin/docker"));

        let node = cfg.nodes[0].to_node();
        assert_eq!(node.name().as_str(), "node-a");
        assert!(node.is_ready());
        assert_eq!(node.spec.capacity.unwrap().memory, "8Gi");
        assert_eq!(
            cfg.nodes[1].to_node().metadata.labels.get("zone").map(String::as_str),
            Some("eu-1")
        );
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"runtime\": \"podman\"}}").unwrap();

        let err = ClusterConfig::from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_expand_env_vars() {
        let expected = env::var("PATH").unwrap_or_else(|_| "${PATH}".to_string());
        assert_eq!(expand_env_vars("${PATH}"), expected);
        assert_eq!(
            expand_env_vars("node-${CLUSTER_TEST_SURELY_UNSET_VAR}"),
            "node-${CLUSTER_TEST_SURELY_UNSET_VAR}"
        );
        assert_eq!(expand_env_vars("plain $value"), "plain $value");
    }

    #[test]
    fn test_resolve_order() {
        let dir = TempDir::new().unwrap();
        let xdg = dir.path().join("xdg");
        let local = dir.path().join("cluster.json");

        assert_eq!(resolve_with(None, Some(xdg.clone()), local.clone()), None);

        fs::write(&local, "{}").unwrap();
        assert_eq!(
            resolve_with(None, Some(xdg.clone()), local.clone()),
            Some(local.clone())
        );

        let xdg_file = xdg.join("cluster-orchestrator").join("cluster.json");
        fs::create_dir_all(xdg_file.parent().unwrap()).unwrap();
        fs::write(&xdg_file, "{}").unwrap();
        assert_eq!(
            resolve_with(None, Some(xdg.clone()), local.clone()),
            Some(xdg_file)
        );

        let explicit = dir.path().join("missing.json");
        assert_eq!(
            resolve_with(Some(explicit.clone()), Some(xdg), local),
            Some(explicit)
        );
    }
}
