use std::sync::Arc;

use super::{decode, encode, wrong_kind};
use crate::error::{OrchestratorError, ResourceKind, Result};
use crate::model::{Labels, Pod, Resource};
use crate::store::Store;
use crate::types::NodeName;

const PREFIX: &str = "pods/";

/// Filter for [`PodRepository::list`]. Every populated field must match.
#[derive(Debug, Clone, Default)]
pub struct PodFilter {
    /// Restrict to one namespace; `None` scans all namespaces.
    pub namespace: Option<String>,
    /// Equality selector; empty matches every pod in scope.
    pub label_selector: Labels,
    /// Only pods assigned to this node.
    pub node_name: Option<NodeName>,
}

impl PodFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Default::default()
        }
    }

    pub fn with_selector(mut self, selector: Labels) -> Self {
        self.label_selector = selector;
        self
    }

    pub fn on_node(mut self, node: impl Into<NodeName>) -> Self {
        self.node_name = Some(node.into());
        self
    }

    fn prefix(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}{}/", PREFIX, ns),
            None => PREFIX.to_string(),
        }
    }

    fn matches(&self, pod: &Pod) -> bool {
        if !pod.matches(&self.label_selector) {
            return false;
        }
        match &self.node_name {
            Some(node) => pod.spec.node_name.as_ref() == Some(node),
            None => true,
        }
    }
}

#[derive(Clone)]
pub struct PodRepository {
    store: Arc<dyn Store>,
}

impl PodRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, pod: &Pod) -> Result<()> {
        self.put(pod).await
    }

    pub async fn update(&self, pod: &Pod) -> Result<()> {
        self.put(pod).await
    }

    pub async fn find(&self, namespace: &str, name: &str) -> Result<Option<Pod>> {
        let key = Pod::key_for(namespace, name);
        let value = self
            .store
            .get(&key)
            .await
            .map_err(OrchestratorError::store)?;

        value.map(|v| Self::decode_pod(&key, v)).transpose()
    }

    /// Pods matching `filter`, ordered by (namespace, name).
    ///
    /// The order is part of the contract: scale-down removes pods from the
    /// front of this list.
    pub async fn list(&self, filter: &PodFilter) -> Result<Vec<Pod>> {
        let entries = self
            .store
            .list(&filter.prefix())
            .await
            .map_err(OrchestratorError::store)?;

        let mut pods = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let pod = Self::decode_pod(&key, value)?;
            if filter.matches(&pod) {
                pods.push(pod);
            }
        }

        pods.sort_by(|a, b| {
            (a.namespace(), a.name()).cmp(&(b.namespace(), b.name()))
        });
        Ok(pods)
    }

    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.store
            .delete(&Pod::key_for(namespace, name))
            .await
            .map_err(OrchestratorError::store)
    }

    async fn put(&self, pod: &Pod) -> Result<()> {
        let value = encode(Resource::Pod(pod.clone()))?;
        self.store
            .put(&pod.key(), value)
            .await
            .map_err(OrchestratorError::store)
    }

    fn decode_pod(key: &str, value: serde_json::Value) -> Result<Pod> {
        match decode(key, value)? {
            Resource::Pod(pod) => Ok(pod),
            other => Err(wrong_kind(key, ResourceKind::Pod, &other)),
        }
    }
}
