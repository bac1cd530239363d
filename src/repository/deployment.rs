use std::sync::Arc;

use super::{decode, encode, wrong_kind};
use crate::error::{OrchestratorError, ResourceKind, Result};
use crate::model::{Deployment, Resource};
use crate::store::Store;

const PREFIX: &str = "deployments/";

#[derive(Clone)]
pub struct DeploymentRepository {
    store: Arc<dyn Store>,
}

impl DeploymentRepository {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert or overwrite a deployment record.
    pub async fn save(&self, deployment: &Deployment) -> Result<()> {
        let value = encode(Resource::Deployment(deployment.clone()))?;
        self.store
            .put(&deployment.key(), value)
            .await
            .map_err(OrchestratorError::store)
    }

    pub async fn find(&self, namespace: &str, name: &str) -> Result<Option<Deployment>> {
        let key = Deployment::key_for(namespace, name);
        let value = self
            .store
            .get(&key)
            .await
            .map_err(OrchestratorError::store)?;

        value.map(|v| Self::decode_deployment(&key, v)).transpose()
    }

    /// Deployments in `namespace` (all namespaces when `None`), ordered by
    /// (namespace, name).
    pub async fn list(&self, namespace: Option<&str>) -> Result<Vec<Deployment>> {
        let prefix = match namespace {
            Some(ns) => format!("{}{}/", PREFIX, ns),
            None => PREFIX.to_string(),
        };
        let entries = self
            .store
            .list(&prefix)
            .await
            .map_err(OrchestratorError::store)?;

        let mut deployments = entries
            .into_iter()
            .map(|(key, value)| Self::decode_deployment(&key, value))
            .collect::<Result<Vec<_>>>()?;
        deployments.sort_by(|a, b| (a.namespace(), a.name()).cmp(&(b.namespace(), b.name())));
        Ok(deployments)
    }

    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.store
            .delete(&Deployment::key_for(namespace, name))
            .await
            .map_err(OrchestratorError::store)
    }

    fn decode_deployment(key: &str, value: serde_json::Value) -> Result<Deployment> {
        match decode(key, value)? {
            Resource::Deployment(deployment) => Ok(deployment),
            other => Err(wrong_kind(key, ResourceKind::Deployment, &other)),
        }
    }
}
