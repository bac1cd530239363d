//! Deployment management and the replication reconciler.
//!
//! A deployment does not own its pods. Membership is the label match between
//! a pod and the deployment's selector, re-evaluated on every pass. The
//! reconciler only reads pods through the repository filter and changes them
//! through [`PodLifecycle`]; it never talks to the scheduler or the runtime.
//!
//! Passes over the same deployment are not mutually excluded. Two overlapping
//! passes can both see too few pods and over-create, or both pick the same pod
//! to delete (the second delete is a no-op). The next pass converges either
//! way.

use chrono::Utc;
use uuid::Uuid;

use super::pods::PodLifecycle;
use crate::error::{OrchestratorError, ResourceKind, Result};
use crate::model::{Deployment, DeploymentSpec, Pod, effective_namespace};
use crate::repository::{DeploymentRepository, PodFilter, PodRepository};

/// What one reconcile pass observed and changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub namespace: String,
    pub name: String,
    pub desired: u32,
    pub observed: usize,
    /// Names of pods created by this pass.
    pub created: Vec<String>,
    /// Names of pods deleted by this pass.
    pub deleted: Vec<String>,
}

impl ReconcileOutcome {
    /// True when the pass made no changes.
    pub fn is_converged(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Debug)]
pub struct ReconcileFailure {
    pub namespace: String,
    pub name: String,
    pub error: OrchestratorError,
}

/// Result of reconciling every stored deployment.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub outcomes: Vec<ReconcileOutcome>,
    pub failures: Vec<ReconcileFailure>,
}

#[derive(Clone)]
pub struct DeploymentController {
    deployments: DeploymentRepository,
    pods: PodRepository,
    lifecycle: PodLifecycle,
}

impl DeploymentController {
    pub fn new(
        deployments: DeploymentRepository,
        pods: PodRepository,
        lifecycle: PodLifecycle,
    ) -> Self {
        Self {
            deployments,
            pods,
            lifecycle,
        }
    }

    pub async fn create_deployment(&self, mut deployment: Deployment) -> Result<Deployment> {
        deployment.metadata.namespace = effective_namespace(deployment.namespace()).to_string();

        if self
            .deployments
            .find(deployment.namespace(), deployment.name())
            .await?
            .is_some()
        {
            return Err(OrchestratorError::already_exists(
                ResourceKind::Deployment,
                format!("{}/{}", deployment.namespace(), deployment.name()),
            ));
        }

        if !deployment.template_matches_selector() {
            tracing::warn!(
                "Deployment {} template labels override its selector; created pods will not be counted",
                deployment.key()
            );
        }

        self.deployments.save(&deployment).await?;
        tracing::info!(
            "Created deployment {} with {} replicas",
            deployment.key(),
            deployment.spec.replicas
        );
        Ok(deployment)
    }

    pub async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Option<Deployment>> {
        self.deployments.find(effective_namespace(namespace), name).await
    }

    pub async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<Deployment>> {
        self.deployments
            .list(namespace.map(effective_namespace))
            .await
    }

    /// Replace the spec of an existing deployment. Metadata is kept.
    pub async fn update_deployment(
        &self,
        namespace: &str,
        name: &str,
        spec: DeploymentSpec,
    ) -> Result<Deployment> {
        let mut deployment = self.require_deployment(namespace, name).await?;
        deployment.spec = spec;
        self.deployments.save(&deployment).await?;
        Ok(deployment)
    }

    /// Change only the desired replica count. Pods are not touched until the
    /// next reconcile.
    pub async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: u32,
    ) -> Result<Deployment> {
        let mut deployment = self.require_deployment(namespace, name).await?;
        deployment.spec.replicas = replicas;
        self.deployments.save(&deployment).await?;
        tracing::info!("Scaled deployment {} to {} replicas", deployment.key(), replicas);
        Ok(deployment)
    }

    /// Delete every pod matching the selector, then the deployment record.
    ///
    /// Deleting a deployment that does not exist only removes its (absent)
    /// record. Returns the number of pods deleted.
    pub async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<usize> {
        let namespace = effective_namespace(namespace);
        let mut removed = 0;

        if let Some(deployment) = self.deployments.find(namespace, name).await? {
            for pod in self.matching_pods(&deployment).await? {
                self.lifecycle.delete_pod(pod.namespace(), pod.name()).await?;
                removed += 1;
            }
        }

        self.deployments.delete(namespace, name).await?;
        tracing::info!("Deleted deployment {}/{} and {} pods", namespace, name, removed);
        Ok(removed)
    }

    /// Converge the number of matching pods to the desired replica count.
    ///
    /// Scale-up creates pods from the template one at a time; scale-down
    /// deletes from the front of the (namespace, name) ordered list. A failure
    /// stops the pass immediately and already applied changes stay.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome> {
        let deployment = self.require_deployment(namespace, name).await?;
        let matching = self.matching_pods(&deployment).await?;

        let desired = deployment.spec.replicas as usize;
        let observed = matching.len();
        let mut outcome = ReconcileOutcome {
            namespace: deployment.namespace().to_string(),
            name: deployment.name().to_string(),
            desired: deployment.spec.replicas,
            observed,
            created: Vec::new(),
            deleted: Vec::new(),
        };

        if observed < desired {
            for i in 0..desired - observed {
                let pod = deployment.pod_from_template(&pod_suffix(i));
                let pod = self.lifecycle.create_pod(pod).await?;
                outcome.created.push(pod.name().to_string());
            }
        } else if observed > desired {
            for pod in matching.iter().take(observed - desired) {
                self.lifecycle.delete_pod(pod.namespace(), pod.name()).await?;
                outcome.deleted.push(pod.name().to_string());
            }
        }

        if !outcome.is_converged() {
            tracing::info!(
                "Reconciled {}: desired={} observed={} created={} deleted={}",
                deployment.key(),
                outcome.desired,
                outcome.observed,
                outcome.created.len(),
                outcome.deleted.len()
            );
        }
        Ok(outcome)
    }

    /// Reconcile every stored deployment in order. A failing deployment is
    /// recorded and the pass moves on.
    pub async fn reconcile_all(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for deployment in self.deployments.list(None).await? {
            match self.reconcile(deployment.namespace(), deployment.name()).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(error) => {
                    tracing::warn!("Reconcile of {} failed: {}", deployment.key(), error);
                    report.failures.push(ReconcileFailure {
                        namespace: deployment.namespace().to_string(),
                        name: deployment.name().to_string(),
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn matching_pods(&self, deployment: &Deployment) -> Result<Vec<Pod>> {
        let filter = PodFilter::in_namespace(deployment.namespace())
            .with_selector(deployment.selector().clone());
        self.pods.list(&filter).await
    }

    async fn require_deployment(&self, namespace: &str, name: &str) -> Result<Deployment> {
        let namespace = effective_namespace(namespace);
        self.deployments
            .find(namespace, name)
            .await?
            .ok_or_else(|| {
                OrchestratorError::not_found(
                    ResourceKind::Deployment,
                    format!("{}/{}", namespace, name),
                )
            })
    }
}

/// Unique pod name suffix: wall-clock millis, loop index and a random tail,
/// so overlapping passes do not collide.
fn pod_suffix(index: usize) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", Utc::now().timestamp_millis(), index, &random[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerSpec, LabelSelector, Labels, PodSpec, PodTemplateSpec, TemplateMeta};
    use crate::orchestrator::testing::{Harness, RuntimeCall};

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn web_deployment(replicas: u32) -> Deployment {
        Deployment::new(
            "default",
            "web",
            DeploymentSpec {
                replicas,
                selector: LabelSelector {
                    match_labels: labels(&[("app", "web")]),
                },
                template: PodTemplateSpec {
                    metadata: TemplateMeta {
                        labels: labels(&[("tier", "frontend")]),
                    },
                    spec: PodSpec {
                        containers: vec![ContainerSpec::new("web", "nginx:1.27")],
                        node_name: None,
                    },
                },
            },
        )
    }

    async fn seed_web_pod(harness: &Harness, name: &str) -> Pod {
        let pod = Pod::new("default", name, vec![ContainerSpec::new("web", "nginx:1.27")])
            .with_labels(labels(&[("app", "web")]));
        harness.pods.create_pod(pod).await.unwrap()
    }

    #[tokio::test]
    async fn test_scale_up_creates_missing_replicas() {
        let harness = Harness::with_nodes(&["node-a", "node-b"]).await;
        harness
            .deployments
            .create_deployment(web_deployment(3))
            .await
            .unwrap();
        seed_web_pod(&harness, "web-seed").await;

        let outcome = harness.deployments.reconcile("default", "web").await.unwrap();
        assert_eq!(outcome.observed, 1);
        assert_eq!(outcome.created.len(), 2);
        assert!(outcome.deleted.is_empty());

        let pods = harness.pods.list_pods(&PodFilter::all()).await.unwrap();
        assert_eq!(pods.len(), 3);
        for pod in &pods {
            assert_eq!(pod.metadata.labels.get("app").map(String::as_str), Some("web"));
        }
        for name in &outcome.created {
            assert!(name.starts_with("web-"));
            let pod = harness.pods.get_pod("default", name).await.unwrap().unwrap();
            assert_eq!(pod.metadata.labels.get("tier").map(String::as_str), Some("frontend"));
            assert!(pod.runtime_handle.is_some());
        }
    }

    #[tokio::test]
    async fn test_reconcile_is_a_fixed_point() {
        let harness = Harness::with_nodes(&["node-a"]).await;
        harness
            .deployments
            .create_deployment(web_deployment(2))
            .await
            .unwrap();

        let first = harness.deployments.reconcile("default", "web").await.unwrap();
        assert_eq!(first.created.len(), 2);
        let calls_after_first = harness.runtime.calls().await.len();

        let second = harness.deployments.reconcile("default", "web").await.unwrap();
        assert!(second.is_converged());
        assert_eq!(second.observed, 2);
        assert_eq!(harness.runtime.calls().await.len(), calls_after_first);
    }

    #[tokio::test]
    async fn test_scale_down_deletes_from_the_front() {
        let harness = Harness::with_nodes(&["node-a"]).await;
        harness
            .deployments
            .create_deployment(web_deployment(1))
            .await
            .unwrap();
        let first = seed_web_pod(&harness, "web-a").await;
        seed_web_pod(&harness, "web-b").await;

        let outcome = harness.deployments.reconcile("default", "web").await.unwrap();
        assert_eq!(outcome.deleted, vec!["web-a".to_string()]);
        assert!(outcome.created.is_empty());

        let remaining = harness.pods.list_pods(&PodFilter::all()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name(), "web-b");
        assert_eq!(
            harness.runtime.calls().await.last(),
            Some(&RuntimeCall::Stop(first.runtime_handle.unwrap()))
        );
    }

    #[tokio::test]
    async fn test_reconcile_ignores_other_namespaces_and_labels() {
        let harness = Harness::with_nodes(&["node-a"]).await;
        harness
            .deployments
            .create_deployment(web_deployment(1))
            .await
            .unwrap();
        let other_ns = Pod::new("staging", "web-x", vec![ContainerSpec::new("web", "nginx")])
            .with_labels(labels(&[("app", "web")]));
        let other_app = Pod::new("default", "api-x", vec![ContainerSpec::new("api", "api")])
            .with_labels(labels(&[("app", "api")]));
        harness.pods.create_pod(other_ns).await.unwrap();
        harness.pods.create_pod(other_app).await.unwrap();

        let outcome = harness.deployments.reconcile("default", "web").await.unwrap();
        assert_eq!(outcome.observed, 0);
        assert_eq!(outcome.created.len(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_missing_deployment() {
        let harness = Harness::with_nodes(&["node-a"]).await;

        let err = harness.deployments.reconcile("default", "ghost").await.unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::NotFound {
                kind: ResourceKind::Deployment,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_reconcile_without_nodes_propagates() {
        let harness = Harness::with_nodes(&[]).await;
        harness
            .deployments
            .create_deployment(web_deployment(2))
            .await
            .unwrap();

        let err = harness.deployments.reconcile("default", "web").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NoAvailableTargets));
    }

    #[tokio::test]
    async fn test_partial_scale_up_is_kept() {
        let harness = Harness::with_nodes(&["node-a"]).await;
        harness
            .deployments
            .create_deployment(web_deployment(3))
            .await
            .unwrap();
        harness.runtime.fail_launches_after(1).await;

        assert!(harness.deployments.reconcile("default", "web").await.is_err());

        // One launched pod plus one assigned but unlaunched pod remain.
        let pods = harness.pods.list_pods(&PodFilter::all()).await.unwrap();
        assert_eq!(pods.len(), 2);
        assert_eq!(harness.pods.find_unlaunched(Some("default")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_and_defaults_namespace() {
        let harness = Harness::with_nodes(&["node-a"]).await;
        let mut deployment = web_deployment(1);
        deployment.metadata.namespace = String::new();

        let created = harness
            .deployments
            .create_deployment(deployment.clone())
            .await
            .unwrap();
        assert_eq!(created.namespace(), "default");

        let err = harness
            .deployments
            .create_deployment(deployment)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_scale_and_update_keep_identity() {
        let harness = Harness::with_nodes(&["node-a"]).await;
        let created = harness
            .deployments
            .create_deployment(web_deployment(1))
            .await
            .unwrap();

        let scaled = harness
            .deployments
            .scale_deployment("default", "web", 4)
            .await
            .unwrap();
        assert_eq!(scaled.spec.replicas, 4);
        assert_eq!(scaled.metadata.uid, created.metadata.uid);
        assert!(harness.runtime.calls().await.is_empty());

        let updated = harness
            .deployments
            .update_deployment("default", "web", web_deployment(2).spec)
            .await
            .unwrap();
        assert_eq!(updated.spec.replicas, 2);
        assert_eq!(updated.metadata.uid, created.metadata.uid);

        let err = harness
            .deployments
            .scale_deployment("default", "ghost", 1)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_matching_pods() {
        let harness = Harness::with_nodes(&["node-a"]).await;
        harness
            .deployments
            .create_deployment(web_deployment(2))
            .await
            .unwrap();
        harness.deployments.reconcile("default", "web").await.unwrap();
        let unrelated = Pod::new("default", "db", vec![ContainerSpec::new("db", "postgres")]);
        harness.pods.create_pod(unrelated).await.unwrap();

        let removed = harness
            .deployments
            .delete_deployment("default", "web")
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let remaining = harness.pods.list_pods(&PodFilter::all()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name(), "db");
        assert!(harness.deployments.get_deployment("default", "web").await.unwrap().is_none());

        assert_eq!(
            harness.deployments.delete_deployment("default", "web").await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_reconcile_all_collects_failures() {
        let harness = Harness::with_nodes(&["node-a"]).await;
        harness
            .deployments
            .create_deployment(web_deployment(1))
            .await
            .unwrap();
        let mut broken = web_deployment(1);
        broken.metadata.name = "broken".to_string();
        broken.spec.selector.match_labels = labels(&[("app", "broken")]);
        broken.spec.template.spec.containers.clear();
        harness.deployments.create_deployment(broken).await.unwrap();

        let report = harness.deployments.reconcile_all().await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].name, "web");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "broken");
    }

    #[test]
    fn test_pod_suffixes_differ() {
        assert_ne!(pod_suffix(0), pod_suffix(0));
        assert!(pod_suffix(3).contains("-3-"));
    }
}
