//! Deployments: a desired replica count of a templated pod.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Labels, ObjectMeta, Pod, PodSpec, labels_match};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default)]
    pub match_labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateMeta {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    #[serde(default)]
    pub metadata: TemplateMeta,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub replicas: u32,
    #[serde(default)]
    pub selector: LabelSelector,
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
}

impl Deployment {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: DeploymentSpec) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Storage key, `deployments/<namespace>/<name>`.
    pub fn key(&self) -> String {
        Self::key_for(self.namespace(), self.name())
    }

    pub fn key_for(namespace: &str, name: &str) -> String {
        format!("deployments/{}/{}", namespace, name)
    }

    pub fn selector(&self) -> &Labels {
        &self.spec.selector.match_labels
    }

    /// Labels stamped on every pod this deployment creates: the selector
    /// labels overlaid with the template labels (template wins on conflict).
    pub fn pod_labels(&self) -> Labels {
        let mut labels = self.spec.selector.match_labels.clone();
        labels.extend(self.spec.template.metadata.labels.clone());
        labels
    }

    /// Whether pods built from the template would be matched by the selector.
    /// False when a template label overrides a selector label with a
    /// different value.
    pub fn template_matches_selector(&self) -> bool {
        labels_match(self.selector(), &self.pod_labels())
    }

    /// Build a new, not yet persisted pod named `<deployment>-<suffix>`.
    pub fn pod_from_template(&self, suffix: &str) -> Pod {
        let mut pod = Pod::new(
            self.namespace(),
            format!("{}-{}", self.name(), suffix),
            self.spec.template.spec.containers.clone(),
        );
        pod.metadata.labels = self.pod_labels();
        pod
    }
}
