//! EKS-A `Cluster` resource: the subset of fields the preflight checks read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::status::{ClusterStatusFields, FailureReason, FailureStatus};
use crate::provider::ProviderKind;

pub const CLUSTER_API_VERSION: &str = "anywhere.eks.amazonaws.com/v1alpha1";
pub const EKSA_SYSTEM_NAMESPACE: &str = "eksa-system";
pub const PAUSED_ANNOTATION: &str = "anywhere.eks.amazonaws.com/paused";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ClusterSpec,
    #[serde(default, with = "status_fields")]
    pub status: FailureStatus,
}

fn default_api_version() -> String {
    CLUSTER_API_VERSION.to_string()
}

fn default_kind() -> String {
    "Cluster".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub kubernetes_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eksa_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundles_ref: Option<BundlesRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_cluster: Option<ManagementCluster>,
    #[serde(default)]
    pub datacenter_ref: ObjectRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_mirror_configuration: Option<RegistryMirrorConfiguration>,
}

/// Explicit pointer to a `Bundles` object, used instead of `eksaVersion`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlesRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub api_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManagementCluster {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryMirrorConfiguration {
    pub endpoint: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub ca_cert_content: String,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default)]
    pub authenticate: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub oci_namespaces: Vec<OciNamespace>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OciNamespace {
    pub registry: String,
    pub namespace: String,
}

impl Cluster {
    pub fn new(name: &str) -> Self {
        Cluster {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ObjectMeta {
                name: name.to_string(),
                ..Default::default()
            },
            spec: ClusterSpec::default(),
            status: FailureStatus::Clear,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    pub fn eksa_version(&self) -> Option<&str> {
        self.spec.eksa_version.as_deref()
    }

    /// The version to compare against for skew checks. Clusters pinned to an
    /// explicit bundle have none.
    pub fn applicable_eksa_version(&self) -> Option<&str> {
        if self.spec.bundles_ref.is_some() {
            return None;
        }
        self.eksa_version()
    }

    /// Name of the cluster that manages this one; self-managed clusters
    /// name themselves.
    pub fn management_cluster_name(&self) -> &str {
        self.spec
            .management_cluster
            .as_ref()
            .map(|m| m.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.metadata.name)
    }

    /// True for workload clusters that point at a different management cluster.
    pub fn is_managed(&self) -> bool {
        self.management_cluster_name() != self.metadata.name
    }

    pub fn is_reconcile_paused(&self) -> bool {
        self.metadata
            .annotations
            .get(PAUSED_ANNOTATION)
            .is_some_and(|v| v == "true")
    }

    pub fn provider(&self) -> anyhow::Result<ProviderKind> {
        ProviderKind::from_datacenter_kind(&self.spec.datacenter_ref.kind)
    }

    pub fn set_failure(&mut self, reason: FailureReason, message: impl Into<String>) {
        self.status.set_failure(reason, message);
    }

    pub fn clear_failure_if_reason(&mut self, reason: &FailureReason) -> bool {
        self.status.clear_if_reason(reason)
    }
}

/// (De)serializes [`FailureStatus`] as the cluster's `status` object.
mod status_fields {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{ClusterStatusFields, FailureStatus};

    pub fn serialize<S: Serializer>(status: &FailureStatus, s: S) -> Result<S::Ok, S::Error> {
        ClusterStatusFields::from(status.clone()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<FailureStatus, D::Error> {
        let raw = Option::<ClusterStatusFields>::deserialize(d)?;
        Ok(raw.map(FailureStatus::from).unwrap_or_default())
    }
}
