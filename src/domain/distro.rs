//! EKS Distro release manifest (`distro.eks.amazonaws.com/v1alpha1`, kind `Release`).

use serde::{Deserialize, Serialize};

use super::cluster::ObjectMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistroRelease {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: DistroReleaseSpec,
    #[serde(default)]
    pub status: DistroReleaseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistroReleaseSpec {
    /// Kubernetes minor as `1-28`
    pub channel: String,
    #[serde(default)]
    pub number: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistroReleaseStatus {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub components: Vec<DistroComponent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistroComponent {
    pub name: String,
    #[serde(default)]
    pub git_tag: String,
}

impl DistroRelease {
    /// Whether this release is for Kubernetes `kube_version` (`1.28`).
    pub fn is_for(&self, kube_version: &str) -> bool {
        self.spec.channel == kube_version.replace('.', "-")
    }
}
