//! Release bundles and the EKS-A releases manifest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::cluster::ObjectMeta;
use crate::manifests::ManifestLocation;

/// Annotation carrying `sha256:<hex>` of the bundle's canonical spec.
pub const BUNDLE_DIGEST_ANNOTATION: &str = "anywhere.eks.amazonaws.com/bundle-digest";

/// The `Bundles` manifest: one sub-bundle per supported Kubernetes version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundles {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: BundlesSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundlesSpec {
    #[serde(default)]
    pub number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli_max_version: Option<String>,
    #[serde(default)]
    pub versions_bundles: Vec<VersionsBundle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionsBundle {
    pub kube_version: String,
    /// `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_of_standard_support: Option<String>,
    pub eks_d: EksDRelease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EksDRelease {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub kube_version: String,
    pub release_url: ManifestLocation,
}

impl Bundles {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn versions_bundle(&self, kube_version: &str) -> Option<&VersionsBundle> {
        self.spec
            .versions_bundles
            .iter()
            .find(|vb| vb.kube_version == kube_version)
    }

    /// `sha256:<hex>` over the JSON encoding of `spec`.
    pub fn spec_digest(&self) -> Result<String, serde_json::Error> {
        let canonical = serde_json::to_vec(&self.spec)?;
        Ok(format!("sha256:{:x}", Sha256::digest(&canonical)))
    }

    pub fn declared_digest(&self) -> Option<&str> {
        self.metadata
            .annotations
            .get(BUNDLE_DIGEST_ANNOTATION)
            .map(String::as_str)
    }

    /// Stamp the digest annotation from the current spec.
    #[cfg(test)]
    pub fn seal(&mut self) -> Result<(), serde_json::Error> {
        let digest = self.spec_digest()?;
        self.metadata
            .annotations
            .insert(BUNDLE_DIGEST_ANNOTATION.to_string(), digest);
        Ok(())
    }
}

/// The EKS-A releases manifest listing every published CLI release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasesManifest {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: ReleasesSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasesSpec {
    #[serde(default)]
    pub latest_version: String,
    #[serde(default)]
    pub releases: Vec<EksaReleaseEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EksaReleaseEntry {
    pub version: String,
    #[serde(default)]
    pub number: i64,
    pub bundle_manifest_url: ManifestLocation,
}

/// Name of the `EKSARelease` object published for `version`
/// (`v0.19.0` → `eksa-v0-19-0`).
pub fn eksa_release_name(version: &str) -> String {
    format!("eksa-{}", version.replace('.', "-"))
}
