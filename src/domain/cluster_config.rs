//! Cluster config file, the multi-document YAML a user hands to the CLI.
//!
//! Holds the `Cluster` plus the provider documents the checks need: the
//! datacenter config named by `datacenterRef` and every `*MachineConfig`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::cluster::Cluster;
use crate::manifests::ManifestLocation;
use crate::provider::{OsFamily, ProviderKind};

#[derive(Debug, Clone, PartialEq)]
pub struct MachineConfig {
    pub kind: String,
    pub name: String,
    pub os_family: Option<OsFamily>,
}

#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub cluster: Cluster,
    pub datacenter: Option<serde_yaml::Value>,
    pub machine_configs: Vec<MachineConfig>,
    /// Bundles manifest to use instead of resolving by `eksaVersion`.
    pub bundles_override: Option<ManifestLocation>,
}

impl ClusterConfig {
    /// Load from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read cluster config from {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse cluster config from {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut cluster: Option<Cluster> = None;
        let mut others: Vec<serde_yaml::Value> = Vec::new();

        for document in serde_yaml::Deserializer::from_str(content) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            match value.get("kind").and_then(|k| k.as_str()) {
                Some("Cluster") => {
                    if cluster.is_some() {
                        bail!("more than one Cluster document");
                    }
                    cluster = Some(serde_yaml::from_value(value)?);
                }
                Some(_) => others.push(value),
                None => bail!("document without a kind"),
            }
        }

        let cluster = cluster.context("no Cluster document found")?;
        let datacenter_kind = &cluster.spec.datacenter_ref.kind;

        let datacenter = others
            .iter()
            .find(|doc| doc.get("kind").and_then(|k| k.as_str()) == Some(datacenter_kind.as_str()))
            .cloned();

        let machine_configs = others
            .iter()
            .filter_map(|doc| {
                let kind = doc.get("kind")?.as_str()?;
                if !kind.ends_with("MachineConfig") {
                    return None;
                }
                let name = doc
                    .get("metadata")
                    .and_then(|m| m.get("name"))
                    .and_then(|n| n.as_str())
                    .unwrap_or_default();
                let os_family = doc
                    .get("spec")
                    .and_then(|s| s.get("osFamily"))
                    .and_then(|f| serde_yaml::from_value(f.clone()).ok());
                Some(MachineConfig {
                    kind: kind.to_string(),
                    name: name.to_string(),
                    os_family,
                })
            })
            .collect();

        Ok(ClusterConfig {
            cluster,
            datacenter,
            machine_configs,
            bundles_override: None,
        })
    }

    pub fn with_bundles_override(mut self, location: Option<ManifestLocation>) -> Self {
        self.bundles_override = location;
        self
    }

    pub fn provider(&self) -> Result<ProviderKind> {
        self.cluster.provider()
    }

    /// Schema-level checks every command runs before touching a cluster.
    pub fn validate(&self) -> Result<()> {
        validate_cluster_name(self.cluster.name())?;
        if self.cluster.spec.kubernetes_version.is_empty() {
            bail!("cluster {} has no kubernetesVersion", self.cluster.name());
        }
        self.provider()?;
        if self.datacenter.is_none() {
            bail!(
                "datacenter config {} '{}' not found in cluster config",
                self.cluster.spec.datacenter_ref.kind,
                self.cluster.spec.datacenter_ref.name
            );
        }
        Ok(())
    }
}

/// Cluster names become DNS labels and kubeconfig file names.
fn validate_cluster_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && !name.ends_with('-');
    if !valid {
        bail!(
            "cluster name '{}' is invalid: must be a lowercase RFC 1123 label starting with a letter",
            name
        );
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::fixtures::WORKLOAD_CONFIG;
    use super::*;

    #[test]
    fn splits_documents_by_kind() {
        let config = ClusterConfig::parse(WORKLOAD_CONFIG).unwrap();
        assert_eq!(config.cluster.name(), "w01");
        assert!(config.datacenter.is_some());
        assert_eq!(config.machine_configs.len(), 2);
        assert_eq!(config.machine_configs[0].name, "w01-cp");
        assert_eq!(
            config.machine_configs[0].os_family,
            Some(OsFamily::Bottlerocket)
        );
        assert_eq!(config.provider().unwrap(), ProviderKind::VSphere);
        config.validate().unwrap();
    }

    #[test]
    fn requires_exactly_one_cluster() {
        assert!(ClusterConfig::parse("kind: VSphereDatacenterConfig\nmetadata:\n  name: x\n").is_err());
        let twice = format!("{WORKLOAD_CONFIG}\n---\nkind: Cluster\nmetadata:\n  name: other\n");
        assert!(ClusterConfig::parse(&twice).is_err());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w01.yaml");
        std::fs::write(&path, WORKLOAD_CONFIG).unwrap();
        let config = ClusterConfig::load(&path)
            .unwrap()
            .with_bundles_override(Some(ManifestLocation::parse("bundles.yaml")));
        assert!(matches!(
            config.bundles_override,
            Some(ManifestLocation::Local { .. })
        ));

        let err = ClusterConfig::load(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to read cluster config"));
    }

    #[test]
    fn rejects_bad_names() {
        for bad in ["", "W01", "1abc", "abc-", "a_b"] {
            assert!(validate_cluster_name(bad).is_err(), "{bad:?}");
        }
        validate_cluster_name("mgmt-01").unwrap();
    }

    #[test]
    fn validate_requires_matching_datacenter_document() {
        let only_cluster = WORKLOAD_CONFIG.split("\n---\n").next().unwrap();
        let config = ClusterConfig::parse(only_cluster).unwrap();
        assert!(config.validate().is_err());
    }
}
