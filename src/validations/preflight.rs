//! Fail-fast preflight sequences for create, upgrade and management
//! component rollouts.

use tracing::info;

use super::extended_support::ExtendedSupportGate;
use super::management::{
    reconcile_management_skew, validate_eksa_release_exists, validate_management_cluster_name,
    validate_not_paused,
};
use super::registry_mirror::validate_registry_mirror;
use super::skew::{
    validate_cli_version, validate_management_components_skew, validate_management_eksa_version,
    validate_upgrade_skew,
};
use crate::domain::cluster_config::ClusterConfig;
use crate::error::ValidationError;
use crate::k8s::KubeClient;
use crate::tls::TlsValidator;
use crate::version::Version;

pub struct Preflight<'a> {
    /// Client for the management cluster, or the cluster itself when self-managed.
    kube: &'a dyn KubeClient,
    tls: &'a dyn TlsValidator,
    extended_support: ExtendedSupportGate<'a>,
    cli_version: Version,
}

impl<'a> Preflight<'a> {
    pub fn new(
        kube: &'a dyn KubeClient,
        tls: &'a dyn TlsValidator,
        extended_support: ExtendedSupportGate<'a>,
        cli_version: Version,
    ) -> Self {
        Self {
            kube,
            tls,
            extended_support,
            cli_version,
        }
    }

    pub fn create(&self, config: &ClusterConfig) -> Result<(), ValidationError> {
        let cluster = &config.cluster;
        info!(cluster = %cluster.name(), "running create preflight");

        validate_registry_mirror(config, self.tls)?;

        if cluster.is_managed() {
            let mgmt = validate_management_cluster_name(
                self.kube,
                cluster.management_cluster_name(),
                cluster.namespace(),
            )?;
            // Status on a cluster that does not exist yet is never persisted.
            let mut proposed = cluster.clone();
            validate_management_eksa_version(&mgmt, &mut proposed)?;
            validate_eksa_release_exists(self.kube, cluster)?;
        }

        self.extended_support
            .validate(cluster, config.bundles_override.as_ref())
    }

    pub fn upgrade(&self, config: &ClusterConfig) -> Result<(), ValidationError> {
        let cluster = &config.cluster;
        info!(cluster = %cluster.name(), "running upgrade preflight");

        let current = self.kube.get_cluster(cluster.name(), cluster.namespace())?;
        validate_not_paused(&current)?;
        validate_cli_version(&self.cli_version, cluster)?;
        validate_upgrade_skew(cluster, &current)?;

        if cluster.is_managed() {
            reconcile_management_skew(self.kube, cluster.name(), cluster.namespace())?;
            let mgmt = validate_management_cluster_name(
                self.kube,
                cluster.management_cluster_name(),
                cluster.namespace(),
            )?;
            let mut proposed = cluster.clone();
            validate_management_eksa_version(&mgmt, &mut proposed)?;
        }

        validate_registry_mirror(config, self.tls)?;
        self.extended_support
            .validate(cluster, config.bundles_override.as_ref())
    }

    /// Rolling new management components onto `config`'s management cluster.
    pub fn management_components(
        &self,
        config: &ClusterConfig,
        components_version: &str,
    ) -> Result<(), ValidationError> {
        let cluster = &config.cluster;
        let mgmt = self
            .kube
            .get_cluster(cluster.management_cluster_name(), cluster.namespace())?;
        validate_management_components_skew(&mgmt, components_version)
    }
}
