//! `eksa-preflight validate`: run the preflight for a lifecycle operation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::Config;
use crate::diagnostics::kubeconfig;
use crate::domain::cluster_config::ClusterConfig;
use crate::k8s::KubeApi;
use crate::manifests::{ManifestLocation, Reader};
use crate::tls::HttpsTlsValidator;
use crate::validations::bundles::ReleasesManifestLookup;
use crate::validations::extended_support::{EndOfStandardSupportPolicy, ExtendedSupportGate};
use crate::validations::Preflight;

/// Inputs shared by every `validate` subcommand.
pub struct ValidateArgs {
    pub file: PathBuf,
    pub bundles_override: Option<String>,
    pub management_kubeconfig: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub enum Operation {
    Create,
    Upgrade,
    ManagementComponents,
}

impl Operation {
    fn label(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Upgrade => "upgrade",
            Operation::ManagementComponents => "management components",
        }
    }
}

pub fn create(config: &Config, args: &ValidateArgs) -> Result<()> {
    run(config, args, Operation::Create, None)
}

pub fn upgrade(config: &Config, args: &ValidateArgs) -> Result<()> {
    run(config, args, Operation::Upgrade, None)
}

pub fn management_components(
    config: &Config,
    args: &ValidateArgs,
    components_version: &str,
) -> Result<()> {
    run(
        config,
        args,
        Operation::ManagementComponents,
        Some(components_version),
    )
}

fn load_cluster_config(args: &ValidateArgs) -> Result<ClusterConfig> {
    let cluster_config = ClusterConfig::load(&args.file)?
        .with_bundles_override(args.bundles_override.as_deref().map(ManifestLocation::parse));
    cluster_config.validate()?;
    Ok(cluster_config)
}

/// Kubeconfig of the cluster that owns `cluster_config`'s cluster object.
fn management_kubeconfig(cluster_config: &ClusterConfig, explicit: Option<&Path>) -> PathBuf {
    kubeconfig::resolve(
        cluster_config.cluster.management_cluster_name(),
        explicit,
    )
}

fn run(
    config: &Config,
    args: &ValidateArgs,
    operation: Operation,
    components_version: Option<&str>,
) -> Result<()> {
    let cluster_config = load_cluster_config(args)?;
    let name = cluster_config.cluster.name().to_string();

    println!(
        "{} {} preflight for cluster {}",
        ">>".blue().bold(),
        operation.label(),
        name.bold()
    );

    let reader = Reader::new(config.http_timeout()).context("building HTTP client")?;
    let lookup = ReleasesManifestLookup::new(
        &reader,
        ManifestLocation::parse(&config.releases_manifest_url),
    );
    let policy = EndOfStandardSupportPolicy::new().with_digest_verification(config.verify_bundle_digest);
    let gate = ExtendedSupportGate::new(&reader, &lookup, &policy);
    let tls = HttpsTlsValidator::new(config.http_timeout().unwrap_or(std::time::Duration::from_secs(30)));
    let kubeconfig = management_kubeconfig(&cluster_config, args.management_kubeconfig.as_deref());
    let kube = KubeApi::from_kubeconfig(&kubeconfig)
        .with_context(|| format!("connecting to management cluster {}", kubeconfig.display()))?;

    let preflight = Preflight::new(&kube, &tls, gate, config.cli_version()?);
    let result = match (operation, components_version) {
        (Operation::Create, _) => preflight.create(&cluster_config),
        (Operation::Upgrade, _) => preflight.upgrade(&cluster_config),
        (Operation::ManagementComponents, Some(v)) => {
            preflight.management_components(&cluster_config, v)
        }
        (Operation::ManagementComponents, None) => {
            anyhow::bail!("management components version is required")
        }
    };

    result.with_context(|| format!("{} preflight failed for cluster {}", operation.label(), name))?;
    println!(
        "{} {} preflight passed for cluster {}",
        "ok".green().bold(),
        operation.label(),
        name
    );
    Ok(())
}
