//! `eksa-preflight support-bundle`: collect and analyze a cluster's diagnostics.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::config::Config;
use crate::diagnostics::troubleshoot::TroubleshootFactory;
use crate::diagnostics::{kubeconfig, window, BundleRequest, DiagnosticBundleFactory};
use crate::domain::cluster_config::ClusterConfig;
use crate::manifests::{ManifestLocation, Reader};

pub struct SupportBundleOptions {
    pub file: PathBuf,
    pub w_config: Option<PathBuf>,
    pub since: Option<String>,
    pub since_time: Option<String>,
    pub bundle_config: Option<PathBuf>,
    pub bundles_manifest: Option<String>,
    pub audit_logs: bool,
}

pub fn run(config: &Config, opts: &SupportBundleOptions) -> Result<()> {
    let reader = Reader::new(config.http_timeout()).context("building HTTP client")?;
    let factory = TroubleshootFactory::new(config.support_bundle_binary.clone(), Box::new(reader));

    validate(opts, Path::new("."))?;
    create_bundle(&factory, opts, Utc::now()).context("failed to create support bundle")?;
    println!("{} support bundle complete", "ok".green().bold());
    Ok(())
}

/// The cluster config must be valid and the cluster's generated kubeconfig
/// must exist under `root`.
fn validate(opts: &SupportBundleOptions, root: &Path) -> Result<ClusterConfig> {
    let cluster_config = ClusterConfig::load(&opts.file)?;
    cluster_config.validate()?;
    kubeconfig::validate_filename(&root.join(kubeconfig::from_cluster_name(
        cluster_config.cluster.name(),
    )))?;
    Ok(cluster_config)
}

fn create_bundle(
    factory: &dyn DiagnosticBundleFactory,
    opts: &SupportBundleOptions,
    now: DateTime<Utc>,
) -> Result<()> {
    let cluster_config = ClusterConfig::load(&opts.file)
        .map(|c| {
            c.with_bundles_override(opts.bundles_manifest.as_deref().map(ManifestLocation::parse))
        })
        .and_then(|c| c.validate().map(|_| c))
        .context("unable to get cluster config from file")?;
    let provider = cluster_config.provider()?;

    let mut bundle = factory
        .diagnostic_bundle(BundleRequest {
            config: &cluster_config,
            provider,
            kubeconfig: kubeconfig::resolve(
                cluster_config.cluster.name(),
                opts.w_config.as_deref(),
            ),
            bundle_config: opts.bundle_config.clone(),
            audit_logs: opts.audit_logs,
        })
        .context("failed to parse collector")?;

    let since = window::parse_time_options(
        opts.since.as_deref(),
        opts.since_time.as_deref(),
        now,
    )
    .context("failed parse since time")?;

    bundle
        .collect_and_analyze(since)
        .context("collecting and analyzing bundle")?;
    bundle.print_analysis().context("printing analysis")?;
    Ok(())
}
