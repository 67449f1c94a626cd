//! Support bundle collection.
//!
//! The orchestrator in `commands::support_bundle` only sequences these
//! capabilities; collection itself is delegated to a [`DiagnosticBundle`].

pub mod kubeconfig;
pub mod troubleshoot;
pub mod window;

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::cluster_config::ClusterConfig;
use crate::provider::ProviderKind;

/// Everything a factory needs to build a bundle for one cluster.
pub struct BundleRequest<'a> {
    pub config: &'a ClusterConfig,
    pub provider: ProviderKind,
    pub kubeconfig: PathBuf,
    /// User-supplied SupportBundle spec replacing the generated one.
    pub bundle_config: Option<PathBuf>,
    pub audit_logs: bool,
}

pub trait DiagnosticBundle {
    /// Collect logs newer than `since` (everything when `None`) and analyze them.
    fn collect_and_analyze(&mut self, since: Option<DateTime<Utc>>) -> Result<()>;

    fn print_analysis(&self) -> Result<()>;
}

pub trait DiagnosticBundleFactory {
    fn diagnostic_bundle(&self, request: BundleRequest<'_>) -> Result<Box<dyn DiagnosticBundle>>;
}
