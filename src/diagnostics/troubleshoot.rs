//! Support bundles through the troubleshoot `support-bundle` binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Deserialize;
use serde_json::json;
use tempfile::TempDir;
use tracing::{debug, info};

use super::{BundleRequest, DiagnosticBundle, DiagnosticBundleFactory};
use crate::domain::bundle::Bundles;
use crate::domain::cluster::EKSA_SYSTEM_NAMESPACE;
use crate::manifests::{read_yaml, ManifestReader};
use crate::provider::ProviderKind;

const SUPPORT_BUNDLE_API_VERSION: &str = "troubleshoot.sh/v1beta2";
const AUDIT_LOG_PATH: &str = "/var/log/kubernetes/api-audit.log";
const HOST_COLLECTOR_IMAGE: &str = "public.ecr.aws/docker/library/busybox:latest";

/// Namespaces collected for every provider.
const COMMON_NAMESPACES: &[&str] = &[
    EKSA_SYSTEM_NAMESPACE,
    "capi-system",
    "capi-kubeadm-bootstrap-system",
    "capi-kubeadm-control-plane-system",
    "cert-manager",
    "etcdadm-bootstrap-provider-system",
    "etcdadm-controller-system",
    "kube-system",
];

pub struct TroubleshootFactory {
    binary: PathBuf,
    reader: Box<dyn ManifestReader>,
}

impl TroubleshootFactory {
    pub fn new(binary: impl Into<PathBuf>, reader: Box<dyn ManifestReader>) -> Self {
        Self {
            binary: binary.into(),
            reader,
        }
    }
}

impl DiagnosticBundleFactory for TroubleshootFactory {
    fn diagnostic_bundle(&self, request: BundleRequest<'_>) -> Result<Box<dyn DiagnosticBundle>> {
        let cluster_name = request.config.cluster.name().to_string();

        let spec = match &request.bundle_config {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading bundle config {}", path.display()))?,
            None => {
                let bundles = match &request.config.bundles_override {
                    Some(location) => Some(
                        read_yaml::<Bundles>(self.reader.as_ref(), location)
                            .with_context(|| format!("reading bundles manifest {}", location))?,
                    ),
                    None => None,
                };
                support_bundle_spec(
                    &cluster_name,
                    request.provider,
                    request.audit_logs,
                    bundles.as_ref(),
                )?
            }
        };

        Ok(Box::new(TroubleshootBundle {
            binary: self.binary.clone(),
            cluster_name,
            kubeconfig: request.kubeconfig,
            spec,
            workdir: tempfile::tempdir().context("creating support bundle work dir")?,
            archive: None,
            analysis: Vec::new(),
        }))
    }
}

/// Generated `SupportBundle` document for `cluster_name`.
pub fn support_bundle_spec(
    cluster_name: &str,
    provider: ProviderKind,
    audit_logs: bool,
    bundles: Option<&Bundles>,
) -> Result<String> {
    let namespaces: Vec<&str> = COMMON_NAMESPACES
        .iter()
        .chain(provider.controller_namespaces())
        .copied()
        .fold(Vec::new(), |mut acc, ns| {
            if !acc.contains(&ns) {
                acc.push(ns);
            }
            acc
        });

    let mut collectors = vec![
        json!({ "clusterInfo": {} }),
        json!({ "clusterResources": { "namespaces": namespaces } }),
    ];
    collectors.extend(namespaces.iter().map(|ns| {
        json!({ "logs": { "name": format!("logs/{ns}"), "namespace": ns } })
    }));

    if audit_logs {
        collectors.push(json!({
            "copyFromHost": {
                "name": "audit-logs",
                "namespace": EKSA_SYSTEM_NAMESPACE,
                "hostPath": AUDIT_LOG_PATH,
                "image": HOST_COLLECTOR_IMAGE,
            }
        }));
    }

    if let Some(bundles) = bundles {
        collectors.push(json!({
            "data": {
                "name": "eksa/bundles.yaml",
                "data": serde_yaml::to_string(bundles).context("encoding bundles manifest")?,
            }
        }));
    }

    let spec = json!({
        "apiVersion": SUPPORT_BUNDLE_API_VERSION,
        "kind": "SupportBundle",
        "metadata": { "name": format!("{cluster_name}-support-bundle") },
        "spec": {
            "collectors": collectors,
            "analyzers": [
                { "clusterVersion": { "outcomes": [
                    { "pass": { "message": "Kubernetes API server is reachable" } }
                ] } },
                { "deploymentStatus": {
                    "name": "eksa-controller-manager",
                    "namespace": EKSA_SYSTEM_NAMESPACE,
                    "outcomes": [
                        { "fail": { "when": "< 1", "message": "eksa-controller-manager is not ready" } },
                        { "pass": { "message": "eksa-controller-manager is ready" } }
                    ]
                } },
                { "deploymentStatus": {
                    "name": "capi-controller-manager",
                    "namespace": "capi-system",
                    "outcomes": [
                        { "fail": { "when": "< 1", "message": "capi-controller-manager is not ready" } },
                        { "pass": { "message": "capi-controller-manager is ready" } }
                    ]
                } }
            ]
        }
    });

    serde_yaml::to_string(&spec).context("encoding support bundle spec")
}

/// One analyzer outcome from `support-bundle analyze --output json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub insight: Insight,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Insight {
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
    #[default]
    #[serde(other)]
    Debug,
}

pub fn parse_analysis(json: &str) -> Result<Vec<AnalysisResult>> {
    let trimmed = json.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("decoding support bundle analysis")
}

pub struct TroubleshootBundle {
    binary: PathBuf,
    cluster_name: String,
    kubeconfig: PathBuf,
    spec: String,
    workdir: TempDir,
    archive: Option<PathBuf>,
    analysis: Vec<AnalysisResult>,
}

impl TroubleshootBundle {
    fn run(&self, args: &[&str]) -> Result<String> {
        debug!(binary = %self.binary.display(), args = ?args, "running support-bundle");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .with_context(|| format!("running {}", self.binary.display()))?;

        if !output.status.success() {
            bail!(
                "{} {} failed: {}",
                self.binary.display(),
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn archive_path(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("resolving working directory")?;
        Ok(cwd.join(format!(
            "{}-support-bundle-{}.tar.gz",
            self.cluster_name,
            now.format("%Y-%m-%dT%H_%M_%S")
        )))
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

impl DiagnosticBundle for TroubleshootBundle {
    fn collect_and_analyze(&mut self, since: Option<DateTime<Utc>>) -> Result<()> {
        let spec_path = self.workdir.path().join("support-bundle.yaml");
        std::fs::write(&spec_path, &self.spec)
            .with_context(|| format!("writing {}", spec_path.display()))?;

        let archive = self.archive_path(Utc::now())?;
        let spec_arg = path_arg(&spec_path);
        let kubeconfig_arg = path_arg(&self.kubeconfig);
        let archive_arg = path_arg(&archive);
        let since_arg = since.map(|t| t.to_rfc3339());

        let mut args = vec![
            spec_arg.as_str(),
            "--kubeconfig",
            kubeconfig_arg.as_str(),
            "--interactive=false",
            "--output",
            archive_arg.as_str(),
        ];
        if let Some(since) = &since_arg {
            args.extend(["--since-time", since.as_str()]);
        }

        info!(cluster = %self.cluster_name, since = ?since_arg, "collecting support bundle");
        self.run(&args)?;
        info!(archive = %archive.display(), "support bundle written");

        let stdout = self.run(&[
            "analyze",
            "--bundle",
            archive_arg.as_str(),
            spec_arg.as_str(),
            "--output",
            "json",
        ])?;
        self.analysis = parse_analysis(&stdout)?;
        self.archive = Some(archive);
        Ok(())
    }

    fn print_analysis(&self) -> Result<()> {
        println!("{}", format!("support bundle analysis: {}", self.cluster_name).bold());
        if self.analysis.is_empty() {
            println!("{} no analyzer results", "::".blue().bold());
        }
        for result in &self.analysis {
            let marker = match result.severity {
                Severity::Error => "!!".red().bold(),
                Severity::Warn => "!!".yellow().bold(),
                Severity::Info => "ok".green().bold(),
                Severity::Debug => "::".blue().bold(),
            };
            println!("{} {:<32} {}", marker, result.name, result.insight.primary);
            if !result.insight.detail.is_empty() {
                println!("   {}", result.insight.detail.dimmed());
            }
        }
        if let Some(archive) = &self.archive {
            println!("  bundle: {}", archive.display());
        }
        Ok(())
    }
}
