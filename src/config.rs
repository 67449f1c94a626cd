use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::version::Version;

pub const DEFAULT_RELEASES_MANIFEST_URL: &str =
    "https://anywhere-assets.eks.amazonaws.com/releases/eks-a/manifest.yaml";

const ENV_PREFIX: &str = "EKSA_PREFLIGHT_";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub releases_manifest_url: String,
    /// Seconds; `0` leaves the HTTP client's default in place.
    pub http_timeout_secs: u64,
    pub support_bundle_binary: PathBuf,
    /// Version reported as the running CLI, `v{CARGO_PKG_VERSION}` when unset.
    pub cli_version: Option<String>,
    /// Require a matching `bundle-digest` annotation on resolved bundles.
    pub verify_bundle_digest: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_format: LogFormat::Text,
            releases_manifest_url: DEFAULT_RELEASES_MANIFEST_URL.to_string(),
            http_timeout_secs: 30,
            support_bundle_binary: PathBuf::from("support-bundle"),
            cli_version: None,
            verify_bundle_digest: false,
        }
    }
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("eksa-preflight").join("config.yaml"))
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        (self.http_timeout_secs > 0).then(|| Duration::from_secs(self.http_timeout_secs))
    }

    pub fn cli_version(&self) -> Result<Version> {
        let raw = self
            .cli_version
            .clone()
            .unwrap_or_else(|| format!("v{}", env!("CARGO_PKG_VERSION")));
        Version::parse(&raw).with_context(|| format!("parsing CLI version {}", raw))
    }
}

fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
}

/// Defaults, then the YAML file (`explicit` or the per-user default), then
/// `EKSA_PREFLIGHT_*` environment variables.
pub fn load(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("config file {} does not exist", p.display());
            }
            p.to_path_buf()
        }
        None => Config::path()?,
    };
    figment(&path)
        .extract()
        .with_context(|| format!("loading config from {}", path.display()))
}
