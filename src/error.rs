//! Error types for preflight validations

use std::path::PathBuf;

use thiserror::Error;

use crate::k8s::KubeError;
use crate::manifests::{FetchFailure, ManifestError};
use crate::tls::TlsError;
use crate::validations::bundles::LookupFailure;
use crate::version::{ParseVersionError, Version};

/// Every way a preflight check can deny an operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// A version string could not be parsed
    #[error("parsing {what}")]
    InvalidVersion {
        what: &'static str,
        #[source]
        source: ParseVersionError,
    },

    /// Cluster version differs from the running CLI
    #[error("cluster's eksaVersion {cluster} does not match EKS-Anywhere CLI's version {cli}")]
    VersionMismatch { cluster: Version, cli: Version },

    /// Workload cluster ahead of its management cluster
    #[error(
        "cannot upgrade workload cluster to {workload} while management cluster is an older version: {management}"
    )]
    VersionSkewViolation {
        workload: Version,
        management: Version,
    },

    /// Management components outside the one-minor window
    #[error(
        "management components version {proposed} can only be one minor version greater than cluster version {current}"
    )]
    UnsupportedSkew { proposed: Version, current: Version },

    /// Cluster upgrade skips a minor version or changes major
    #[error("cannot upgrade from {from} to {to}: only +1 minor version skew is supported")]
    UpgradeSkew { from: Version, to: Version },

    #[error("cannot downgrade from {from} to {to}")]
    Downgrade { from: Version, to: Version },

    #[error("{what} EksaVersion not specified")]
    MissingVersion { what: String },

    #[error("getting bundle for cluster from {location}")]
    BundleRead {
        location: String,
        #[source]
        source: ManifestError,
    },

    #[error("getting bundle for cluster version {version}")]
    BundleLookup {
        version: Version,
        #[source]
        source: LookupFailure,
    },

    #[error("kubernetes version {kubernetes_version} is not supported by bundles manifest {bundles}")]
    VersionNotFound {
        kubernetes_version: String,
        bundles: String,
    },

    #[error("reading eksd release manifest file {}", .path.display())]
    LocalRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fetching eksd release manifest from URL {url}")]
    Fetch {
        url: String,
        #[source]
        source: FetchFailure,
    },

    #[error("unmarshalling eksd release manifest {location}")]
    Decode {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("insecureSkipVerify is not supported for {os}")]
    RegistryMirrorUnsupported { os: String },

    #[error(
        "registry {endpoint} is using self-signed certs, please provide the certificate using caCertContent field. Or use insecureSkipVerify field to skip registry certificate verification"
    )]
    RegistryTrust { endpoint: String },

    #[error("validating registry mirror endpoint {endpoint}")]
    RegistryHandshake {
        endpoint: String,
        #[source]
        source: TlsError,
    },

    #[error("invalid registry certificate for {endpoint}")]
    RegistryCertInvalid {
        endpoint: String,
        #[source]
        source: TlsError,
    },

    #[error("authenticated registry mirror requires {0} to be set")]
    RegistryCredentials(&'static str),

    #[error("{name} is not a valid management cluster")]
    InvalidManagementCluster { name: String },

    #[error("cluster {name} cannot be upgraded with paused cluster controller reconciler")]
    ReconcilePaused { name: String },

    #[error("validating bundle signature for {bundles}: {reason}")]
    BundleDigest { bundles: String, reason: String },

    #[error("extended kubernetes version support: {0}")]
    ExtendedSupport(String),

    /// Kubernetes API access failed, including missing objects
    #[error(transparent)]
    Kube(#[from] KubeError),
}

impl ValidationError {
    pub fn invalid_version(what: &'static str, source: ParseVersionError) -> Self {
        Self::InvalidVersion { what, source }
    }

    pub fn missing_version(what: impl Into<String>) -> Self {
        Self::MissingVersion { what: what.into() }
    }

    pub fn extended_support(msg: impl Into<String>) -> Self {
        Self::ExtendedSupport(msg.into())
    }

    /// True when the underlying Kubernetes object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kube(e) if e.is_not_found())
    }
}
