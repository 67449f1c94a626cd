//! Resolving the release bundle that applies to a cluster.

use thiserror::Error;
use tracing::debug;

use crate::domain::bundle::{Bundles, ReleasesManifest, VersionsBundle};
use crate::domain::cluster::Cluster;
use crate::error::ValidationError;
use crate::manifests::{read_yaml, ManifestError, ManifestLocation, ManifestReader};
use crate::version::Version;

/// Why no bundle could be found for a version.
#[derive(Debug, Error)]
pub enum LookupFailure {
    #[error("no EKS-A release published for this version")]
    NotReleased,
    #[error("reading releases manifest")]
    Releases(#[source] ManifestError),
    #[error("reading bundles manifest")]
    Bundles(#[source] ManifestError),
}

/// Finds the bundle published for an EKS-A version.
pub trait BundleLookup {
    fn bundles_for_version(&self, version: &Version) -> Result<Bundles, LookupFailure>;
}

/// Looks versions up in the EKS-A releases manifest, then reads the matching
/// release's bundle manifest.
pub struct ReleasesManifestLookup<'a> {
    reader: &'a dyn ManifestReader,
    releases: ManifestLocation,
}

impl<'a> ReleasesManifestLookup<'a> {
    pub fn new(reader: &'a dyn ManifestReader, releases: ManifestLocation) -> Self {
        Self { reader, releases }
    }
}

impl BundleLookup for ReleasesManifestLookup<'_> {
    fn bundles_for_version(&self, version: &Version) -> Result<Bundles, LookupFailure> {
        let manifest: ReleasesManifest =
            read_yaml(self.reader, &self.releases).map_err(LookupFailure::Releases)?;

        // Entries that fail to parse can never equal a valid version.
        let release = manifest
            .spec
            .releases
            .iter()
            .find(|r| Version::parse(&r.version).is_ok_and(|v| &v == version))
            .ok_or(LookupFailure::NotReleased)?;

        debug!(version = %version, bundles = %release.bundle_manifest_url, "found release");
        read_yaml(self.reader, &release.bundle_manifest_url).map_err(LookupFailure::Bundles)
    }
}

/// The bundle for `cluster`: read from `override_location` when given,
/// otherwise looked up by the cluster's `eksaVersion`.
pub fn resolve_bundles(
    cluster: &Cluster,
    override_location: Option<&ManifestLocation>,
    reader: &dyn ManifestReader,
    lookup: &dyn BundleLookup,
) -> Result<Bundles, ValidationError> {
    if let Some(location) = override_location {
        debug!(location = %location, "reading bundles override");
        return read_yaml(reader, location).map_err(|source| ValidationError::BundleRead {
            location: location.to_string(),
            source,
        });
    }

    let raw = cluster
        .eksa_version()
        .ok_or_else(|| ValidationError::missing_version(format!("cluster {}", cluster.name())))?;
    let version =
        Version::parse(raw).map_err(|e| ValidationError::invalid_version("cluster EksaVersion", e))?;
    lookup
        .bundles_for_version(&version)
        .map_err(|source| ValidationError::BundleLookup { version, source })
}

/// The sub-bundle for the cluster's Kubernetes version.
pub fn versions_bundle<'b>(
    bundles: &'b Bundles,
    kubernetes_version: &str,
) -> Result<&'b VersionsBundle, ValidationError> {
    bundles
        .versions_bundle(kubernetes_version)
        .ok_or_else(|| ValidationError::VersionNotFound {
            kubernetes_version: kubernetes_version.to_string(),
            bundles: bundles.name().to_string(),
        })
}
