//! Extended Kubernetes version support gate.
//!
//! An explicit bundles override is always checked. Otherwise clusters pinned
//! by `bundlesRef` are skipped, and releases at or before
//! [`SIGNATURE_VALIDATION_CUTOFF`] predate signed bundles and pass. Everything
//! else resolves its bundle, fetches the EKS Distro release it points at, and
//! hands both to an [`ExtendedSupportPolicy`].

use chrono::{NaiveDate, Utc};
use tracing::debug;

use super::bundles::{resolve_bundles, versions_bundle, BundleLookup};
use crate::domain::bundle::{Bundles, VersionsBundle};
use crate::domain::cluster::Cluster;
use crate::domain::distro::DistroRelease;
use crate::error::ValidationError;
use crate::manifests::{ManifestLocation, ManifestReader, ReadError};
use crate::provider::ProviderKind;
use crate::version::Version;

/// Last release whose bundles are not signature-validated.
pub const SIGNATURE_VALIDATION_CUTOFF: &str = "v0.22.0";

const END_OF_SUPPORT_DATE_FORMAT: &str = "%Y-%m-%d";

/// True when `eksa_version` is at or before the cutoff. Clusters without a
/// version are validated.
pub fn should_skip_bundle_signature_validation(
    eksa_version: Option<&str>,
) -> Result<bool, ValidationError> {
    let Some(raw) = eksa_version else {
        return Ok(false);
    };
    let version =
        Version::parse(raw).map_err(|e| ValidationError::invalid_version("cluster EksaVersion", e))?;
    let cutoff = Version::parse(SIGNATURE_VALIDATION_CUTOFF)
        .map_err(|e| ValidationError::invalid_version("signature validation cutoff", e))?;
    Ok(version.less_than_or_equal(&cutoff))
}

/// Decides whether a resolved bundle and distro release may be used.
pub trait ExtendedSupportPolicy {
    fn validate(
        &self,
        cluster: &Cluster,
        bundles: &Bundles,
        versions_bundle: &VersionsBundle,
        release: &DistroRelease,
    ) -> Result<(), ValidationError>;
}

/// The distro release must match the Kubernetes version, and a Kubernetes
/// version past its end of standard support needs a license token. With
/// digest verification on, the bundle must also carry a `bundle-digest`
/// annotation matching its spec.
pub struct EndOfStandardSupportPolicy {
    today: NaiveDate,
    verify_digest: bool,
}

impl EndOfStandardSupportPolicy {
    pub fn new() -> Self {
        Self::at(Utc::now().date_naive())
    }

    pub fn at(today: NaiveDate) -> Self {
        Self {
            today,
            verify_digest: false,
        }
    }

    pub fn with_digest_verification(mut self, verify: bool) -> Self {
        self.verify_digest = verify;
        self
    }

    fn validate_digest(bundles: &Bundles) -> Result<(), ValidationError> {
        let digest_error = |reason: String| ValidationError::BundleDigest {
            bundles: bundles.name().to_string(),
            reason,
        };
        let Some(declared) = bundles.declared_digest() else {
            return Err(digest_error("missing bundle-digest annotation".into()));
        };
        let actual = bundles
            .spec_digest()
            .map_err(|e| digest_error(format!("encoding bundle spec: {e}")))?;
        if declared != actual {
            return Err(digest_error("digest does not match bundle spec".into()));
        }
        Ok(())
    }
}

impl Default for EndOfStandardSupportPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtendedSupportPolicy for EndOfStandardSupportPolicy {
    fn validate(
        &self,
        cluster: &Cluster,
        bundles: &Bundles,
        versions_bundle: &VersionsBundle,
        release: &DistroRelease,
    ) -> Result<(), ValidationError> {
        if self.verify_digest {
            Self::validate_digest(bundles)?;
        }

        let kube_version = &versions_bundle.kube_version;
        if !release.is_for(kube_version) {
            return Err(ValidationError::extended_support(format!(
                "eksd release channel {} does not match kubernetes version {}",
                release.spec.channel, kube_version
            )));
        }

        let Some(raw) = versions_bundle.end_of_standard_support.as_deref() else {
            return Ok(());
        };
        let end_of_support = NaiveDate::parse_from_str(raw, END_OF_SUPPORT_DATE_FORMAT)
            .map_err(|e| {
                ValidationError::extended_support(format!(
                    "invalid endOfStandardSupport {raw:?} for kubernetes version {kube_version}: {e}"
                ))
            })?;

        let licensed = cluster
            .spec
            .license_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if end_of_support < self.today && !licensed {
            return Err(ValidationError::extended_support(format!(
                "licenseToken is required for kubernetes version {kube_version}, standard support ended on {end_of_support}"
            )));
        }
        Ok(())
    }
}

/// Read and decode the EKS Distro release manifest at `location`.
pub fn fetch_distro_release(
    reader: &dyn ManifestReader,
    location: &ManifestLocation,
) -> Result<DistroRelease, ValidationError> {
    let bytes = reader.read(location).map_err(|e| match e {
        ReadError::Local { path, source } => ValidationError::LocalRead { path, source },
        ReadError::Remote { url, source } => ValidationError::Fetch { url, source },
    })?;
    serde_yaml::from_slice(&bytes).map_err(|source| ValidationError::Decode {
        location: location.to_string(),
        source,
    })
}

pub struct ExtendedSupportGate<'a> {
    reader: &'a dyn ManifestReader,
    lookup: &'a dyn BundleLookup,
    policy: &'a dyn ExtendedSupportPolicy,
}

impl<'a> ExtendedSupportGate<'a> {
    pub fn new(
        reader: &'a dyn ManifestReader,
        lookup: &'a dyn BundleLookup,
        policy: &'a dyn ExtendedSupportPolicy,
    ) -> Self {
        Self {
            reader,
            lookup,
            policy,
        }
    }

    pub fn validate(
        &self,
        cluster: &Cluster,
        bundles_override: Option<&ManifestLocation>,
    ) -> Result<(), ValidationError> {
        let provider = ProviderKind::from_datacenter_kind(&cluster.spec.datacenter_ref.kind).ok();
        if provider.is_some_and(|p| p.exempt_from_extended_support()) {
            debug!(cluster = %cluster.name(), "provider exempt from extended support checks");
            return Ok(());
        }

        if bundles_override.is_none() {
            if cluster.spec.bundles_ref.is_some() {
                debug!(cluster = %cluster.name(), "cluster pinned by bundlesRef, skipping extended support checks");
                return Ok(());
            }
            if should_skip_bundle_signature_validation(cluster.eksa_version())? {
                debug!(
                    cluster = %cluster.name(),
                    cutoff = SIGNATURE_VALIDATION_CUTOFF,
                    "release predates bundle signature validation"
                );
                return Ok(());
            }
        }

        let bundles = resolve_bundles(cluster, bundles_override, self.reader, self.lookup)?;
        let vb = versions_bundle(&bundles, &cluster.spec.kubernetes_version)?;
        let release = fetch_distro_release(self.reader, &vb.eks_d.release_url)?;

        self.policy.validate(cluster, &bundles, vb, &release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bundle::fixtures;
    use crate::manifests::testing::{serve, StaticReader};
    use crate::manifests::{FetchFailure, Reader};
    use crate::validations::bundles::LookupFailure;

    /// Hands out one fixed bundle for any version.
    struct FixedLookup(Bundles);

    impl BundleLookup for FixedLookup {
        fn bundles_for_version(&self, _: &Version) -> Result<Bundles, LookupFailure> {
            Ok(self.0.clone())
        }
    }

    /// Fails every lookup; proves a path never reaches bundle resolution.
    struct NoLookup;

    impl BundleLookup for NoLookup {
        fn bundles_for_version(&self, _: &Version) -> Result<Bundles, LookupFailure> {
            Err(LookupFailure::NotReleased)
        }
    }

    struct Allow;

    impl ExtendedSupportPolicy for Allow {
        fn validate(
            &self,
            _: &Cluster,
            _: &Bundles,
            _: &VersionsBundle,
            _: &DistroRelease,
        ) -> Result<(), ValidationError> {
            Ok(())
        }
    }

    const DISTRO_RELEASE: &str = r#"
apiVersion: distro.eks.amazonaws.com/v1alpha1
kind: Release
metadata:
  name: kubernetes-1-28-eks-13
spec:
  channel: 1-28
  number: 13
"#;

    fn cluster(version: &str, datacenter_kind: &str) -> Cluster {
        let mut c = Cluster::new("w01");
        c.spec.kubernetes_version = "1.28".into();
        c.spec.eksa_version = Some(version.into());
        c.spec.datacenter_ref.kind = datacenter_kind.into();
        c
    }

    fn distro_release(channel: &str) -> DistroRelease {
        let mut release: DistroRelease = serde_yaml::from_str(DISTRO_RELEASE).unwrap();
        release.spec.channel = channel.into();
        release
    }

    #[test]
    fn cutoff_is_inclusive() {
        assert!(should_skip_bundle_signature_validation(Some("v0.21.0")).unwrap());
        assert!(should_skip_bundle_signature_validation(Some("v0.22.0")).unwrap());
        assert!(should_skip_bundle_signature_validation(Some("v0.22.0+build.1")).unwrap());
        assert!(!should_skip_bundle_signature_validation(Some("v0.22.1")).unwrap());
        assert!(!should_skip_bundle_signature_validation(Some("v0.23.0")).unwrap());
        assert!(!should_skip_bundle_signature_validation(None).unwrap());
        assert!(should_skip_bundle_signature_validation(Some("bogus")).is_err());
    }

    #[test]
    fn pre_cutoff_release_passes_without_reaching_any_manifest() {
        let reader = Reader::new(None).unwrap();
        let gate = ExtendedSupportGate::new(&reader, &NoLookup, &Allow);
        gate.validate(&cluster("v0.21.0", "VSphereDatacenterConfig"), None)
            .unwrap();
    }

    #[test]
    fn bundles_override_is_checked_even_before_the_cutoff() {
        let reader = Reader::new(None).unwrap();
        let gate = ExtendedSupportGate::new(&reader, &NoLookup, &Allow);
        let unreachable = ManifestLocation::parse("http://127.0.0.1:1/bundles.yaml");

        let err = gate
            .validate(
                &cluster("v0.21.0", "VSphereDatacenterConfig"),
                Some(&unreachable),
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::BundleRead { .. }), "{err:?}");
    }

    #[test]
    fn bundles_override_applies_to_unversioned_clusters() {
        let url = "https://distro.example.com/1-28.yaml";
        let override_url = "https://assets.example.com/bundle-42.yaml";
        let bundles = serde_yaml::to_string(&fixtures::bundles("1.28", url)).unwrap();
        let reader = StaticReader::default()
            .with(url, DISTRO_RELEASE)
            .with(override_url, &bundles);
        let gate = ExtendedSupportGate::new(&reader, &NoLookup, &Allow);

        let mut c = cluster("v0.23.0", "VSphereDatacenterConfig");
        c.spec.eksa_version = None;
        gate.validate(&c, Some(&ManifestLocation::parse(override_url)))
            .unwrap();
    }

    #[test]
    fn bundles_ref_cluster_skips_the_gate() {
        let reader = StaticReader::default();
        let gate = ExtendedSupportGate::new(&reader, &NoLookup, &Allow);

        let mut c = cluster("v0.23.0", "VSphereDatacenterConfig");
        c.spec.eksa_version = None;
        c.spec.bundles_ref = Some(Default::default());
        gate.validate(&c, None).unwrap();
    }

    #[test]
    fn snow_is_exempt() {
        let reader = StaticReader::default();
        let gate = ExtendedSupportGate::new(&reader, &NoLookup, &Allow);
        gate.validate(&cluster("v0.23.0", "SnowDatacenterConfig"), None)
            .unwrap();
    }

    #[test]
    fn remote_release_manifest_returning_404_is_a_fetch_error() {
        let base = serve(vec![]);
        let url = format!("{base}/kubernetes-1-28/kubernetes-1-28-eks-13.yaml");
        let lookup = FixedLookup(fixtures::bundles("1.28", &url));
        let reader = Reader::new(None).unwrap();
        let gate = ExtendedSupportGate::new(&reader, &lookup, &Allow);

        let err = gate
            .validate(&cluster("v0.23.0", "VSphereDatacenterConfig"), None)
            .unwrap_err();
        match err {
            ValidationError::Fetch {
                url: failed,
                source: FetchFailure::Status(code),
            } => {
                assert_eq!(failed, url);
                assert_eq!(code.as_u16(), 404);
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[test]
    fn missing_airgapped_release_manifest_is_a_local_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("eks-anywhere-downloads/kubernetes-1-28-eks-13.yaml");
        let lookup = FixedLookup(fixtures::bundles("1.28", &path.display().to_string()));
        let reader = Reader::new(None).unwrap();
        let gate = ExtendedSupportGate::new(&reader, &lookup, &Allow);

        let err = gate
            .validate(&cluster("v0.23.0", "VSphereDatacenterConfig"), None)
            .unwrap_err();
        assert!(matches!(err, ValidationError::LocalRead { .. }), "{err:?}");
    }

    #[test]
    fn airgapped_release_manifest_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kubernetes-1-28-eks-13.yaml");
        std::fs::write(&path, DISTRO_RELEASE).unwrap();
        let lookup = FixedLookup(fixtures::bundles("1.28", &path.display().to_string()));
        let reader = Reader::new(None).unwrap();
        let policy = EndOfStandardSupportPolicy::at(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let gate = ExtendedSupportGate::new(&reader, &lookup, &policy);

        gate.validate(&cluster("v0.23.0", "VSphereDatacenterConfig"), None)
            .unwrap();
    }

    #[test]
    fn malformed_release_manifest_is_a_decode_error() {
        let url = "https://distro.example.com/1-28.yaml";
        let reader = StaticReader::default().with(url, "spec: [broken");
        let lookup = FixedLookup(fixtures::bundles("1.28", url));
        let gate = ExtendedSupportGate::new(&reader, &lookup, &Allow);

        let err = gate
            .validate(&cluster("v0.23.0", "VSphereDatacenterConfig"), None)
            .unwrap_err();
        assert!(matches!(err, ValidationError::Decode { .. }));
    }

    #[test]
    fn unsupported_kubernetes_version_is_reported() {
        let reader = StaticReader::default();
        let lookup = FixedLookup(fixtures::bundles("1.27", "https://distro.example.com/1-27.yaml"));
        let gate = ExtendedSupportGate::new(&reader, &lookup, &Allow);

        let err = gate
            .validate(&cluster("v0.23.0", "VSphereDatacenterConfig"), None)
            .unwrap_err();
        assert!(matches!(err, ValidationError::VersionNotFound { .. }));
    }

    #[test]
    fn default_policy_accepts_bundles_without_a_digest_annotation() {
        let policy = EndOfStandardSupportPolicy::at(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let mut bundles = fixtures::bundles("1.28", "https://distro.example.com/1-28.yaml");
        bundles.metadata.annotations.clear();
        let vb = bundles.spec.versions_bundles[0].clone();

        policy
            .validate(
                &cluster("v0.23.0", "VSphereDatacenterConfig"),
                &bundles,
                &vb,
                &distro_release("1-28"),
            )
            .unwrap();
    }

    #[test]
    fn published_bundles_pass_the_gate_by_default() {
        let url = "https://distro.example.com/1-28.yaml";
        let reader = StaticReader::default().with(url, DISTRO_RELEASE);
        let mut bundles = fixtures::bundles("1.28", url);
        bundles.metadata.annotations.clear();
        let lookup = FixedLookup(bundles);
        let policy = EndOfStandardSupportPolicy::at(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let gate = ExtendedSupportGate::new(&reader, &lookup, &policy);

        gate.validate(&cluster("v0.23.0", "VSphereDatacenterConfig"), None)
            .unwrap();
    }

    #[test]
    fn digest_verification_rejects_unsealed_or_tampered_bundles() {
        let policy = EndOfStandardSupportPolicy::at(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
            .with_digest_verification(true);
        let c = cluster("v0.23.0", "VSphereDatacenterConfig");
        let release = distro_release("1-28");

        let mut bundles = fixtures::bundles("1.28", "https://distro.example.com/1-28.yaml");
        let vb = bundles.spec.versions_bundles[0].clone();
        policy.validate(&c, &bundles, &vb, &release).unwrap();

        bundles.spec.number += 1;
        let err = policy.validate(&c, &bundles, &vb, &release).unwrap_err();
        assert!(matches!(err, ValidationError::BundleDigest { .. }));

        bundles.metadata.annotations.clear();
        let err = policy.validate(&c, &bundles, &vb, &release).unwrap_err();
        assert!(err.to_string().contains("missing bundle-digest annotation"));
    }

    #[test]
    fn policy_requires_matching_channel() {
        let policy = EndOfStandardSupportPolicy::at(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        let bundles = fixtures::bundles("1.28", "https://distro.example.com/1-28.yaml");
        let vb = &bundles.spec.versions_bundles[0];
        let err = policy
            .validate(
                &cluster("v0.23.0", "VSphereDatacenterConfig"),
                &bundles,
                vb,
                &distro_release("1-27"),
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::ExtendedSupport(_)));
    }

    #[test]
    fn past_end_of_standard_support_needs_a_license_token() {
        let policy = EndOfStandardSupportPolicy::at(NaiveDate::from_ymd_opt(2100, 1, 1).unwrap());
        let bundles = fixtures::bundles("1.28", "https://distro.example.com/1-28.yaml");
        let vb = &bundles.spec.versions_bundles[0];
        let release = distro_release("1-28");

        let mut c = cluster("v0.23.0", "VSphereDatacenterConfig");
        let err = policy.validate(&c, &bundles, vb, &release).unwrap_err();
        assert!(err.to_string().contains("licenseToken is required"));

        c.spec.license_token = Some("license-123".into());
        policy.validate(&c, &bundles, vb, &release).unwrap();
    }
}
