//! Checks that read the management cluster through [`KubeClient`].

use tracing::{debug, info};

use super::skew::validate_management_eksa_version;
use crate::domain::bundle::eksa_release_name;
use crate::domain::cluster::{Cluster, EKSA_SYSTEM_NAMESPACE};
use crate::error::ValidationError;
use crate::k8s::{EksaResource, KubeClient};

/// Fetch the management cluster `name` and make sure it is not itself
/// managed by another cluster.
pub fn validate_management_cluster_name(
    kube: &dyn KubeClient,
    name: &str,
    namespace: &str,
) -> Result<Cluster, ValidationError> {
    let mgmt = kube.get_cluster(name, namespace)?;
    if mgmt.is_managed() {
        return Err(ValidationError::InvalidManagementCluster {
            name: name.to_string(),
        });
    }
    Ok(mgmt)
}

pub fn validate_not_paused(cluster: &Cluster) -> Result<(), ValidationError> {
    if cluster.is_reconcile_paused() {
        return Err(ValidationError::ReconcilePaused {
            name: cluster.name().to_string(),
        });
    }
    Ok(())
}

/// The management cluster must carry the `EKSARelease` for the workload's version.
/// Clusters pinned to a `bundlesRef` are not tied to a release.
pub fn validate_eksa_release_exists(
    kube: &dyn KubeClient,
    workload: &Cluster,
) -> Result<(), ValidationError> {
    if workload.spec.bundles_ref.is_some() {
        debug!(cluster = %workload.name(), "bundlesRef set, skipping EKSARelease check");
        return Ok(());
    }
    let version = workload
        .eksa_version()
        .ok_or_else(|| ValidationError::missing_version("workload cluster"))?;
    let name = eksa_release_name(version);
    debug!(release = %name, "checking EKSARelease on management cluster");
    kube.get(EksaResource::EksaRelease, &name, EKSA_SYSTEM_NAMESPACE)?;
    Ok(())
}

/// Run the management skew check against the live workload cluster and
/// write its status back when the check changed it.
///
/// Returns the skew verdict once the status is persisted.
pub fn reconcile_management_skew(
    kube: &dyn KubeClient,
    workload_name: &str,
    namespace: &str,
) -> Result<(), ValidationError> {
    let mut workload = kube.get_cluster(workload_name, namespace)?;
    let mgmt = kube.get_cluster(workload.management_cluster_name(), namespace)?;

    let before = workload.status.clone();
    let verdict = validate_management_eksa_version(&mgmt, &mut workload);

    if workload.status != before {
        info!(
            cluster = %workload.name(),
            reason = ?workload.status.reason(),
            "updating cluster failure status"
        );
        kube.update_status(&workload)?;
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster::{BundlesRef, ManagementCluster, PAUSED_ANNOTATION};
    use crate::domain::status::FailureReason;
    use crate::k8s::{KubeError, MockKubeClient};

    fn cluster(name: &str, version: &str, mgmt: Option<&str>) -> Cluster {
        let mut c = Cluster::new(name);
        c.spec.eksa_version = Some(version.into());
        c.spec.management_cluster = mgmt.map(|m| ManagementCluster { name: m.into() });
        c
    }

    fn not_found(name: &str) -> KubeError {
        KubeError::NotFound {
            resource: EksaResource::Cluster,
            name: name.into(),
            namespace: "default".into(),
        }
    }

    #[test]
    fn self_managed_cluster_is_a_valid_management_cluster() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_cluster()
            .withf(|name, ns| name == "mgmt" && ns == "default")
            .times(1)
            .returning(|name, _| Ok(cluster(name, "v0.20.0", None)));

        let mgmt = validate_management_cluster_name(&kube, "mgmt", "default").unwrap();
        assert_eq!(mgmt.name(), "mgmt");
    }

    #[test]
    fn managed_cluster_cannot_manage_others() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_cluster()
            .returning(|name, _| Ok(cluster(name, "v0.20.0", Some("root"))));

        let err = validate_management_cluster_name(&kube, "mid", "default").unwrap_err();
        assert_eq!(err.to_string(), "mid is not a valid management cluster");
    }

    #[test]
    fn missing_management_cluster_is_not_found() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_cluster()
            .returning(|name, _| Err(not_found(name)));

        let err = validate_management_cluster_name(&kube, "ghost", "default").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn paused_cluster_is_rejected() {
        let mut c = cluster("w01", "v0.20.0", None);
        validate_not_paused(&c).unwrap();

        c.metadata
            .annotations
            .insert(PAUSED_ANNOTATION.into(), "true".into());
        let err = validate_not_paused(&c).unwrap_err();
        assert!(matches!(err, ValidationError::ReconcilePaused { .. }));
    }

    #[test]
    fn release_lookup_uses_dashed_name_in_system_namespace() {
        let mut kube = MockKubeClient::new();
        kube.expect_get()
            .withf(|resource, name, ns| {
                *resource == EksaResource::EksaRelease
                    && name == "eksa-v0-19-0"
                    && ns == "eksa-system"
            })
            .times(1)
            .returning(|_, _, _| Ok(serde_json::json!({"kind": "EKSARelease"})));

        validate_eksa_release_exists(&kube, &cluster("w01", "v0.19.0", Some("mgmt"))).unwrap();
    }

    #[test]
    fn missing_release_is_not_found() {
        let mut kube = MockKubeClient::new();
        kube.expect_get()
            .returning(|resource, name, ns| {
                Err(KubeError::NotFound {
                    resource,
                    name: name.into(),
                    namespace: ns.into(),
                })
            });

        let err = validate_eksa_release_exists(&kube, &cluster("w01", "v0.19.0", Some("mgmt")))
            .unwrap_err();
        assert!(err.is_not_found());

        let mut unversioned = cluster("w01", "v0.19.0", Some("mgmt"));
        unversioned.spec.eksa_version = None;
        let err = validate_eksa_release_exists(&kube, &unversioned).unwrap_err();
        assert!(matches!(err, ValidationError::MissingVersion { .. }));
    }

    #[test]
    fn bundles_ref_cluster_needs_no_release() {
        let mut kube = MockKubeClient::new();
        kube.expect_get().times(0);

        let mut pinned = cluster("w01", "v0.19.0", Some("mgmt"));
        pinned.spec.eksa_version = None;
        pinned.spec.bundles_ref = Some(BundlesRef {
            name: "bundles-42".into(),
            ..Default::default()
        });
        validate_eksa_release_exists(&kube, &pinned).unwrap();
    }

    #[test]
    fn reconcile_persists_new_failure_once() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_cluster()
            .withf(|name, _| name == "w01")
            .returning(|_, _| Ok(cluster("w01", "v0.20.0", Some("mgmt"))));
        kube.expect_get_cluster()
            .withf(|name, _| name == "mgmt")
            .returning(|_, _| Ok(cluster("mgmt", "v0.19.0", None)));
        kube.expect_update_status()
            .withf(|c| c.status.reason() == Some(&FailureReason::EksaVersionInvalid))
            .times(1)
            .returning(|_| Ok(()));

        let err = reconcile_management_skew(&kube, "w01", "default").unwrap_err();
        assert!(matches!(err, ValidationError::VersionSkewViolation { .. }));
    }

    #[test]
    fn reconcile_clears_stale_failure() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_cluster()
            .withf(|name, _| name == "w01")
            .returning(|_, _| {
                let mut w = cluster("w01", "v0.20.0", Some("mgmt"));
                w.set_failure(FailureReason::EksaVersionInvalid, "stale message");
                Ok(w)
            });
        kube.expect_get_cluster()
            .withf(|name, _| name == "mgmt")
            .returning(|_, _| Ok(cluster("mgmt", "v0.20.0", None)));
        kube.expect_update_status()
            .withf(|c| c.status.is_clear())
            .times(1)
            .returning(|_| Ok(()));

        reconcile_management_skew(&kube, "w01", "default").unwrap();
    }

    #[test]
    fn reconcile_skips_write_when_nothing_changed() {
        let mut kube = MockKubeClient::new();
        kube.expect_get_cluster()
            .withf(|name, _| name == "w01")
            .returning(|_, _| Ok(cluster("w01", "v0.19.0", Some("mgmt"))));
        kube.expect_get_cluster()
            .withf(|name, _| name == "mgmt")
            .returning(|_, _| Ok(cluster("mgmt", "v0.20.0", None)));
        kube.expect_update_status().times(0);

        reconcile_management_skew(&kube, "w01", "default").unwrap();
        reconcile_management_skew(&kube, "w01", "default").unwrap();
    }
}
