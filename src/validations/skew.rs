//! Version skew between the CLI, management and workload clusters.

use tracing::debug;

use crate::domain::cluster::Cluster;
use crate::domain::status::FailureReason;
use crate::error::ValidationError;
use crate::version::Version;

/// How far ahead of a cluster its management components, or an upgrade, may go.
pub const SUPPORTED_MINOR_VERSION_INCREMENT: i128 = 1;

fn parse(what: &'static str, raw: &str) -> Result<Version, ValidationError> {
    Version::parse(raw).map_err(|e| ValidationError::invalid_version(what, e))
}

/// The cluster's `eksaVersion` must be the same patch as the running CLI.
pub fn validate_cli_version(cli: &Version, cluster: &Cluster) -> Result<(), ValidationError> {
    let Some(raw) = cluster.eksa_version() else {
        return Ok(());
    };
    let cluster_version = parse("cluster EksaVersion", raw)?;
    if !cluster_version.same_patch(cli) {
        return Err(ValidationError::VersionMismatch {
            cluster: cluster_version,
            cli: cli.clone(),
        });
    }
    Ok(())
}

/// A workload cluster must not run ahead of its management cluster.
///
/// On failure the workload's status records [`FailureReason::EksaVersionInvalid`];
/// a later passing comparison clears that reason again. Persisting the
/// mutated status is left to the caller.
pub fn validate_management_eksa_version(
    mgmt: &Cluster,
    workload: &mut Cluster,
) -> Result<(), ValidationError> {
    let (Some(mgmt_raw), Some(workload_raw)) =
        (mgmt.eksa_version(), workload.applicable_eksa_version())
    else {
        debug!(
            management = %mgmt.name(),
            workload = %workload.name(),
            "no applicable eksaVersion, skipping management skew check"
        );
        return Ok(());
    };

    let management = parse("management EksaVersion", mgmt_raw)?;
    let workload_version = parse("workload EksaVersion", workload_raw)?;

    if management.is_dev_build() {
        debug!(management = %management, "management cluster runs a dev build, skipping skew check");
        return Ok(());
    }

    if workload_version.greater_than(&management) {
        let err = ValidationError::VersionSkewViolation {
            workload: workload_version,
            management,
        };
        workload.set_failure(FailureReason::EksaVersionInvalid, err.to_string());
        return Err(err);
    }

    workload.clear_failure_if_reason(&FailureReason::EksaVersionInvalid);
    Ok(())
}

/// Proposed management components may be at most one minor ahead of the
/// management cluster, within the same major.
///
/// A minor regression satisfies the bound and is accepted.
pub fn validate_management_components_skew(
    mgmt: &Cluster,
    components_version: &str,
) -> Result<(), ValidationError> {
    let proposed = parse("management components version", components_version)?;
    let current_raw = mgmt
        .eksa_version()
        .ok_or_else(|| ValidationError::missing_version("management cluster"))?;
    let current = parse("management cluster EksaVersion", current_raw)?;

    let (major_delta, minor_delta) = proposed.delta_from(&current);
    if major_delta != 0 || minor_delta > SUPPORTED_MINOR_VERSION_INCREMENT {
        return Err(ValidationError::UnsupportedSkew { proposed, current });
    }
    Ok(())
}

/// Cluster upgrades move forward by at most one minor within a major.
pub fn validate_upgrade_skew(new: &Cluster, current: &Cluster) -> Result<(), ValidationError> {
    let (Some(new_raw), Some(current_raw)) = (new.eksa_version(), current.eksa_version()) else {
        return Ok(());
    };
    let to = parse("new cluster EksaVersion", new_raw)?;
    let from = parse("current cluster EksaVersion", current_raw)?;

    if to < from {
        return Err(ValidationError::Downgrade { from, to });
    }
    let (major_delta, minor_delta) = to.delta_from(&from);
    if major_delta != 0 || minor_delta > SUPPORTED_MINOR_VERSION_INCREMENT {
        return Err(ValidationError::UpgradeSkew { from, to });
    }
    Ok(())
}
