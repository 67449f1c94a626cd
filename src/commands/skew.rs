//! `eksa-preflight skew`: management/workload skew check without a cluster.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::domain::cluster::{Cluster, ManagementCluster};
use crate::validations::skew::validate_management_eksa_version;

pub fn run(management: &str, workload: &str) -> Result<()> {
    let mut mgmt = Cluster::new("management");
    mgmt.spec.eksa_version = Some(management.to_string());

    let mut wl = Cluster::new("workload");
    wl.spec.eksa_version = Some(workload.to_string());
    wl.spec.management_cluster = Some(ManagementCluster {
        name: mgmt.name().to_string(),
    });

    validate_management_eksa_version(&mgmt, &mut wl).context("version skew check failed")?;
    println!(
        "{} workload {} is compatible with management {}",
        "ok".green().bold(),
        workload,
        management
    );
    Ok(())
}
