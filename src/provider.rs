use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Infrastructure provider, identified by the cluster's `datacenterRef.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    VSphere,
    CloudStack,
    Snow,
    Tinkerbell,
    Nutanix,
    Docker,
}

impl ProviderKind {
    pub fn from_datacenter_kind(kind: &str) -> Result<Self> {
        match kind {
            "VSphereDatacenterConfig" => Ok(ProviderKind::VSphere),
            "CloudStackDatacenterConfig" => Ok(ProviderKind::CloudStack),
            "SnowDatacenterConfig" => Ok(ProviderKind::Snow),
            "TinkerbellDatacenterConfig" => Ok(ProviderKind::Tinkerbell),
            "NutanixDatacenterConfig" => Ok(ProviderKind::Nutanix),
            "DockerDatacenterConfig" => Ok(ProviderKind::Docker),
            other => bail!("unknown datacenter kind '{}'", other),
        }
    }

    /// Snow devices ship their own bundles and are not subject to the
    /// extended Kubernetes version support policy.
    pub fn exempt_from_extended_support(&self) -> bool {
        matches!(self, ProviderKind::Snow)
    }

    /// Namespaces where the provider's CAPI controllers run.
    pub fn controller_namespaces(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::VSphere => &["capv-system"],
            ProviderKind::CloudStack => &["capc-system"],
            ProviderKind::Snow => &["capas-system"],
            ProviderKind::Tinkerbell => &["capt-system", "eksa-system"],
            ProviderKind::Nutanix => &["capx-system"],
            ProviderKind::Docker => &["capd-system"],
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vsphere" => Ok(ProviderKind::VSphere),
            "cloudstack" => Ok(ProviderKind::CloudStack),
            "snow" => Ok(ProviderKind::Snow),
            "tinkerbell" => Ok(ProviderKind::Tinkerbell),
            "nutanix" => Ok(ProviderKind::Nutanix),
            "docker" => Ok(ProviderKind::Docker),
            other => bail!(
                "unknown provider '{}' (expected one of vsphere, cloudstack, snow, tinkerbell, nutanix, docker)",
                other
            ),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::VSphere => write!(f, "vsphere"),
            ProviderKind::CloudStack => write!(f, "cloudstack"),
            ProviderKind::Snow => write!(f, "snow"),
            ProviderKind::Tinkerbell => write!(f, "tinkerbell"),
            ProviderKind::Nutanix => write!(f, "nutanix"),
            ProviderKind::Docker => write!(f, "docker"),
        }
    }
}

/// Node operating system family, from a machine config's `spec.osFamily`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Bottlerocket,
    Ubuntu,
    Redhat,
}

impl OsFamily {
    /// Bottlerocket hosts cannot be told to skip registry TLS verification.
    pub fn supports_insecure_registry(&self) -> bool {
        !matches!(self, OsFamily::Bottlerocket)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Bottlerocket => write!(f, "bottlerocket"),
            OsFamily::Ubuntu => write!(f, "ubuntu"),
            OsFamily::Redhat => write!(f, "redhat"),
        }
    }
}
