//! Registry mirror preflight.

use tracing::{debug, info};

use crate::domain::cluster::{Cluster, RegistryMirrorConfiguration};
use crate::domain::cluster_config::{ClusterConfig, MachineConfig};
use crate::error::ValidationError;
use crate::tls::TlsValidator;

pub const REGISTRY_USERNAME_ENV: &str = "REGISTRY_USERNAME";
pub const REGISTRY_PASSWORD_ENV: &str = "REGISTRY_PASSWORD";

fn mirror(cluster: &Cluster) -> Option<&RegistryMirrorConfiguration> {
    cluster.spec.registry_mirror_configuration.as_ref()
}

/// `insecureSkipVerify` needs an OS that can turn verification off.
pub fn validate_os_for_registry_mirror(
    cluster: &Cluster,
    machine_configs: &[MachineConfig],
) -> Result<(), ValidationError> {
    let Some(mirror) = mirror(cluster) else {
        return Ok(());
    };
    if !mirror.insecure_skip_verify {
        return Ok(());
    }

    let unsupported = machine_configs
        .iter()
        .filter_map(|mc| mc.os_family)
        .find(|os| !os.supports_insecure_registry());
    match unsupported {
        Some(os) => Err(ValidationError::RegistryMirrorUnsupported { os: os.to_string() }),
        None => Ok(()),
    }
}

/// The mirror's certificate must be trusted by the system roots, by the
/// supplied `caCertContent`, or explicitly skipped.
pub fn validate_cert_for_registry_mirror(
    cluster: &Cluster,
    tls: &dyn TlsValidator,
) -> Result<(), ValidationError> {
    let Some(mirror) = mirror(cluster) else {
        return Ok(());
    };
    if mirror.insecure_skip_verify {
        info!(
            endpoint = %mirror.endpoint,
            "skip registry certificate verification is enabled"
        );
        return Ok(());
    }

    let host = mirror.endpoint.as_str();
    let port = mirror.port.as_str();
    let authority_unknown = tls
        .is_signed_by_unknown_authority(host, port)
        .map_err(|source| ValidationError::RegistryHandshake {
            endpoint: host.to_string(),
            source,
        })?;
    if authority_unknown {
        info!(endpoint = %host, "registry mirror endpoint is using self-signed certs");
    }

    if mirror.ca_cert_content.is_empty() {
        if authority_unknown {
            return Err(ValidationError::RegistryTrust {
                endpoint: host.to_string(),
            });
        }
        return Ok(());
    }

    debug!(endpoint = %host, "validating registry mirror against caCertContent");
    tls.validate_cert(host, port, &mirror.ca_cert_content)
        .map_err(|source| ValidationError::RegistryCertInvalid {
            endpoint: host.to_string(),
            source,
        })
}

/// Authenticated mirrors need both credentials in the environment.
pub fn validate_authentication_for_registry_mirror<F>(
    cluster: &Cluster,
    env: F,
) -> Result<(), ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(mirror) = mirror(cluster) else {
        return Ok(());
    };
    if !mirror.authenticate {
        return Ok(());
    }
    for key in [REGISTRY_USERNAME_ENV, REGISTRY_PASSWORD_ENV] {
        if env(key).map_or(true, |v| v.is_empty()) {
            return Err(ValidationError::RegistryCredentials(key));
        }
    }
    Ok(())
}

/// OS, certificate and credential checks in that order.
pub fn validate_registry_mirror(
    config: &ClusterConfig,
    tls: &dyn TlsValidator,
) -> Result<(), ValidationError> {
    validate_os_for_registry_mirror(&config.cluster, &config.machine_configs)?;
    validate_cert_for_registry_mirror(&config.cluster, tls)?;
    validate_authentication_for_registry_mirror(&config.cluster, |key| std::env::var(key).ok())
}
