//! Registry endpoint certificate checks.

use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use reqwest::blocking::Client;
use reqwest::Certificate;
use rustls::CertificateError;
use thiserror::Error;
use tracing::debug;

const PEM_CERTIFICATE_HEADER: &str = "-----BEGIN CERTIFICATE-----";

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("connecting to {endpoint}")]
    Connect {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("certificate content is not a PEM encoded certificate")]
    InvalidPem,
    #[error("building TLS client")]
    Client(#[source] reqwest::Error),
    #[error("certificate presented by {endpoint} was rejected")]
    Rejected {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} is not signed by the provided certificate")]
    Untrusted {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

#[cfg_attr(test, automock)]
pub trait TlsValidator {
    /// True when the endpoint's chain does not verify against the system roots.
    fn is_signed_by_unknown_authority(&self, host: &str, port: &str) -> Result<bool, TlsError>;

    /// Verify the endpoint's chain against `ca_pem` only.
    fn validate_cert(&self, host: &str, port: &str, ca_pem: &str) -> Result<(), TlsError>;
}

/// Checks the registry's `/v2/` endpoint over HTTPS.
pub struct HttpsTlsValidator {
    timeout: Duration,
}

impl HttpsTlsValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn endpoint(host: &str, port: &str) -> String {
        if port.is_empty() {
            format!("https://{}/v2/", host)
        } else {
            format!("https://{}:{}/v2/", host, port)
        }
    }
}

impl TlsValidator for HttpsTlsValidator {
    fn is_signed_by_unknown_authority(&self, host: &str, port: &str) -> Result<bool, TlsError> {
        let endpoint = Self::endpoint(host, port);
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(TlsError::Client)?;

        // Any HTTP response, 401 included, means the handshake succeeded.
        let err = match client.get(&endpoint).send() {
            Ok(_) => return Ok(false),
            Err(e) => e,
        };
        match certificate_error(&err) {
            Some(CertificateError::UnknownIssuer) => {
                debug!(endpoint = %endpoint, error = %err, "registry certificate not trusted by system roots");
                Ok(true)
            }
            Some(_) => Err(TlsError::Rejected {
                endpoint,
                source: err,
            }),
            None => Err(TlsError::Connect {
                endpoint,
                source: err,
            }),
        }
    }

    fn validate_cert(&self, host: &str, port: &str, ca_pem: &str) -> Result<(), TlsError> {
        let endpoint = Self::endpoint(host, port);
        if !ca_pem.contains(PEM_CERTIFICATE_HEADER) {
            return Err(TlsError::InvalidPem);
        }
        let cert = Certificate::from_pem(ca_pem.as_bytes()).map_err(|_| TlsError::InvalidPem)?;
        let client = Client::builder()
            .timeout(self.timeout)
            .tls_built_in_root_certs(false)
            .add_root_certificate(cert)
            .build()
            .map_err(TlsError::Client)?;

        let err = match client.get(&endpoint).send() {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        match certificate_error(&err) {
            Some(CertificateError::UnknownIssuer | CertificateError::BadSignature) => {
                Err(TlsError::Untrusted {
                    endpoint,
                    source: err,
                })
            }
            Some(_) => Err(TlsError::Rejected {
                endpoint,
                source: err,
            }),
            None => Err(TlsError::Connect {
                endpoint,
                source: err,
            }),
        }
    }
}

/// Walk the error chain for a rustls certificate verification failure.
/// rustls errors reach us wrapped in `io::Error`, whose `source` skips the
/// wrapped value, so those are unwrapped explicitly.
fn certificate_error<'e>(
    err: &'e (dyn std::error::Error + 'static),
) -> Option<&'e CertificateError> {
    let mut current = Some(err);
    while let Some(e) = current {
        let tls = e.downcast_ref::<rustls::Error>().or_else(|| {
            e.downcast_ref::<std::io::Error>()
                .and_then(|io| io.get_ref())
                .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        });
        if let Some(rustls::Error::InvalidCertificate(cert)) = tls {
            return Some(cert);
        }
        current = e.source();
    }
    None
}
