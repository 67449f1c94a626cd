//! Manifest retrieval from local disk or over HTTP.
//!
//! Locations are classified once, into [`ManifestLocation`], when a manifest
//! reference is decoded. Readers never guess from substrings of the path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Where a manifest lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ManifestLocation {
    Local { path: PathBuf },
    Remote { url: String },
}

impl ManifestLocation {
    /// `http(s)://` is remote, `file://` and bare paths are local.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            ManifestLocation::Remote {
                url: trimmed.to_string(),
            }
        } else {
            let path = if lower.starts_with("file://") {
                &trimmed["file://".len()..]
            } else {
                trimmed
            };
            ManifestLocation::Local {
                path: PathBuf::from(path),
            }
        }
    }
}

impl From<String> for ManifestLocation {
    fn from(raw: String) -> Self {
        ManifestLocation::parse(&raw)
    }
}

impl From<ManifestLocation> for String {
    fn from(location: ManifestLocation) -> Self {
        location.to_string()
    }
}

impl fmt::Display for ManifestLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestLocation::Local { path } => write!(f, "{}", path.display()),
            ManifestLocation::Remote { url } => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("transport error")]
    Transport(#[from] reqwest::Error),
    #[error("received status code {}", .0.as_u16())]
    Status(StatusCode),
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("reading {}", .path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fetching {url}")]
    Remote {
        url: String,
        #[source]
        source: FetchFailure,
    },
}

/// A manifest that could not be read or could not be decoded.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("decoding {location}")]
    Decode {
        location: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Raw-bytes access to manifests. No caching, no retries.
pub trait ManifestReader {
    fn read_local(&self, path: &Path) -> Result<Vec<u8>, ReadError>;

    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, ReadError>;

    fn read(&self, location: &ManifestLocation) -> Result<Vec<u8>, ReadError> {
        match location {
            ManifestLocation::Local { path } => self.read_local(path),
            ManifestLocation::Remote { url } => self.fetch_remote(url),
        }
    }
}

/// Read and decode a YAML manifest.
pub fn read_yaml<T: DeserializeOwned>(
    reader: &dyn ManifestReader,
    location: &ManifestLocation,
) -> Result<T, ManifestError> {
    let bytes = reader.read(location)?;
    serde_yaml::from_slice(&bytes).map_err(|source| ManifestError::Decode {
        location: location.to_string(),
        source,
    })
}

/// Production reader: `std::fs` for paths, blocking reqwest for URLs.
pub struct Reader {
    http: Client,
}

impl Reader {
    /// `timeout` of `None` keeps the HTTP client's default behaviour.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }
}

impl ManifestReader for Reader {
    fn read_local(&self, path: &Path) -> Result<Vec<u8>, ReadError> {
        debug!(path = %path.display(), "reading manifest from disk");
        std::fs::read(path).map_err(|source| ReadError::Local {
            path: path.to_path_buf(),
            source,
        })
    }

    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, ReadError> {
        debug!(url = %url, "fetching manifest");
        let remote = |source: FetchFailure| ReadError::Remote {
            url: url.to_string(),
            source,
        };

        let resp = self
            .http
            .get(url)
            .send()
            .map_err(|e| remote(FetchFailure::Transport(e)))?;

        if !resp.status().is_success() {
            return Err(remote(FetchFailure::Status(resp.status())));
        }

        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| remote(FetchFailure::Transport(e)))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::serve;
    use super::*;

    #[test]
    fn classifies_locations_by_scheme() {
        assert_eq!(
            ManifestLocation::parse("https://distro.eks.amazonaws.com/kubernetes-1-28/kubernetes-1-28-eks-13.yaml"),
            ManifestLocation::Remote {
                url: "https://distro.eks.amazonaws.com/kubernetes-1-28/kubernetes-1-28-eks-13.yaml".into()
            }
        );
        assert_eq!(
            ManifestLocation::parse("file:///opt/eks-anywhere-downloads/eksd.yaml"),
            ManifestLocation::Local {
                path: "/opt/eks-anywhere-downloads/eksd.yaml".into()
            }
        );
        assert_eq!(
            ManifestLocation::parse("FILE:///opt/eks-anywhere-downloads/eksd.yaml"),
            ManifestLocation::Local {
                path: "/opt/eks-anywhere-downloads/eksd.yaml".into()
            }
        );
        assert_eq!(
            ManifestLocation::parse("File://bundles/bundle.yaml"),
            ManifestLocation::Local {
                path: "bundles/bundle.yaml".into()
            }
        );
        assert_eq!(
            ManifestLocation::parse("eks-anywhere-downloads/kubernetes-1-28-eks-13.yaml"),
            ManifestLocation::Local {
                path: "eks-anywhere-downloads/kubernetes-1-28-eks-13.yaml".into()
            }
        );
    }

    #[test]
    fn location_round_trips_through_serde() {
        let loc: ManifestLocation = serde_yaml::from_str("https://example.com/a.yaml").unwrap();
        assert!(matches!(loc, ManifestLocation::Remote { .. }));
        assert_eq!(
            serde_yaml::to_string(&loc).unwrap().trim(),
            "https://example.com/a.yaml"
        );
    }

    #[test]
    fn reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.yaml");
        std::fs::write(&path, "a: 1\n").unwrap();

        let reader = Reader::new(None).unwrap();
        let value: serde_yaml::Value =
            read_yaml(&reader, &ManifestLocation::Local { path: path.clone() }).unwrap();
        assert_eq!(value["a"], serde_yaml::Value::from(1));

        let missing = dir.path().join("missing.yaml");
        let err = reader.read_local(&missing).unwrap_err();
        assert!(matches!(err, ReadError::Local { .. }));
    }

    #[test]
    fn fetches_over_http_and_reports_status() {
        let base = serve(vec![("/ok.yaml", "kind: Release\n".to_string())]);
        let reader = Reader::new(Some(Duration::from_secs(5))).unwrap();

        let body = reader.fetch_remote(&format!("{base}/ok.yaml")).unwrap();
        assert_eq!(body, b"kind: Release\n");

        let err = reader.fetch_remote(&format!("{base}/missing.yaml")).unwrap_err();
        match err {
            ReadError::Remote {
                source: FetchFailure::Status(code),
                ..
            } => assert_eq!(code, StatusCode::NOT_FOUND),
            other => panic!("expected status failure, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_manifest_is_a_decode_error() {
        let base = serve(vec![("/bad.yaml", "a: [unterminated\n".to_string())]);
        let reader = Reader::new(None).unwrap();
        let err = read_yaml::<serde_yaml::Value>(
            &reader,
            &ManifestLocation::Remote {
                url: format!("{base}/bad.yaml"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Decode { .. }));
    }
}
