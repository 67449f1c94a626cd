//! Cluster store access through the Kubernetes API.

use std::fmt;
use std::path::{Path, PathBuf};

use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::core::{ApiResource, GroupVersionKind};
use kube::{Client, Config};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::domain::cluster::Cluster;
use crate::domain::status::ClusterStatusFields;

pub const EKSA_API_GROUP: &str = "anywhere.eks.amazonaws.com";
pub const EKSA_API_VERSION: &str = "v1alpha1";

/// EKS-A custom resources this crate reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EksaResource {
    Cluster,
    EksaRelease,
}

impl EksaResource {
    fn kind(&self) -> &'static str {
        match self {
            EksaResource::Cluster => "Cluster",
            EksaResource::EksaRelease => "EKSARelease",
        }
    }

    fn plural(&self) -> &'static str {
        match self {
            EksaResource::Cluster => "clusters",
            EksaResource::EksaRelease => "eksareleases",
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(EKSA_API_GROUP, EKSA_API_VERSION, self.kind());
        ApiResource::from_gvk_with_plural(&gvk, self.plural())
    }
}

impl fmt::Display for EksaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.plural(), EKSA_API_GROUP)
    }
}

#[derive(Debug, Error)]
pub enum KubeError {
    #[error("{resource} {namespace}/{name} not found")]
    NotFound {
        resource: EksaResource,
        name: String,
        namespace: String,
    },
    #[error("{verb} {resource} {namespace}/{name}")]
    Api {
        verb: &'static str,
        resource: EksaResource,
        name: String,
        namespace: String,
        #[source]
        source: kube::Error,
    },
    #[error("loading kubeconfig {}", .path.display())]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },
    #[error("building Kubernetes client")]
    Client(#[source] kube::Error),
    #[error("starting async runtime")]
    Runtime(#[source] std::io::Error),
    #[error("decoding {resource} {name}")]
    Decode {
        resource: EksaResource,
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl KubeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::NotFound { .. })
    }
}

/// Read/write capability against the cluster store.
#[cfg_attr(test, automock)]
pub trait KubeClient {
    /// Fetch an arbitrary object as JSON.
    fn get(
        &self,
        resource: EksaResource,
        name: &str,
        namespace: &str,
    ) -> Result<serde_json::Value, KubeError>;

    fn get_cluster(&self, name: &str, namespace: &str) -> Result<Cluster, KubeError>;

    /// Persist `cluster`'s failure status through the status subresource.
    fn update_status(&self, cluster: &Cluster) -> Result<(), KubeError>;
}

/// Blocking [`KubeClient`] over a `kube` client driven by its own
/// single-threaded runtime.
pub struct KubeApi {
    runtime: Runtime,
    client: Client,
}

impl KubeApi {
    pub fn from_kubeconfig(path: &Path) -> Result<Self, KubeError> {
        let kubeconfig_error = |source| KubeError::Kubeconfig {
            path: path.to_path_buf(),
            source,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(KubeError::Runtime)?;
        let kubeconfig = Kubeconfig::read_from(path).map_err(kubeconfig_error)?;

        let client = runtime.block_on(async {
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(kubeconfig_error)?;
            Client::try_from(config).map_err(KubeError::Client)
        })?;

        debug!(kubeconfig = %path.display(), "connected Kubernetes client");
        Ok(Self { runtime, client })
    }

    fn api(&self, resource: EksaResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &resource.api_resource())
    }
}

fn api_error(
    verb: &'static str,
    resource: EksaResource,
    name: &str,
    namespace: &str,
    err: kube::Error,
) -> KubeError {
    match err {
        kube::Error::Api(ref status) if status.code == 404 => KubeError::NotFound {
            resource,
            name: name.to_string(),
            namespace: namespace.to_string(),
        },
        source => KubeError::Api {
            verb,
            resource,
            name: name.to_string(),
            namespace: namespace.to_string(),
            source,
        },
    }
}

impl KubeClient for KubeApi {
    fn get(
        &self,
        resource: EksaResource,
        name: &str,
        namespace: &str,
    ) -> Result<serde_json::Value, KubeError> {
        debug!(%resource, %name, %namespace, "getting object");
        let api = self.api(resource, namespace);
        let object = self
            .runtime
            .block_on(api.get(name))
            .map_err(|e| api_error("getting", resource, name, namespace, e))?;

        serde_json::to_value(object).map_err(|source| KubeError::Decode {
            resource,
            name: name.to_string(),
            source,
        })
    }

    fn get_cluster(&self, name: &str, namespace: &str) -> Result<Cluster, KubeError> {
        let value = self.get(EksaResource::Cluster, name, namespace)?;
        serde_json::from_value(value).map_err(|source| KubeError::Decode {
            resource: EksaResource::Cluster,
            name: name.to_string(),
            source,
        })
    }

    fn update_status(&self, cluster: &Cluster) -> Result<(), KubeError> {
        let resource = EksaResource::Cluster;
        let patch = status_patch(cluster);
        let api = self.api(resource, cluster.namespace());
        self.runtime
            .block_on(api.patch_status(
                cluster.name(),
                &PatchParams::default(),
                &Patch::Merge(&patch),
            ))
            .map_err(|e| api_error("patching status of", resource, cluster.name(), cluster.namespace(), e))?;
        Ok(())
    }
}

/// Merge patch that sets or nulls both failure fields together.
fn status_patch(cluster: &Cluster) -> serde_json::Value {
    let fields = ClusterStatusFields::from(cluster.status.clone());
    serde_json::json!({ "status": fields })
}
