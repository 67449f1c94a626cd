use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// `<name>/<name>-eks-a-cluster.kubeconfig`, relative to the working directory.
pub fn from_cluster_name(cluster_name: &str) -> PathBuf {
    PathBuf::from(cluster_name).join(format!("{cluster_name}-eks-a-cluster.kubeconfig"))
}

/// `override_path` when given, otherwise the cluster's generated kubeconfig.
pub fn resolve(cluster_name: &str, override_path: Option<&Path>) -> PathBuf {
    override_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| from_cluster_name(cluster_name))
}

/// The kubeconfig must be an existing, non-empty regular file.
pub fn validate_filename(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("kubeconfig file path is empty");
    }
    let meta = std::fs::metadata(path)
        .with_context(|| format!("kubeconfig file {} does not exist", path.display()))?;
    if !meta.is_file() {
        bail!("kubeconfig {} is not a file", path.display());
    }
    if meta.len() == 0 {
        bail!("kubeconfig file {} is empty", path.display());
    }
    Ok(())
}
