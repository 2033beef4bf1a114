// src/config/kubeconfig.rs
//! Minimal kubeconfig reader: resolves the current context to an API server,
//! namespace, bearer token and CA. Client-certificate auth is not supported.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Deserialize;

use super::sources::{CaCert, ClusterTarget};

pub const ENV_KUBECONFIG: &str = "KUBECONFIG";

#[derive(Debug, thiserror::Error)]
pub enum KubeconfigError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid kubeconfig: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("no current-context set")]
    NoCurrentContext,
    #[error("context `{0}` not found")]
    UnknownContext(String),
    #[error("cluster `{0}` not found or has no server")]
    UnknownCluster(String),
    #[error("certificate-authority-data is not valid base64: {0}")]
    CaData(#[from] base64::DecodeError),
}

#[derive(Debug, Deserialize)]
struct KubeConfig {
    #[serde(rename = "current-context")]
    current_context: Option<String>,
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    users: Vec<NamedUser>,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: ClusterEntry,
}

#[derive(Debug, Deserialize)]
struct ClusterEntry {
    server: Option<String>,
    #[serde(rename = "certificate-authority")]
    certificate_authority: Option<PathBuf>,
    #[serde(rename = "certificate-authority-data")]
    certificate_authority_data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: ContextEntry,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    cluster: String,
    user: Option<String>,
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: UserEntry,
}

#[derive(Debug, Default, Deserialize)]
struct UserEntry {
    token: Option<String>,
    #[serde(rename = "tokenFile")]
    token_file: Option<PathBuf>,
}

/// Kubeconfig file to use: the first existing entry of `KUBECONFIG`, else
/// `$HOME/.kube/config` when it exists.
pub(crate) fn locate(get: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(list) = get(ENV_KUBECONFIG) {
        return std::env::split_paths(&list).find(|p| p.is_file());
    }
    let home = get("HOME")?;
    let path = Path::new(&home).join(".kube").join("config");
    path.is_file().then_some(path)
}

/// Resolve the current context of the kubeconfig at `path`.
pub(crate) fn load(path: &Path) -> Result<ClusterTarget, KubeconfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| KubeconfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let kc: KubeConfig = serde_yaml::from_str(&text)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let current = kc
        .current_context
        .filter(|c| !c.is_empty())
        .ok_or(KubeconfigError::NoCurrentContext)?;
    let ctx = kc
        .contexts
        .into_iter()
        .find(|c| c.name == current)
        .map(|c| c.context)
        .ok_or(KubeconfigError::UnknownContext(current))?;

    let cluster = kc
        .clusters
        .into_iter()
        .find(|c| c.name == ctx.cluster)
        .map(|c| c.cluster)
        .filter(|c| c.server.is_some())
        .ok_or_else(|| KubeconfigError::UnknownCluster(ctx.cluster.clone()))?;

    // Relative paths are relative to the kubeconfig file.
    let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };

    let ca = match (cluster.certificate_authority_data, cluster.certificate_authority) {
        (Some(data), _) => Some(CaCert::Pem(
            base64::engine::general_purpose::STANDARD.decode(data.trim())?,
        )),
        (None, Some(file)) => Some(CaCert::File(resolve(file))),
        (None, None) => None,
    };

    let user = ctx
        .user
        .and_then(|name| kc.users.into_iter().find(|u| u.name == name))
        .map(|u| u.user)
        .unwrap_or_default();
    let token = match (user.token, user.token_file) {
        (Some(t), _) => Some(t),
        (None, Some(file)) => std::fs::read_to_string(resolve(file))
            .ok()
            .map(|t| t.trim().to_string()),
        (None, None) => None,
    }
    .filter(|t| !t.is_empty());

    Ok(ClusterTarget {
        api: cluster.server.unwrap_or_default(),
        namespace: ctx.namespace.filter(|n| !n.is_empty()),
        token,
        ca,
    })
}
