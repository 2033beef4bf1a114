// src/config/sources.rs
use std::fmt;
use std::path::{Path, PathBuf};

use super::kubeconfig;
use crate::sources::types::SourceKind;

/// Overrides where in-cluster service-account files are looked up.
pub const ENV_SERVICE_ACCOUNT_DIR: &str = "K8S_SERVICE_ACCOUNT_DIR";
pub const DEFAULT_SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
pub const DEFAULT_DOCKER_HUB_URL: &str = "https://hub.docker.com";
pub const DEFAULT_K8S_NAMESPACE: &str = "default";

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { user: String, token: String },
    Bearer(String),
}

// Secrets never reach logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("token", &"***")
                .finish(),
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"***").finish(),
        }
    }
}

/// Immutable per-source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub source_id: String,
    pub kind: SourceKind,
    pub endpoint_url: Option<String>,
    pub credentials: Option<Credentials>,
    pub timeout_ms: u64,
    /// Extra root certificate to trust for the Kubernetes API server.
    pub ca_cert: Option<CaCert>,
}

/// Where a PEM root certificate comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaCert {
    File(PathBuf),
    /// Inline bytes, e.g. kubeconfig `certificate-authority-data`.
    Pem(Vec<u8>),
}

impl CaCert {
    pub fn pem(&self) -> std::io::Result<Vec<u8>> {
        match self {
            CaCert::File(path) => std::fs::read(path),
            CaCert::Pem(bytes) => Ok(bytes.clone()),
        }
    }
}

/// A resolved Kubernetes API server and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClusterTarget {
    pub(crate) api: String,
    pub(crate) namespace: Option<String>,
    pub(crate) token: Option<String>,
    pub(crate) ca: Option<CaCert>,
}

impl SourceConfig {
    pub fn new(kind: SourceKind, endpoint_url: Option<String>, timeout_ms: u64) -> Self {
        Self {
            source_id: kind.id().to_string(),
            kind,
            endpoint_url,
            credentials: None,
            timeout_ms,
            ca_cert: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_ca_cert(mut self, ca: Option<CaCert>) -> Self {
        self.ca_cert = ca;
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}

type Get<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn jenkins(get: Get<'_>, timeout_ms: u64) -> SourceConfig {
    let creds = match (get("JENKINS_USER"), get("JENKINS_TOKEN")) {
        (Some(user), Some(token)) => Some(Credentials::Basic { user, token }),
        _ => None,
    };
    SourceConfig::new(SourceKind::Jenkins, get("JENKINS_URL"), timeout_ms).with_credentials(creds)
}

pub(crate) fn argocd(get: Get<'_>, timeout_ms: u64) -> SourceConfig {
    SourceConfig::new(SourceKind::ArgoCd, get("ARGOCD_URL"), timeout_ms)
        .with_credentials(get("ARGOCD_TOKEN").map(Credentials::Bearer))
}

pub(crate) fn dockerhub(get: Get<'_>, timeout_ms: u64) -> SourceConfig {
    let base = get("DOCKER_HUB_URL").unwrap_or_else(|| DEFAULT_DOCKER_HUB_URL.to_string());
    let endpoint = get("DOCKER_REPO").map(|repo| {
        format!(
            "{}/v2/repositories/{}/tags",
            base.trim_end_matches('/'),
            repo.trim_matches('/')
        )
    });
    SourceConfig::new(SourceKind::DockerHub, endpoint, timeout_ms)
}

/// Resolution order: explicit `K8S_API_URL`, in-cluster service account,
/// then the local kubeconfig. `K8S_TOKEN` and `K8S_NAMESPACE` override
/// whatever the chosen target carries.
pub(crate) fn cluster(get: Get<'_>, sa_dir: &Path, timeout_ms: u64) -> SourceConfig {
    let target = get("K8S_API_URL")
        .map(|api| ClusterTarget {
            api,
            namespace: None,
            token: None,
            ca: None,
        })
        .or_else(|| in_cluster(get, sa_dir))
        .or_else(|| from_kubeconfig(get));

    let Some(target) = target else {
        return SourceConfig::new(SourceKind::Cluster, None, timeout_ms);
    };

    let namespace = get("K8S_NAMESPACE")
        .or(target.namespace)
        .unwrap_or_else(|| DEFAULT_K8S_NAMESPACE.to_string());
    let endpoint = format!(
        "{}/api/v1/namespaces/{}/pods",
        target.api.trim_end_matches('/'),
        namespace
    );
    let token = get("K8S_TOKEN").or(target.token);

    SourceConfig::new(SourceKind::Cluster, Some(endpoint), timeout_ms)
        .with_credentials(token.map(Credentials::Bearer))
        .with_ca_cert(target.ca)
}

// The service-account token is only ever sent to the in-cluster API server.
fn in_cluster(get: Get<'_>, sa_dir: &Path) -> Option<ClusterTarget> {
    let host = get("KUBERNETES_SERVICE_HOST")?;
    let port = get("KUBERNETES_SERVICE_PORT").unwrap_or_else(|| "443".to_string());
    let api = if host.contains(':') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    };

    let token = std::fs::read_to_string(sa_dir.join("token"))
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let ca = sa_dir.join("ca.crt");
    let ca = ca.exists().then_some(CaCert::File(ca));

    Some(ClusterTarget {
        api,
        namespace: None,
        token,
        ca,
    })
}

fn from_kubeconfig(get: Get<'_>) -> Option<ClusterTarget> {
    let path = kubeconfig::locate(get)?;
    match kubeconfig::load(&path) {
        Ok(target) => {
            tracing::debug!(path = %path.display(), api = %target.api, "using kubeconfig");
            Some(target)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "kubeconfig unusable");
            None
        }
    }
}
