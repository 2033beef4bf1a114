// src/sources/types.rs
use serde::Serialize;

use crate::config::SourceConfig;
use crate::normalize::NormalizedRow;

/// The four external systems the dashboard knows how to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Jenkins,
    ArgoCd,
    DockerHub,
    Cluster,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Cluster,
        SourceKind::Jenkins,
        SourceKind::ArgoCd,
        SourceKind::DockerHub,
    ];

    /// Stable identifier used as the snapshot key and metric label.
    pub fn id(self) -> &'static str {
        match self {
            SourceKind::Jenkins => "jenkins",
            SourceKind::ArgoCd => "argocd",
            SourceKind::DockerHub => "dockerhub",
            SourceKind::Cluster => "cluster",
        }
    }

    /// Human label for dashboard headings and placeholders.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Jenkins => "Jenkins",
            SourceKind::ArgoCd => "ArgoCD",
            SourceKind::DockerHub => "Docker Hub",
            SourceKind::Cluster => "Kubernetes",
        }
    }
}

/// Decoded JSON body handed from a client to the normalizer. Never retained.
pub type RawResponse = serde_json::Value;

/// Failure classes contained at the `SourceClient` boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("required configuration is missing")]
    ConfigMissing,
    #[error("network error: {0}")]
    Network(String),
    #[error("endpoint answered with HTTP {0}")]
    Http(u16),
    #[error("response could not be parsed: {0}")]
    Parse(String),
    #[error("source did not answer within its deadline")]
    Timeout,
}

impl FetchError {
    /// Reason string carried by `SourceResult::Unavailable`.
    pub fn reason(&self) -> String {
        match self {
            FetchError::ConfigMissing => "config_missing".to_string(),
            FetchError::Network(_) => "network_error".to_string(),
            FetchError::Http(status) => format!("http_error:{status}"),
            FetchError::Parse(_) => "parse_error".to_string(),
            FetchError::Timeout => "timeout".to_string(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            FetchError::Http(status.as_u16())
        } else if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Parse(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Outcome of one source for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceResult {
    Available { rows: Vec<NormalizedRow> },
    Unavailable { reason: String },
}

impl SourceResult {
    pub fn available(rows: Vec<NormalizedRow>) -> Self {
        SourceResult::Available { rows }
    }

    pub fn unavailable(err: &FetchError) -> Self {
        SourceResult::Unavailable {
            reason: err.reason(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, SourceResult::Available { .. })
    }

    pub fn rows(&self) -> Option<&[NormalizedRow]> {
        match self {
            SourceResult::Available { rows } => Some(rows),
            SourceResult::Unavailable { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SourceResult::Available { .. } => None,
            SourceResult::Unavailable { reason } => Some(reason),
        }
    }
}

/// One external system behind a fetch interface.
///
/// Implementors only provide `fetch_raw`; the provided `fetch` turns every
/// failure into `Unavailable` and shapes successes through the normalizer,
/// so nothing escapes past it.
#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch_raw(&self, cfg: &SourceConfig) -> Result<RawResponse, FetchError>;

    async fn fetch(&self, cfg: &SourceConfig) -> SourceResult {
        let kind = self.kind();
        match self.fetch_raw(cfg).await {
            Ok(raw) => {
                let rows = crate::normalize::normalize(kind, &raw);
                tracing::debug!(source = kind.id(), rows = rows.len(), "source fetched");
                SourceResult::available(rows)
            }
            Err(e) => {
                tracing::warn!(source = kind.id(), reason = %e.reason(), error = %e, "source unavailable");
                SourceResult::unavailable(&e)
            }
        }
    }
}
