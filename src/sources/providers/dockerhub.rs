// src/sources/providers/dockerhub.rs
use async_trait::async_trait;
use reqwest::Client;

use crate::config::SourceConfig;
use crate::normalize;
use crate::sources::types::{FetchError, RawResponse, SourceClient, SourceKind};
use crate::sources::{authorize, get_json};

/// Public Docker Hub tag listing for one repository (first page).
pub struct DockerHubClient {
    http: Client,
}

impl DockerHubClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceClient for DockerHubClient {
    fn kind(&self) -> SourceKind {
        SourceKind::DockerHub
    }

    async fn fetch_raw(&self, cfg: &SourceConfig) -> Result<RawResponse, FetchError> {
        let url = cfg.endpoint_url.as_deref().ok_or(FetchError::ConfigMissing)?;
        // Public repositories need no auth; a token is passed through if configured.
        let req = authorize(
            self.http.get(url).timeout(cfg.timeout()),
            cfg.credentials.as_ref(),
        );
        let raw = get_json(req).await?;
        if normalize::collection(SourceKind::DockerHub, &raw).is_none() {
            return Err(FetchError::Parse("tag listing has no `results`".into()));
        }
        Ok(raw)
    }
}
