// src/sources/providers/argocd.rs
use async_trait::async_trait;
use reqwest::Client;

use crate::config::{Credentials, SourceConfig};
use crate::normalize;
use crate::sources::types::{FetchError, RawResponse, SourceClient, SourceKind};
use crate::sources::{authorize, get_json};

/// ArgoCD `GET /api/v1/applications` with a bearer token.
pub struct ArgoCdClient {
    http: Client,
}

impl ArgoCdClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceClient for ArgoCdClient {
    fn kind(&self) -> SourceKind {
        SourceKind::ArgoCd
    }

    async fn fetch_raw(&self, cfg: &SourceConfig) -> Result<RawResponse, FetchError> {
        let url = cfg.endpoint_url.as_deref().ok_or(FetchError::ConfigMissing)?;
        let token = match &cfg.credentials {
            Some(c @ Credentials::Bearer(_)) => c,
            _ => return Err(FetchError::ConfigMissing),
        };

        let req = authorize(self.http.get(url).timeout(cfg.timeout()), Some(token));
        let raw = get_json(req).await?;
        if normalize::collection(SourceKind::ArgoCd, &raw).is_none() {
            return Err(FetchError::Parse("applications response has no `items`".into()));
        }
        Ok(raw)
    }
}
