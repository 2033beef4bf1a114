// src/sources/providers/cluster.rs
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::{Certificate, Client};

use crate::config::{CaCert, SourceConfig};
use crate::normalize;
use crate::sources::types::{FetchError, RawResponse, SourceClient, SourceKind};
use crate::sources::{authorize, get_json, http_client_builder};

/// Pod listing for one namespace straight from the Kubernetes API server.
pub struct ClusterClient {
    http: Client,
    // Client trusting the configured CA, built on first use.
    trusted: Mutex<Option<(CaCert, Client)>>,
}

impl ClusterClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            trusted: Mutex::new(None),
        }
    }

    /// Shared client when no CA is configured, otherwise one that trusts `ca`
    /// on top of the system roots. The CA is read once per distinct value.
    fn client_for(&self, ca: Option<&CaCert>) -> Result<Client, FetchError> {
        let Some(ca) = ca else {
            return Ok(self.http.clone());
        };
        let mut trusted = self.trusted.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((cached, client)) = trusted.as_ref() {
            if cached == ca {
                return Ok(client.clone());
            }
        }

        let pem = ca.pem().map_err(|e| {
            tracing::warn!(source = "cluster", ca = %ca_label(ca), error = %e, "CA bundle unreadable");
            FetchError::ConfigMissing
        })?;
        let cert = Certificate::from_pem(&pem).map_err(|e| {
            tracing::warn!(source = "cluster", ca = %ca_label(ca), error = %e, "CA bundle invalid");
            FetchError::ConfigMissing
        })?;
        let client = http_client_builder()
            .add_root_certificate(cert)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        *trusted = Some((ca.clone(), client.clone()));
        Ok(client)
    }
}

fn ca_label(ca: &CaCert) -> String {
    match ca {
        CaCert::File(path) => path.display().to_string(),
        CaCert::Pem(_) => "<inline>".to_string(),
    }
}

#[async_trait]
impl SourceClient for ClusterClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Cluster
    }

    async fn fetch_raw(&self, cfg: &SourceConfig) -> Result<RawResponse, FetchError> {
        let url = cfg.endpoint_url.as_deref().ok_or(FetchError::ConfigMissing)?;
        let http = self.client_for(cfg.ca_cert.as_ref())?;

        let req = authorize(http.get(url).timeout(cfg.timeout()), cfg.credentials.as_ref());
        let raw = get_json(req).await?;
        if normalize::collection(SourceKind::Cluster, &raw).is_none() {
            return Err(FetchError::Parse("pod list has no `items`".into()));
        }
        Ok(raw)
    }
}
