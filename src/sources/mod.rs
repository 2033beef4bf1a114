// src/sources/mod.rs
pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use crate::config::Credentials;
use crate::sources::providers::{
    argocd::ArgoCdClient, cluster::ClusterClient, dockerhub::DockerHubClient,
    jenkins::JenkinsClient,
};
use crate::sources::types::{FetchError, RawResponse, SourceClient};

const USER_AGENT: &str = "devops-status-aggregator/0.1";

pub(crate) fn http_client_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(4))
}

/// Shared HTTP client. Per-request deadlines come from each `SourceConfig`.
pub fn http_client() -> Client {
    http_client_builder()
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "http client builder failed, using defaults");
            Client::new()
        })
}

/// The four production clients sharing one connection pool.
pub fn default_clients(jenkins_max_builds: usize) -> Vec<Arc<dyn SourceClient>> {
    let http = http_client();
    vec![
        Arc::new(JenkinsClient::new(http.clone()).with_max_builds(jenkins_max_builds)),
        Arc::new(ArgoCdClient::new(http.clone())),
        Arc::new(DockerHubClient::new(http.clone())),
        Arc::new(ClusterClient::new(http)),
    ]
}

pub(crate) fn authorize(req: RequestBuilder, creds: Option<&Credentials>) -> RequestBuilder {
    match creds {
        Some(Credentials::Basic { user, token }) => req.basic_auth(user, Some(token)),
        Some(Credentials::Bearer(token)) => req.bearer_auth(token),
        None => req,
    }
}

/// Send `req` and decode a JSON body, classifying every failure.
pub(crate) async fn get_json(req: RequestBuilder) -> Result<RawResponse, FetchError> {
    let resp = req.header("Accept", "application/json").send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Http(status.as_u16()));
    }
    let body = resp.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| FetchError::Parse(e.to_string()))
}
