// src/sources/providers/jenkins.rs
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::config::{Credentials, SourceConfig, DEFAULT_JENKINS_MAX_BUILDS};
use crate::normalize;
use crate::sources::types::{FetchError, RawResponse, SourceClient, SourceKind};
use crate::sources::{authorize, get_json};

/// Job listing first, then one detail request per recent build.
///
/// The listing decides availability. A failed detail request only loses its
/// own row. Listing and details share a single deadline of `timeout_ms`.
pub struct JenkinsClient {
    http: Client,
    max_builds: usize,
}

impl JenkinsClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            max_builds: DEFAULT_JENKINS_MAX_BUILDS,
        }
    }

    pub fn with_max_builds(mut self, n: usize) -> Self {
        self.max_builds = n.max(1);
        self
    }
}

fn detail_url(build_url: &str) -> String {
    if build_url.ends_with('/') {
        format!("{build_url}api/json")
    } else {
        format!("{build_url}/api/json")
    }
}

fn remaining(deadline: Instant) -> Result<std::time::Duration, FetchError> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        Err(FetchError::Timeout)
    } else {
        Ok(left)
    }
}

#[async_trait]
impl SourceClient for JenkinsClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Jenkins
    }

    async fn fetch_raw(&self, cfg: &SourceConfig) -> Result<RawResponse, FetchError> {
        let url = cfg.endpoint_url.as_deref().ok_or(FetchError::ConfigMissing)?;
        let creds = match &cfg.credentials {
            Some(c @ Credentials::Basic { .. }) => c.clone(),
            _ => return Err(FetchError::ConfigMissing),
        };
        let deadline = Instant::now() + cfg.timeout();

        let listing_req = self.http.get(url).timeout(remaining(deadline)?);
        let listing = get_json(authorize(listing_req, Some(&creds))).await?;
        let builds = normalize::collection(SourceKind::Jenkins, &listing)
            .ok_or_else(|| FetchError::Parse("job listing has no `builds` array".into()))?;

        let mut urls = Vec::with_capacity(self.max_builds);
        for b in builds.iter().take(self.max_builds) {
            match b.get("url").and_then(Value::as_str) {
                Some(u) => urls.push(detail_url(u)),
                None => tracing::debug!(source = "jenkins", "build entry without url skipped"),
            }
        }

        let creds = Arc::new(creds);
        let mut set = JoinSet::new();
        for (idx, detail) in urls.into_iter().enumerate() {
            let http = self.http.clone();
            let creds = Arc::clone(&creds);
            set.spawn(async move {
                let result = match remaining(deadline) {
                    Ok(left) => {
                        let req = authorize(http.get(&detail).timeout(left), Some(creds.as_ref()));
                        get_json(req).await
                    }
                    Err(e) => Err(e),
                };
                if let Err(e) = &result {
                    tracing::warn!(source = "jenkins", build = %detail, reason = %e.reason(), error = %e, "build detail dropped");
                }
                (idx, result)
            });
        }

        let mut slots: Vec<Option<Value>> = vec![None; set.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(detail))) => slots[idx] = Some(detail),
                Ok((_, Err(_))) => {
                    counter!("source_partial_rows_total", "source" => "jenkins").increment(1);
                }
                Err(e) => {
                    tracing::warn!(source = "jenkins", error = %e, "build detail task failed");
                    counter!("source_partial_rows_total", "source" => "jenkins").increment(1);
                }
            }
        }

        let details: Vec<Value> = slots.into_iter().flatten().collect();
        Ok(json!({ "builds": details }))
    }
}
