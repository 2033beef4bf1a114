// src/config/mod.rs
//! Process configuration, read once from the environment at startup.
//!
//! A source with missing variables is still configured; its endpoint or
//! credentials are simply `None`, which the client reports as `config_missing`.

pub mod kubeconfig;
pub mod sources;

pub use sources::{CaCert, Credentials, SourceConfig};

use std::path::PathBuf;
use std::time::Duration;

use crate::sources::types::SourceKind;

pub const ENV_REFRESH_INTERVAL: &str = "REFRESH_INTERVAL_SECONDS";
pub const ENV_SOURCE_TIMEOUT_MS: &str = "SOURCE_TIMEOUT_MS";
pub const ENV_JENKINS_MAX_BUILDS: &str = "JENKINS_MAX_BUILDS";
pub const ENV_HOST_METRICS: &str = "HOST_METRICS";

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const MIN_TIMEOUT_MS: u64 = 100;
pub const MAX_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_JENKINS_MAX_BUILDS: usize = 10;

/// Refresh cadence, always within `MIN_SECS..=MAX_SECS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshInterval(u64);

impl RefreshInterval {
    pub const MIN_SECS: u64 = 10;
    pub const MAX_SECS: u64 = 300;
    pub const DEFAULT_SECS: u64 = 60;

    /// Clamp `secs` into the accepted range.
    pub fn from_secs(secs: u64) -> Self {
        let clamped = secs.clamp(Self::MIN_SECS, Self::MAX_SECS);
        if clamped != secs {
            tracing::warn!(requested = secs, used = clamped, "refresh interval clamped");
        }
        Self(clamped)
    }

    pub fn secs(self) -> u64 {
        self.0
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.0)
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self(Self::DEFAULT_SECS)
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// One entry per source, in dashboard order.
    pub sources: Vec<SourceConfig>,
    pub refresh: RefreshInterval,
    pub jenkins_max_builds: usize,
    pub host_metrics: bool,
}

impl DashboardConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let refresh = match get(ENV_REFRESH_INTERVAL) {
            None => RefreshInterval::default(),
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => RefreshInterval::from_secs(secs),
                Err(_) => {
                    tracing::warn!(value = %raw, "unparsable {ENV_REFRESH_INTERVAL}, using default");
                    RefreshInterval::default()
                }
            },
        };

        let timeout_ms = get(ENV_SOURCE_TIMEOUT_MS)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);

        let jenkins_max_builds = get(ENV_JENKINS_MAX_BUILDS)
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_JENKINS_MAX_BUILDS);

        let host_metrics = get(ENV_HOST_METRICS).map_or(true, |v| {
            !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no")
        });

        let sa_dir = get(sources::ENV_SERVICE_ACCOUNT_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(sources::DEFAULT_SERVICE_ACCOUNT_DIR));

        let sources = SourceKind::ALL
            .iter()
            .map(|kind| match kind {
                SourceKind::Jenkins => sources::jenkins(&get, timeout_ms),
                SourceKind::ArgoCd => sources::argocd(&get, timeout_ms),
                SourceKind::DockerHub => sources::dockerhub(&get, timeout_ms),
                SourceKind::Cluster => sources::cluster(&get, &sa_dir, timeout_ms),
            })
            .collect();

        Self {
            sources,
            refresh,
            jenkins_max_builds,
            host_metrics,
        }
    }

    pub fn source(&self, kind: SourceKind) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn interval_is_clamped_and_defaulted() {
        assert_eq!(RefreshInterval::from_secs(1).secs(), 10);
        assert_eq!(RefreshInterval::from_secs(900).secs(), 300);
        assert_eq!(RefreshInterval::from_secs(45).secs(), 45);

        let cfg = DashboardConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.refresh.secs(), 60);
        let cfg = DashboardConfig::from_lookup(lookup(&[(ENV_REFRESH_INTERVAL, "soon")]));
        assert_eq!(cfg.refresh.secs(), 60);
        let cfg = DashboardConfig::from_lookup(lookup(&[(ENV_REFRESH_INTERVAL, "5")]));
        assert_eq!(cfg.refresh.secs(), 10);
    }

    #[test]
    fn every_source_is_present_even_when_unconfigured() {
        let cfg = DashboardConfig::from_lookup(lookup(&[("K8S_SERVICE_ACCOUNT_DIR", "/nonexistent")]));
        assert_eq!(cfg.sources.len(), 4);
        for s in &cfg.sources {
            assert!(s.endpoint_url.is_none(), "{} should be unconfigured", s.source_id);
            assert_eq!(s.timeout_ms, DEFAULT_TIMEOUT_MS);
        }
        assert_eq!(cfg.jenkins_max_builds, 10);
        assert!(cfg.host_metrics);
    }

    #[test]
    fn full_environment_configures_all_sources() {
        let cfg = DashboardConfig::from_lookup(lookup(&[
            ("JENKINS_URL", "http://ci/job/app/api/json"),
            ("JENKINS_USER", "admin"),
            ("JENKINS_TOKEN", "t0k"),
            ("ARGOCD_URL", "https://argo/api/v1/applications"),
            ("ARGOCD_TOKEN", "bearer"),
            ("DOCKER_REPO", "acme/app"),
            ("K8S_API_URL", "https://k8s.local:6443/"),
            ("K8S_NAMESPACE", "prod"),
            (ENV_SOURCE_TIMEOUT_MS, "10"),
            (ENV_HOST_METRICS, "off"),
        ]));

        let jenkins = cfg.source(SourceKind::Jenkins).unwrap();
        assert_eq!(
            jenkins.credentials,
            Some(Credentials::Basic {
                user: "admin".into(),
                token: "t0k".into()
            })
        );
        assert_eq!(jenkins.timeout_ms, MIN_TIMEOUT_MS);

        let docker = cfg.source(SourceKind::DockerHub).unwrap();
        assert_eq!(
            docker.endpoint_url.as_deref(),
            Some("https://hub.docker.com/v2/repositories/acme/app/tags")
        );

        let cluster = cfg.source(SourceKind::Cluster).unwrap();
        assert_eq!(
            cluster.endpoint_url.as_deref(),
            Some("https://k8s.local:6443/api/v1/namespaces/prod/pods")
        );
        assert!(!cfg.host_metrics);
    }
}
