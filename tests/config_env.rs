// tests/config_env.rs
use std::env;

use devops_status_aggregator::config::{Credentials, DashboardConfig};
use devops_status_aggregator::sources::types::SourceKind;

const VARS: &[&str] = &[
    "JENKINS_URL",
    "JENKINS_USER",
    "JENKINS_TOKEN",
    "ARGOCD_URL",
    "ARGOCD_TOKEN",
    "DOCKER_REPO",
    "DOCKER_HUB_URL",
    "K8S_API_URL",
    "K8S_TOKEN",
    "K8S_NAMESPACE",
    "KUBERNETES_SERVICE_HOST",
    "KUBERNETES_SERVICE_PORT",
    "K8S_SERVICE_ACCOUNT_DIR",
    "REFRESH_INTERVAL_SECONDS",
    "SOURCE_TIMEOUT_MS",
    "JENKINS_MAX_BUILDS",
    "HOST_METRICS",
    "KUBECONFIG",
];

fn clear() {
    for v in VARS {
        env::remove_var(v);
    }
}

#[serial_test::serial]
#[test]
fn empty_environment_leaves_every_source_unconfigured() {
    clear();
    let tmp = tempfile::tempdir().unwrap();
    // Keep a real service account (if the tests run in a pod) out of the picture.
    env::set_var("K8S_SERVICE_ACCOUNT_DIR", tmp.path());
    // Same for a developer kubeconfig in $HOME.
    env::set_var("KUBECONFIG", tmp.path().join("no-kubeconfig"));

    let cfg = DashboardConfig::from_env();
    assert_eq!(cfg.sources.len(), 4);
    assert!(cfg.sources.iter().all(|s| s.endpoint_url.is_none()));
    assert_eq!(cfg.refresh.secs(), 60);
    clear();
}

#[serial_test::serial]
#[test]
fn environment_values_flow_into_source_configs() {
    clear();
    env::set_var("ARGOCD_URL", "https://argo.example/api/v1/applications");
    env::set_var("ARGOCD_TOKEN", "   ");
    env::set_var("DOCKER_REPO", "dhruvre/sample-app");
    env::set_var("K8S_API_URL", "http://127.0.0.1:8001");
    env::set_var("K8S_NAMESPACE", "monitoring");
    env::set_var("K8S_TOKEN", "abc");
    env::set_var("REFRESH_INTERVAL_SECONDS", "1000");
    env::set_var("JENKINS_MAX_BUILDS", "25");

    let cfg = DashboardConfig::from_env();

    // Blank token counts as absent.
    let argo = cfg.source(SourceKind::ArgoCd).unwrap();
    assert!(argo.endpoint_url.is_some());
    assert!(argo.credentials.is_none());

    let docker = cfg.source(SourceKind::DockerHub).unwrap();
    assert_eq!(
        docker.endpoint_url.as_deref(),
        Some("https://hub.docker.com/v2/repositories/dhruvre/sample-app/tags")
    );

    let cluster = cfg.source(SourceKind::Cluster).unwrap();
    assert_eq!(
        cluster.endpoint_url.as_deref(),
        Some("http://127.0.0.1:8001/api/v1/namespaces/monitoring/pods")
    );
    assert_eq!(cluster.credentials, Some(Credentials::Bearer("abc".into())));
    assert!(cluster.ca_cert.is_none());

    assert_eq!(cfg.refresh.secs(), 300);
    assert_eq!(cfg.jenkins_max_builds, 25);
    clear();
}
