pub mod argocd;
pub mod cluster;
pub mod dockerhub;
pub mod jenkins;
