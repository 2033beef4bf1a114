//! DevOps status dashboard: service entrypoint.
//! Boots the Axum HTTP server and the background refresh scheduler.

use std::sync::Arc;

use anyhow::Context;
use devops_status_aggregator::{
    api::{self, AppState},
    build_scheduler,
    config::DashboardConfig,
    init_tracing,
    metrics::Metrics,
    render::{BoardRenderer, DashboardBoard},
};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init().context("metrics init")?;
    let cfg = DashboardConfig::from_env();
    for s in &cfg.sources {
        tracing::info!(
            source = %s.source_id,
            configured = s.endpoint_url.is_some(),
            timeout_ms = s.timeout_ms,
            "source configured"
        );
    }

    let board = DashboardBoard::new();
    let scheduler = build_scheduler(&cfg, Arc::new(BoardRenderer::new(board.clone())));
    scheduler.spawn();

    let state = AppState::new(board).with_metrics(metrics);
    let router = api::router(state);

    Ok(router.into())
}
