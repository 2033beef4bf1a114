// src/lib.rs
// Public library surface for the service binary, the CLI and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod host;
pub mod metrics;
pub mod normalize;
pub mod render;
pub mod scheduler;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{Aggregator, Snapshot, SourceEntry};
pub use crate::api::router;
pub use crate::config::{DashboardConfig, SourceConfig};
pub use crate::scheduler::RefreshScheduler;
pub use crate::sources::types::{FetchError, SourceClient, SourceKind, SourceResult};

use std::sync::Arc;

use crate::host::HostSampler;
use crate::render::Renderer;

/// Aggregator over the production clients, honouring `cfg`.
pub fn build_aggregator(cfg: &DashboardConfig) -> Aggregator {
    let agg = Aggregator::new(sources::default_clients(cfg.jenkins_max_builds));
    if cfg.host_metrics {
        agg.with_host_sampler(HostSampler::new())
    } else {
        agg
    }
}

/// Scheduler wired to the production clients and `renderer`.
pub fn build_scheduler(cfg: &DashboardConfig, renderer: Arc<dyn Renderer>) -> RefreshScheduler {
    RefreshScheduler::new(
        build_aggregator(cfg),
        cfg.sources.clone(),
        renderer,
        cfg.refresh,
    )
}

/// Initialise `tracing` with an `EnvFilter` (default `info`). A subscriber
/// installed earlier, e.g. by the hosting runtime, is left in place.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
