use anyhow::{anyhow, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

impl Metrics {
    /// Install the Prometheus recorder. Safe to call more than once; later
    /// calls return the handle installed by the first.
    pub fn init() -> Result<Self> {
        let handle = HANDLE.get_or_try_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| anyhow!("prometheus: install recorder: {e}"))
        })?;
        describe_all();
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metric descriptions, so series show up on /metrics.
pub fn describe_all() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("aggregate_passes_total", "Completed aggregation passes.");
        describe_counter!(
            "aggregate_ticks_skipped_total",
            "Scheduler ticks dropped because a pass was still in flight."
        );
        describe_counter!(
            "source_unavailable_total",
            "Sources reported unavailable, by source and reason."
        );
        describe_counter!("source_rows_total", "Normalized rows produced per source.");
        describe_counter!(
            "source_partial_rows_total",
            "Detail requests that failed and cost a single row."
        );
        describe_counter!(
            "normalize_rows_dropped_total",
            "Malformed rows skipped by the normalizer."
        );
        describe_histogram!("aggregate_duration_ms", "Aggregation pass time in milliseconds.");
        describe_gauge!("aggregate_last_run_ts", "Unix ts when the last pass finished.");
    });
}
