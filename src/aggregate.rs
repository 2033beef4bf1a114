//! Aggregator: one concurrent fetch per configured source, joined into a
//! [`Snapshot`] once every source has answered or hit its deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::config::SourceConfig;
use crate::host::{HostMetrics, HostSampler};
use crate::sources::types::{FetchError, SourceClient, SourceKind, SourceResult};

/// Slack on top of each source's own `timeout_ms` before it is abandoned.
pub const DEFAULT_GRACE: Duration = Duration::from_millis(250);

/// Reason recorded when a fetch task dies instead of returning.
pub const REASON_INTERNAL: &str = "internal_error";
/// Reason recorded when no client handles a configured source kind.
pub const REASON_UNSUPPORTED: &str = "unsupported_source";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceEntry {
    pub source_id: String,
    pub kind: SourceKind,
    pub result: SourceResult,
}

/// Point-in-time result of one tick: exactly one entry per configured source,
/// in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    assembled_at: DateTime<Utc>,
    sources: Vec<SourceEntry>,
    host: Option<HostMetrics>,
}

impl Snapshot {
    pub fn assemble(
        assembled_at: DateTime<Utc>,
        sources: Vec<SourceEntry>,
        host: Option<HostMetrics>,
    ) -> Self {
        Self {
            assembled_at,
            sources,
            host,
        }
    }

    pub fn assembled_at(&self) -> DateTime<Utc> {
        self.assembled_at
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.sources
    }

    pub fn get(&self, source_id: &str) -> Option<&SourceResult> {
        self.sources
            .iter()
            .find(|e| e.source_id == source_id)
            .map(|e| &e.result)
    }

    pub fn host(&self) -> Option<&HostMetrics> {
        self.host.as_ref()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn available_count(&self) -> usize {
        self.sources.iter().filter(|e| e.result.is_available()).count()
    }
}

pub struct Aggregator {
    clients: Vec<Arc<dyn SourceClient>>,
    host: Option<HostSampler>,
    grace: Duration,
}

impl Aggregator {
    pub fn new(clients: Vec<Arc<dyn SourceClient>>) -> Self {
        Self {
            clients,
            host: None,
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_host_sampler(mut self, sampler: HostSampler) -> Self {
        self.host = Some(sampler);
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn client_for(&self, kind: SourceKind) -> Option<Arc<dyn SourceClient>> {
        self.clients.iter().find(|c| c.kind() == kind).cloned()
    }

    /// Fetch every source concurrently and assemble the snapshot.
    ///
    /// Each fetch runs in its own task under `timeout_ms + grace`; a fetch that
    /// overruns is dropped and recorded as `timeout`. Nothing is retried.
    pub async fn aggregate(&self, configs: &[SourceConfig]) -> Snapshot {
        crate::metrics::describe_all();
        let t0 = Instant::now();

        let mut slots: Vec<SourceResult> = vec![
            SourceResult::Unavailable {
                reason: REASON_INTERNAL.to_string(),
            };
            configs.len()
        ];

        let mut set = JoinSet::new();
        for (idx, cfg) in configs.iter().enumerate() {
            let Some(client) = self.client_for(cfg.kind) else {
                tracing::warn!(source = %cfg.source_id, "no client registered for source");
                slots[idx] = SourceResult::Unavailable {
                    reason: REASON_UNSUPPORTED.to_string(),
                };
                continue;
            };
            let cfg = cfg.clone();
            let deadline = cfg.timeout() + self.grace;
            set.spawn(async move {
                let result = match tokio::time::timeout(deadline, client.fetch(&cfg)).await {
                    Ok(r) => r,
                    Err(_) => {
                        tracing::warn!(source = %cfg.source_id, timeout_ms = cfg.timeout_ms, "source abandoned after deadline");
                        SourceResult::unavailable(&FetchError::Timeout)
                    }
                };
                (idx, result)
            });
        }

        let longest = configs
            .iter()
            .map(SourceConfig::timeout)
            .max()
            .unwrap_or_default()
            + self.grace;

        let sources = async {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((idx, result)) => slots[idx] = result,
                    Err(e) => tracing::error!(error = %e, "source task failed"),
                }
            }
            slots
        };
        let host = async {
            match &self.host {
                Some(sampler) => tokio::time::timeout(longest, sampler.sample())
                    .await
                    .ok()
                    .flatten(),
                None => None,
            }
        };
        let (slots, host) = tokio::join!(sources, host);

        let entries: Vec<SourceEntry> = configs
            .iter()
            .zip(slots)
            .map(|(cfg, result)| SourceEntry {
                source_id: cfg.source_id.clone(),
                kind: cfg.kind,
                result,
            })
            .collect();

        record_pass(&entries, t0.elapsed());

        Snapshot::assemble(Utc::now(), entries, host)
    }
}

fn record_pass(entries: &[SourceEntry], elapsed: Duration) {
    for e in entries {
        match &e.result {
            SourceResult::Available { rows } => {
                counter!("source_rows_total", "source" => e.source_id.clone())
                    .increment(rows.len() as u64);
            }
            SourceResult::Unavailable { reason } => {
                counter!(
                    "source_unavailable_total",
                    "source" => e.source_id.clone(),
                    "reason" => reason.clone()
                )
                .increment(1);
            }
        }
    }
    let ms = elapsed.as_secs_f64() * 1_000.0;
    histogram!("aggregate_duration_ms").record(ms);
    counter!("aggregate_passes_total").increment(1);
    gauge!("aggregate_last_run_ts").set(Utc::now().timestamp() as f64);

    tracing::info!(
        target: "aggregate",
        sources = entries.len(),
        available = entries.iter().filter(|e| e.result.is_available()).count(),
        elapsed_ms = ms as u64,
        "aggregation pass complete"
    );
}
