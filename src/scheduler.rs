// src/scheduler.rs
//! Timer-driven refresh loop.
//!
//! Each tick starts one aggregation pass in the background. While a pass is in
//! flight, further ticks are dropped (not queued), so at most one pass runs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::aggregate::Aggregator;
use crate::config::{RefreshInterval, SourceConfig};
use crate::render::Renderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Aggregating,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// A pass was started; the handle resolves once it has been rendered.
    Started(JoinHandle<()>),
    /// A pass was already in flight; this tick was dropped.
    Skipped,
}

impl TickOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TickOutcome::Skipped)
    }
}

struct Inner {
    aggregator: Aggregator,
    configs: Vec<SourceConfig>,
    renderer: Arc<dyn Renderer>,
    interval: RefreshInterval,
    in_flight: AtomicBool,
    passes: AtomicU64,
    skipped: AtomicU64,
}

// Returns the scheduler to Idle even if the pass panics.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    pub fn new(
        aggregator: Aggregator,
        configs: Vec<SourceConfig>,
        renderer: Arc<dyn Renderer>,
        interval: RefreshInterval,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                aggregator,
                configs,
                renderer,
                interval,
                in_flight: AtomicBool::new(false),
                passes: AtomicU64::new(0),
                skipped: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.inner.in_flight.load(Ordering::Acquire) {
            SchedulerState::Aggregating
        } else {
            SchedulerState::Idle
        }
    }

    /// Passes started so far.
    pub fn passes(&self) -> u64 {
        self.inner.passes.load(Ordering::Relaxed)
    }

    /// Ticks dropped because a pass was in flight.
    pub fn skipped(&self) -> u64 {
        self.inner.skipped.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> RefreshInterval {
        self.inner.interval
    }

    /// Handle one tick: `Idle -> Aggregating`, or a no-op while `Aggregating`.
    pub fn tick(&self) -> TickOutcome {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.inner.skipped.fetch_add(1, Ordering::Relaxed);
            counter!("aggregate_ticks_skipped_total").increment(1);
            tracing::debug!(target: "scheduler", "tick skipped, pass still in flight");
            return TickOutcome::Skipped;
        }

        let pass = self.inner.passes.fetch_add(1, Ordering::Relaxed) + 1;
        let inner = Arc::clone(&self.inner);
        TickOutcome::Started(tokio::spawn(async move {
            let _guard = InFlight(&inner.in_flight);
            let snapshot = inner.aggregator.aggregate(&inner.configs).await;
            tracing::debug!(
                target: "scheduler",
                pass,
                available = snapshot.available_count(),
                "rendering snapshot"
            );
            inner.renderer.render(snapshot);
        }))
    }

    /// Tick forever at the configured interval. The first tick fires immediately.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.inner.interval.as_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            target: "scheduler",
            interval_secs = self.inner.interval.secs(),
            sources = self.inner.configs.len(),
            "refresh scheduler started"
        );
        loop {
            ticker.tick().await;
            let _ = self.tick();
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
