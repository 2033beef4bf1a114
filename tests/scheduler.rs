// tests/scheduler.rs
//
// Refresh scheduler: at most one pass in flight, dropped ticks, timer cadence.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devops_status_aggregator::aggregate::Aggregator;
use devops_status_aggregator::config::RefreshInterval;
use devops_status_aggregator::scheduler::{RefreshScheduler, SchedulerState, TickOutcome};
use devops_status_aggregator::sources::types::{SourceClient, SourceKind};

use common::{config_for, CollectingRenderer, FakeClient};

fn scheduler_with(
    delay: Duration,
    calls: Arc<AtomicUsize>,
    renderer: Arc<CollectingRenderer>,
) -> RefreshScheduler {
    let client: Arc<dyn SourceClient> = Arc::new(
        FakeClient::answering(SourceKind::Jenkins)
            .with_delay(delay)
            .with_counter(calls),
    );
    RefreshScheduler::new(
        Aggregator::new(vec![client]),
        vec![config_for(SourceKind::Jenkins, 60_000)],
        renderer,
        RefreshInterval::from_secs(10),
    )
}

#[tokio::test]
async fn tick_during_pass_is_skipped() {
    let calls = Arc::new(AtomicUsize::new(0));
    let renderer = Arc::new(CollectingRenderer::default());
    let sched = scheduler_with(Duration::from_millis(300), Arc::clone(&calls), Arc::clone(&renderer));

    assert_eq!(sched.state(), SchedulerState::Idle);
    let first = sched.tick();
    let second = sched.tick();
    assert!(second.is_skipped());
    assert_eq!(sched.state(), SchedulerState::Aggregating);

    match first {
        TickOutcome::Started(handle) => handle.await.expect("pass completes"),
        TickOutcome::Skipped => panic!("first tick must start a pass"),
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sched.passes(), 1);
    assert_eq!(sched.skipped(), 1);
    assert_eq!(renderer.count(), 1);
    assert_eq!(sched.state(), SchedulerState::Idle);

    // Back to Idle: the next tick runs again.
    match sched.tick() {
        TickOutcome::Started(handle) => handle.await.expect("pass completes"),
        TickOutcome::Skipped => panic!("idle scheduler must start a pass"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(renderer.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn run_loop_ticks_at_interval() {
    let calls = Arc::new(AtomicUsize::new(0));
    let renderer = Arc::new(CollectingRenderer::default());
    let sched = scheduler_with(Duration::ZERO, Arc::clone(&calls), Arc::clone(&renderer));
    assert_eq!(sched.interval().secs(), 10);

    let task = sched.clone().spawn();
    // Ticks at t=0s, 10s, 20s.
    tokio::time::sleep(Duration::from_secs(25)).await;
    task.abort();

    assert_eq!(renderer.count(), 3);
    assert_eq!(sched.passes(), 3);
    assert_eq!(sched.skipped(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_passes_drop_ticks_instead_of_queueing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let renderer = Arc::new(CollectingRenderer::default());
    // Each pass takes 25s, so the ticks at 10s and 20s land mid-pass.
    let sched = scheduler_with(Duration::from_secs(25), Arc::clone(&calls), Arc::clone(&renderer));

    let task = sched.clone().spawn();
    tokio::time::sleep(Duration::from_secs(28)).await;
    task.abort();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sched.skipped(), 2);
    assert_eq!(renderer.count(), 1);
}
