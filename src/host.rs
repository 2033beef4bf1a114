// src/host.rs
//! Local host metrics: CPU, memory and root-disk usage.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HostMetrics {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    /// `None` when no disk backs `/` (e.g. some containers).
    pub disk_percent: Option<f64>,
}

struct SamplerState {
    sys: System,
    last_cpu_refresh: Instant,
}

/// Keeps one `System` so CPU usage is measured between consecutive samples.
#[derive(Clone)]
pub struct HostSampler {
    state: Arc<Mutex<SamplerState>>,
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();
        Self {
            state: Arc::new(Mutex::new(SamplerState {
                sys,
                last_cpu_refresh: Instant::now(),
            })),
        }
    }

    /// Blocking sample. Prefer [`HostSampler::sample`] from async code.
    ///
    /// CPU usage is a delta between two refreshes, so a sample taken too soon
    /// after the previous one first waits out sysinfo's minimum interval.
    pub fn sample_blocking(&self) -> HostMetrics {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let since = state.last_cpu_refresh.elapsed();
        if since < MINIMUM_CPU_UPDATE_INTERVAL {
            std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL - since);
        }
        state.sys.refresh_cpu();
        state.last_cpu_refresh = Instant::now();
        state.sys.refresh_memory();

        let cpu = f64::from(state.sys.global_cpu_info().cpu_usage());
        let memory = percent(state.sys.used_memory(), state.sys.total_memory());

        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new("/"))
            .map(|d| {
                percent(
                    d.total_space().saturating_sub(d.available_space()),
                    d.total_space(),
                )
            });

        HostMetrics {
            cpu_percent: round1(cpu),
            memory_percent: round1(memory),
            disk_percent: disk.map(round1),
        }
    }

    pub async fn sample(&self) -> Option<HostMetrics> {
        let this = self.clone();
        match tokio::task::spawn_blocking(move || this.sample_blocking()).await {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = %e, "host metrics sampling failed");
                None
            }
        }
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 * 100.0 / total as f64
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
