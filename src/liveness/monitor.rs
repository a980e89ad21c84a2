//! Idle-timeout sweeper.

use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::MonitorConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::registry::ConnectionRegistry;

/// Periodically evicts connections that have gone quiet.
pub struct TimeoutMonitor {
    registry: ConnectionRegistry,
    config: MonitorConfig,
}

impl TimeoutMonitor {
    pub fn new(registry: ConnectionRegistry, config: MonitorConfig) -> Self {
        Self { registry, config }
    }

    /// Spawn the sweep loop. The first sweep runs immediately.
    pub fn spawn(self) -> MonitorHandle {
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        let task = tokio::spawn(self.run(rx));
        MonitorHandle { shutdown, task }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            jitter_secs = self.config.jitter_secs,
            idle_timeout_secs = self.config.idle_timeout_secs,
            "Timeout monitor starting"
        );

        loop {
            // Not raced against shutdown: a started sweep always completes.
            self.sweep().await;

            let delay = jittered(self.config.interval(), self.config.jitter());
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Timeout monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Sweep against the current instant. Returns how many connections were evicted.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    /// Evict every connection idle for longer than the timeout as of `now`.
    pub async fn sweep_at(&self, now: Instant) -> usize {
        metrics::record_sweep();
        let idle_timeout = self.config.idle_timeout();
        let mut evicted = 0;

        self.registry
            .for_each_snapshot(|record| {
                let idle = now.saturating_duration_since(record.last_activity);
                if idle > idle_timeout {
                    tracing::info!(
                        connection_id = %record.id,
                        idle_secs = idle.as_secs(),
                        "Evicting idle connection"
                    );
                    self.registry.remove_and_disconnect(record.id);
                    metrics::record_eviction();
                    evicted += 1;
                }
            })
            .await;

        tracing::debug!(evicted, "Sweep complete");
        evicted
    }
}

/// Handle to a spawned monitor.
pub struct MonitorHandle {
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Cancel future sweeps and wait for any sweep in progress to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Timeout monitor task failed");
        }
    }
}

/// `base` shifted by a uniform offset in `[-jitter, +jitter]`, never below zero.
pub fn jittered(base: Duration, jitter: Duration) -> Duration {
    let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
    if jitter_ms == 0 {
        return base;
    }

    let offset = rand::thread_rng().gen_range(0..=jitter_ms.saturating_mul(2));
    base.saturating_add(Duration::from_millis(offset)).saturating_sub(jitter)
}
