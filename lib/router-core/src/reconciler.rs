//! Level-triggered dirty reconciler
//!
//! Callers mark the reconciler dirty from any task. A single background loop
//! waits for the mark, clears it and runs the reconcile target once. Marks
//! raised while a run is in flight collapse into one pending mark, so every
//! burst of signals is followed by at least one complete run and runs never
//! overlap.

use crate::{ControllerMetrics, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Something the dirty reconciler can drive
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn reconcile(&self) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcilerState {
    Idle,
    Running,
}

pub struct DirtyReconciler {
    name: String,
    // Single-slot pending flag: notify_one stores at most one permit.
    pending: Notify,
    running: AtomicBool,
    resync_period: Option<Duration>,
    retry_delay: Duration,
    metrics: Option<ControllerMetrics>,
}

impl DirtyReconciler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: Notify::new(),
            running: AtomicBool::new(false),
            resync_period: None,
            retry_delay: Duration::ZERO,
            metrics: None,
        }
    }

    /// Also mark dirty every `period`, if set
    pub fn with_resync_period(mut self, period: Option<Duration>) -> Self {
        self.resync_period = period;
        self
    }

    /// Wait `delay` before retrying a failed run. Zero retries immediately.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_metrics(mut self, metrics: ControllerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ReconcilerState {
        if self.running.load(Ordering::SeqCst) {
            ReconcilerState::Running
        } else {
            ReconcilerState::Idle
        }
    }

    /// Request a reconcile run. Never blocks and never runs the target inline.
    pub fn mark_dirty(&self) {
        self.pending.notify_one();
        if let Some(metrics) = &self.metrics {
            metrics.dirty_signals_total.inc();
        }
    }

    /// Drive `target` until `shutdown` is cancelled.
    ///
    /// A run already in progress when shutdown is requested completes; no
    /// further runs start.
    pub async fn run<R: Reconcile + ?Sized>(&self, target: &R, shutdown: CancellationToken) {
        info!(reconciler = %self.name, "Starting dirty reconciler");

        let mut resync = self.resync_period.map(|period| {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.pending.notified() => {}
                _ = next_tick(resync.as_mut()) => {
                    debug!(reconciler = %self.name, "Periodic resync");
                }
            }

            if self.run_once(target).await {
                continue;
            }

            // Failed: keep the flag pending so the next iteration retries.
            self.pending.notify_one();
            if self.retry_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = time::sleep(self.retry_delay) => {}
                }
            }
        }

        info!(reconciler = %self.name, "Dirty reconciler stopped");
    }

    async fn run_once<R: Reconcile + ?Sized>(&self, target: &R) -> bool {
        self.running.store(true, Ordering::SeqCst);
        let started = Instant::now();
        let result = target.reconcile().await;
        self.running.store(false, Ordering::SeqCst);

        let elapsed = started.elapsed();
        let outcome = if result.is_ok() { "success" } else { "error" };
        if let Some(metrics) = &self.metrics {
            metrics.reconcile_duration_seconds.observe(elapsed.as_secs_f64());
            metrics
                .reconcile_runs_total
                .with_label_values(&[outcome])
                .inc();
        }

        match result {
            Ok(()) => {
                debug!(reconciler = %self.name, elapsed_ms = elapsed.as_millis() as u64, "Reconcile finished");
                true
            }
            Err(e) => {
                error!(reconciler = %self.name, error = %e, "Reconcile failed, retrying");
                false
            }
        }
    }
}

async fn next_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
