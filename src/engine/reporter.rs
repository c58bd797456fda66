use crate::engine::metrics::Metrics;
use crate::engine::thresholds::evaluate_thresholds;
use crate::engine::worker::WorkerGauge;
use crate::types::{StatsSnapshot, Threshold};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(100);
const LOG_EVERY_TICKS: u32 = 10;

/// Publishes live snapshots while the load phase runs and, with fail-fast
/// enabled, cancels the run on the first threshold breach.
pub struct Reporter {
    metrics: Arc<Metrics>,
    gauge: Arc<WorkerGauge>,
    snapshot_tx: watch::Sender<StatsSnapshot>,
    thresholds: Vec<Threshold>,
    fail_fast: bool,
    threshold_failed: Arc<AtomicBool>,
    cancel_token: CancellationToken,
    done: CancellationToken,
}

impl Reporter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        metrics: Arc<Metrics>,
        gauge: Arc<WorkerGauge>,
        snapshot_tx: watch::Sender<StatsSnapshot>,
        thresholds: Vec<Threshold>,
        fail_fast: bool,
        threshold_failed: Arc<AtomicBool>,
        cancel_token: CancellationToken,
        done: CancellationToken,
    ) -> Self {
        Self {
            metrics,
            gauge,
            snapshot_tx,
            thresholds,
            fail_fast,
            threshold_failed,
            cancel_token,
            done,
        }
    }

    pub async fn run(self) {
        let mut snapshot_interval = tokio::time::interval(SNAPSHOT_INTERVAL);
        snapshot_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut ticks = 0u32;

        loop {
            tokio::select! {
                biased;

                _ = self.done.cancelled() => {
                    self.send_snapshot();
                    break;
                }

                _ = snapshot_interval.tick() => {
                    let snapshot = self.send_snapshot();
                    ticks += 1;
                    if ticks % LOG_EVERY_TICKS == 0 {
                        tracing::info!(
                            "{:>6.1}s  workers={:<4} iterations={:<8} rate={:.1}/s errors={:.2}%",
                            snapshot.elapsed.as_secs_f64(),
                            snapshot.workers_active,
                            snapshot.total_iterations,
                            snapshot.iterations_per_sec,
                            snapshot.error_rate * 100.0
                        );
                    }
                    self.check_fail_fast(&snapshot);
                }
            }
        }
    }

    fn send_snapshot(&self) -> StatsSnapshot {
        let snapshot = self
            .metrics
            .snapshot(self.gauge.running(), self.gauge.peak());
        let _ = self.snapshot_tx.send(snapshot.clone());
        snapshot
    }

    fn check_fail_fast(&self, snapshot: &StatsSnapshot) {
        if !self.fail_fast
            || snapshot.total_iterations == 0
            || self.threshold_failed.load(Ordering::Relaxed)
        {
            return;
        }

        let breached: Vec<_> = evaluate_thresholds(&self.thresholds, snapshot)
            .into_iter()
            .filter(|r| !r.passed)
            .collect();
        if let Some(first) = breached.first() {
            tracing::warn!(
                "Threshold breached mid-run ({}, actual {:.4}), stopping",
                first.condition,
                first.actual
            );
            self.threshold_failed.store(true, Ordering::Relaxed);
            self.cancel_token.cancel();
        }
    }
}
