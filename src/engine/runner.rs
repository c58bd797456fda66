use crate::engine::checks::{Check, CheckSet};
use crate::engine::lifecycle::Lifecycle;
use crate::engine::metrics::Metrics;
use crate::engine::reporter::Reporter;
use crate::engine::scenario::Scenario;
use crate::engine::scheduler::{StageInfo, StagesScheduler};
use crate::engine::thresholds::{Verdict, render_verdict};
use crate::engine::worker::{WorkerGauge, WorkerTemplate};
use crate::error::{EngineError, TeardownError};
use crate::types::{RunConfig, RunState, StatsSnapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub verdict: Verdict,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub workers_spawned: u32,
    pub peak_workers: u32,
    pub cancelled: bool,
    /// Set when fail-fast stopped the run early.
    pub threshold_aborted: bool,
    pub teardown_error: Option<TeardownError>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.verdict.passed && !self.threshold_aborted
    }
}

pub struct Engine<S: Scenario> {
    config: RunConfig,
    scenario: Arc<S>,
    checks: Vec<Check<S::Output>>,
    cancel_token: CancellationToken,
    threshold_failed: Arc<AtomicBool>,
    state_tx: watch::Sender<RunState>,
    snapshot_tx: watch::Sender<StatsSnapshot>,
    snapshot_rx: watch::Receiver<StatsSnapshot>,
    stage_info_tx: watch::Sender<StageInfo>,
}

impl<S: Scenario> Engine<S> {
    pub fn new(config: RunConfig, scenario: S) -> Self {
        let (state_tx, _) = watch::channel(RunState::Initializing);
        let (snapshot_tx, snapshot_rx) = watch::channel(StatsSnapshot::default());
        let (stage_info_tx, _) = watch::channel(StageInfo::default());

        Self {
            config,
            scenario: Arc::new(scenario),
            checks: Vec::new(),
            cancel_token: CancellationToken::new(),
            threshold_failed: Arc::new(AtomicBool::new(false)),
            state_tx,
            snapshot_tx,
            snapshot_rx,
            stage_info_tx,
        }
    }

    pub fn with_check(mut self, check: Check<S::Output>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn with_checks(mut self, checks: impl IntoIterator<Item = Check<S::Output>>) -> Self {
        self.checks.extend(checks);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn snapshot_rx(&self) -> watch::Receiver<StatsSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn state_rx(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    pub fn stage_info_rx(&self) -> watch::Receiver<StageInfo> {
        self.stage_info_tx.subscribe()
    }

    /// Setup, staged load, verdict, teardown. Only a setup (or invalid
    /// configuration) error is returned; everything after setup yields a
    /// report.
    pub async fn run(self) -> Result<RunReport, EngineError> {
        if let Err(e) = self.config.validate() {
            self.state_tx.send_replace(RunState::Error);
            return Err(e.into());
        }

        let checks = CheckSet::new(self.checks);
        let mut metrics = Metrics::new(self.config.shard_count(), checks.names())?;

        self.state_tx.send_replace(RunState::SettingUp);
        let lifecycle = Lifecycle::new(self.scenario.clone());
        let context = match lifecycle.setup().await {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::error!("{}", e);
                self.state_tx.send_replace(RunState::Error);
                return Err(e.into());
            }
        };

        let started_at = Utc::now();
        metrics.restart_clock();
        let metrics = Arc::new(metrics);
        let gauge = WorkerGauge::new();

        let done = CancellationToken::new();
        let reporter = Reporter::new(
            metrics.clone(),
            gauge.clone(),
            self.snapshot_tx.clone(),
            self.config.thresholds.clone(),
            self.config.fail_fast,
            self.threshold_failed.clone(),
            self.cancel_token.clone(),
            done.clone(),
        );
        let reporter_handle = tokio::spawn(reporter.run());

        let template = WorkerTemplate {
            scenario: self.scenario.clone(),
            context: context.clone(),
            checks,
            metrics: metrics.clone(),
            gauge: gauge.clone(),
            think_time: self.config.think_time,
        };
        let scheduler = StagesScheduler::new(
            self.config.stages.clone(),
            self.config.start_workers,
            self.config.tick,
            template,
            self.cancel_token.clone(),
            self.stage_info_tx.clone(),
        );

        self.state_tx.send_replace(RunState::Running);
        let summary = scheduler.run().await;
        self.state_tx.send_replace(RunState::Stopping);

        done.cancel();
        if let Err(e) = reporter_handle.await {
            tracing::warn!("Reporter task failed: {}", e);
        }

        // The verdict is fixed before teardown runs.
        let final_snapshot = metrics.snapshot(gauge.running(), summary.peak_workers);
        let _ = self.snapshot_tx.send(final_snapshot.clone());
        let verdict = render_verdict(&self.config.thresholds, final_snapshot);
        let ended_at = Utc::now();

        tracing::info!(
            "Load phase finished: {} iterations from {} workers (peak {}), verdict {}",
            summary.iterations,
            summary.workers_spawned,
            summary.peak_workers,
            if verdict.passed { "passed" } else { "failed" }
        );

        self.state_tx.send_replace(RunState::TearingDown);
        let teardown_error = lifecycle.teardown(context.as_ref()).await;

        let final_state = if summary.cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        };
        self.state_tx.send_replace(final_state);

        Ok(RunReport {
            verdict,
            started_at,
            ended_at,
            workers_spawned: summary.workers_spawned,
            peak_workers: summary.peak_workers,
            cancelled: summary.cancelled,
            threshold_aborted: self.threshold_failed.load(Ordering::Relaxed),
            teardown_error,
        })
    }
}
