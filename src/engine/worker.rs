use crate::engine::checks::CheckSet;
use crate::engine::executor::execute_iteration;
use crate::engine::metrics::Metrics;
use crate::engine::scenario::Scenario;
use crate::engine::stats::IterationSample;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Retiring,
    Stopped,
}

/// Live worker population, shared between the scheduler and its workers.
#[derive(Debug, Default)]
pub struct WorkerGauge {
    running: AtomicU32,
    peak: AtomicU32,
}

impl WorkerGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Workers that have been spawned and not yet stopped, retiring included.
    pub fn running(&self) -> u32 {
        self.running.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> u32 {
        self.peak.load(Ordering::Acquire)
    }

    fn started(&self) {
        let now = self.running.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
    }

    fn stopped(&self) {
        self.running.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Everything a worker borrows from the run. Cloned per spawn.
pub struct WorkerTemplate<S: Scenario> {
    pub scenario: Arc<S>,
    pub context: Arc<S::Context>,
    pub checks: CheckSet<S::Output>,
    pub metrics: Arc<Metrics>,
    pub gauge: Arc<WorkerGauge>,
    pub think_time: Option<Duration>,
}

impl<S: Scenario> Clone for WorkerTemplate<S> {
    fn clone(&self) -> Self {
        Self {
            scenario: self.scenario.clone(),
            context: self.context.clone(),
            checks: self.checks.clone(),
            metrics: self.metrics.clone(),
            gauge: self.gauge.clone(),
            think_time: self.think_time,
        }
    }
}

impl<S: Scenario> WorkerTemplate<S> {
    /// Builds a worker and counts it as running right away, so the gauge
    /// never lags behind the scheduler's own bookkeeping.
    pub fn spawn_worker(&self, id: u32, retire: CancellationToken) -> Worker<S> {
        self.gauge.started();
        Worker {
            id,
            shard: self.metrics.shard_for(id),
            template: self.clone(),
            retire,
            state: WorkerState::Running,
            iterations: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    pub id: u32,
    pub iterations: u64,
}

pub struct Worker<S: Scenario> {
    id: u32,
    shard: usize,
    template: WorkerTemplate<S>,
    retire: CancellationToken,
    state: WorkerState,
    iterations: u64,
}

impl<S: Scenario> Worker<S> {
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Loops until retired. The retire signal is only observed between
    /// iterations and during the pacing pause, never mid-iteration.
    pub async fn run(mut self) -> WorkerSummary {
        tracing::debug!("Worker {} started", self.id);

        while self.state == WorkerState::Running {
            if self.retire.is_cancelled() {
                self.state = WorkerState::Retiring;
                break;
            }

            self.run_iteration().await;

            match self.template.think_time {
                Some(pause) if !pause.is_zero() => {
                    tokio::select! {
                        _ = sleep(pause) => {}
                        _ = self.retire.cancelled() => self.state = WorkerState::Retiring,
                    }
                }
                _ => tokio::task::yield_now().await,
            }
        }

        self.state = WorkerState::Stopped;
        self.template.gauge.stopped();
        tracing::debug!(
            "Worker {} stopped after {} iterations",
            self.id,
            self.iterations
        );

        WorkerSummary {
            id: self.id,
            iterations: self.iterations,
        }
    }

    async fn run_iteration(&mut self) {
        let template = &self.template;
        let result = execute_iteration(
            template.scenario.as_ref(),
            template.context.as_ref(),
            self.id,
            self.iterations,
        )
        .await;

        let checks = template.checks.evaluate(&result);
        let sample = IterationSample::from_result(&result, template.metrics.start_time());
        template.metrics.record(self.shard, &sample, &checks);
        self.iterations += 1;
    }
}
