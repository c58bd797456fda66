use crate::engine::scenario::Scenario;
use crate::engine::worker::{WorkerSummary, WorkerTemplate};
use crate::types::Stage;
use futures_util::FutureExt;
use futures_util::future::join_all;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Desired worker level `elapsed` into the ramp profile.
///
/// Each stage interpolates linearly from the level the previous stage ended
/// at (or `start` for the first one) to its own target. Zero-length stages
/// jump straight to their target. Past the last stage the level stays at the
/// final target.
pub fn concurrency_at(stages: &[Stage], start: u32, elapsed: Duration) -> u32 {
    let mut from = start;
    let mut stage_start = Duration::ZERO;

    for stage in stages {
        let stage_end = stage_start + stage.duration;
        if elapsed < stage_end {
            let progress =
                (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
            let level = from as f64 + (stage.target as f64 - from as f64) * progress;
            return level.round().max(0.0) as u32;
        }
        from = stage.target;
        stage_start = stage_end;
    }

    from
}

/// Index of the stage active at `elapsed` and how far into it we are.
pub fn stage_position(stages: &[Stage], elapsed: Duration) -> (usize, Duration) {
    let mut stage_start = Duration::ZERO;
    for (idx, stage) in stages.iter().enumerate() {
        let stage_end = stage_start + stage.duration;
        if elapsed < stage_end {
            return (idx, elapsed - stage_start);
        }
        stage_start = stage_end;
    }
    match stages.last() {
        Some(last) => (stages.len() - 1, last.duration),
        None => (0, Duration::ZERO),
    }
}

/// Info about the current stage for progress display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageInfo {
    pub stage_index: usize,
    pub stage_count: usize,
    pub target: u32,
    /// Workers currently assigned (not signalled to retire).
    pub assigned: u32,
    /// Workers still executing, retiring ones included.
    pub running: u32,
    pub stage_elapsed: Duration,
    pub stage_duration: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub workers_spawned: u32,
    pub peak_workers: u32,
    pub iterations: u64,
    pub cancelled: bool,
}

struct ActiveWorker {
    retire: CancellationToken,
    handle: JoinHandle<WorkerSummary>,
}

/// Drives the worker population along the stage profile.
pub struct StagesScheduler<S: Scenario> {
    stages: Vec<Stage>,
    start_workers: u32,
    tick: Duration,
    template: WorkerTemplate<S>,
    cancel_token: CancellationToken,
    stage_info_tx: watch::Sender<StageInfo>,
    active: Vec<ActiveWorker>,
    retiring: Vec<JoinHandle<WorkerSummary>>,
    next_id: u32,
    iterations: u64,
}

impl<S: Scenario> StagesScheduler<S> {
    pub fn new(
        stages: Vec<Stage>,
        start_workers: u32,
        tick: Duration,
        template: WorkerTemplate<S>,
        cancel_token: CancellationToken,
        stage_info_tx: watch::Sender<StageInfo>,
    ) -> Self {
        Self {
            stages,
            start_workers,
            tick,
            template,
            cancel_token,
            stage_info_tx,
            active: Vec::new(),
            retiring: Vec::new(),
            next_id: 0,
            iterations: 0,
        }
    }

    /// Calculate total duration of all stages
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub async fn run(mut self) -> SchedulerSummary {
        let total = self.total_duration();
        let start = Instant::now();
        let mut next_tick = start;
        let mut current_stage = usize::MAX;

        tracing::info!(
            "Starting {} stage(s) over {:?} (tick {:?})",
            self.stages.len(),
            total,
            self.tick
        );

        loop {
            if self.cancel_token.is_cancelled() {
                tracing::info!("Cancellation requested, retiring all workers");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed >= total {
                break;
            }

            // Aim for the level due at the end of this tick so each stage
            // lands on its target exactly at its boundary.
            let desired =
                concurrency_at(&self.stages, self.start_workers, (elapsed + self.tick).min(total));
            self.scale_to(desired);
            self.reap_retired();

            let (stage_idx, stage_elapsed) = stage_position(&self.stages, elapsed);
            if stage_idx != current_stage {
                current_stage = stage_idx;
                tracing::info!(
                    "Stage {}/{}: {:?} -> {} workers",
                    stage_idx + 1,
                    self.stages.len(),
                    self.stages[stage_idx].duration,
                    self.stages[stage_idx].target
                );
            }
            self.publish(stage_idx, stage_elapsed);

            next_tick += self.tick;
            tokio::select! {
                _ = sleep_until(next_tick) => {}
                _ = self.cancel_token.cancelled() => {}
            }
        }

        let cancelled = self.cancel_token.is_cancelled();
        self.scale_to(0);
        let last = self.stages.len().saturating_sub(1);
        let last_duration = self.stages.last().map(|s| s.duration).unwrap_or_default();
        self.publish(last, last_duration);

        let summaries = join_all(self.retiring.drain(..)).await;
        for summary in summaries {
            self.collect(summary);
        }
        self.publish(last, last_duration);

        SchedulerSummary {
            workers_spawned: self.next_id,
            peak_workers: self.template.gauge.peak(),
            iterations: self.iterations,
            cancelled,
        }
    }

    /// Collects retired workers that have already stopped so the retiring
    /// list only holds workers still finishing an iteration.
    fn reap_retired(&mut self) {
        let retiring = std::mem::take(&mut self.retiring);
        for mut handle in retiring {
            if handle.is_finished() {
                if let Some(summary) = (&mut handle).now_or_never() {
                    self.collect(summary);
                    continue;
                }
            }
            self.retiring.push(handle);
        }
    }

    fn collect(&mut self, summary: Result<WorkerSummary, JoinError>) {
        match summary {
            Ok(s) => self.iterations += s.iterations,
            Err(e) => tracing::warn!("Worker task failed: {}", e),
        }
    }

    fn assigned(&self) -> u32 {
        self.active.len() as u32
    }

    /// Spawns or retires workers until `desired` are assigned. The most
    /// recently spawned workers are retired first.
    fn scale_to(&mut self, desired: u32) {
        let current = self.assigned();
        if desired > current {
            for _ in current..desired {
                let id = self.next_id;
                self.next_id += 1;
                let retire = self.cancel_token.child_token();
                let worker = self.template.spawn_worker(id, retire.clone());
                let handle = tokio::spawn(worker.run());
                self.active.push(ActiveWorker { retire, handle });
            }
        } else if desired < current {
            for _ in desired..current {
                if let Some(worker) = self.active.pop() {
                    worker.retire.cancel();
                    self.retiring.push(worker.handle);
                }
            }
        }
    }

    fn publish(&self, stage_index: usize, stage_elapsed: Duration) {
        let stage = self.stages.get(stage_index);
        let _ = self.stage_info_tx.send(StageInfo {
            stage_index,
            stage_count: self.stages.len(),
            target: stage.map(|s| s.target).unwrap_or(0),
            assigned: self.assigned(),
            running: self.template.gauge.running(),
            stage_elapsed,
            stage_duration: stage.map(|s| s.duration).unwrap_or_default(),
        });
    }
}
