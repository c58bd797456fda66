use crate::engine::checks::CheckOutcome;
use crate::engine::snapshot::create_snapshot;
use crate::engine::stats::{IterationSample, Stats};
use crate::error::EngineError;
use crate::types::StatsSnapshot;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Sharded metric sink. Each worker writes to the shard picked by its id, so
/// contention is bounded by workers-per-shard rather than total workers.
/// Reads merge every shard into a fresh [`Stats`].
pub struct Metrics {
    shards: Box<[Mutex<Stats>]>,
    empty: Stats,
    check_names: Vec<String>,
    start_time: Instant,
}

impl Metrics {
    pub fn new(shard_count: usize, check_names: Vec<String>) -> Result<Self, EngineError> {
        let histogram = Stats::empty_histogram().map_err(EngineError::Metrics)?;
        let shard_count = shard_count.max(1);
        let empty = Stats::new(histogram, check_names.len());
        let shards = (0..shard_count)
            .map(|_| Mutex::new(empty.clone()))
            .collect();

        Ok(Self {
            shards,
            empty,
            check_names,
            start_time: Instant::now(),
        })
    }

    /// Resets the clock used for rates and timeline buckets.
    pub fn restart_clock(&mut self) {
        self.start_time = Instant::now();
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_for(&self, worker_id: u32) -> usize {
        worker_id as usize % self.shards.len()
    }

    pub fn check_names(&self) -> &[String] {
        &self.check_names
    }

    /// Records one iteration and its check outcomes under a single shard lock.
    pub fn record(&self, shard: usize, sample: &IterationSample, checks: &[CheckOutcome]) {
        let mut stats = lock(&self.shards[shard % self.shards.len()]);
        stats.record(sample);
        stats.record_checks(checks);
    }

    /// Merged view of every shard.
    pub fn merged(&self) -> Stats {
        let mut merged = self.empty.clone();
        for shard in self.shards.iter() {
            merged.merge(&lock(shard));
        }
        merged
    }

    pub fn snapshot(&self, workers_active: u32, workers_max: u32) -> StatsSnapshot {
        create_snapshot(
            &self.merged(),
            &self.check_names,
            self.start_time.elapsed(),
            workers_active,
            workers_max,
        )
    }
}

// Poisoned shards stay readable.
fn lock(shard: &Mutex<Stats>) -> MutexGuard<'_, Stats> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}
