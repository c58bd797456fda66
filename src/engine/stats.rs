use crate::engine::checks::CheckOutcome;
use crate::engine::scenario::{IterationResult, Outcome};
use crate::types::{CheckStats, ErrorKind, TimelineBucket};
use hdrhistogram::Histogram;
use std::collections::{BTreeMap, HashMap};
use tokio::time::Instant;

pub const LATENCY_LOW_US: u64 = 1;
pub const LATENCY_HIGH_US: u64 = 60_000_000;
pub const LATENCY_SIGFIG: u8 = 3;

/// What the aggregator keeps from an iteration once checks have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationSample {
    pub elapsed_secs: u32,
    pub latency_us: u64,
    pub success: bool,
    pub status: Option<u16>,
    pub error: Option<ErrorKind>,
}

impl IterationSample {
    pub fn from_result<O: Outcome>(result: &IterationResult<O>, run_start: Instant) -> Self {
        Self {
            elapsed_secs: result
                .started_at
                .saturating_duration_since(run_start)
                .as_secs() as u32,
            latency_us: result.elapsed.as_micros() as u64,
            success: result.is_success(),
            status: result.status(),
            error: result.error_kind(),
        }
    }
}

/// Counters and the latency distribution for one shard (or a merge of all).
#[derive(Debug, Clone)]
pub struct Stats {
    histogram: Histogram<u64>,
    pub total_iterations: u64,
    pub successful: u64,
    pub failed: u64,
    pub status_codes: HashMap<u16, u64>,
    pub errors: HashMap<ErrorKind, u64>,
    pub checks: Vec<CheckStats>,
    timeline: BTreeMap<u32, TimelineBucket>,
}

impl Stats {
    pub fn new(histogram: Histogram<u64>, check_count: usize) -> Self {
        Self {
            histogram,
            total_iterations: 0,
            successful: 0,
            failed: 0,
            status_codes: HashMap::new(),
            errors: HashMap::new(),
            checks: vec![CheckStats::default(); check_count],
            timeline: BTreeMap::new(),
        }
    }

    pub fn empty_histogram() -> Result<Histogram<u64>, String> {
        Histogram::<u64>::new_with_bounds(LATENCY_LOW_US, LATENCY_HIGH_US, LATENCY_SIGFIG)
            .map_err(|e| e.to_string())
    }

    pub fn record(&mut self, sample: &IterationSample) {
        self.total_iterations += 1;
        self.histogram
            .saturating_record(sample.latency_us.clamp(LATENCY_LOW_US, LATENCY_HIGH_US));

        if sample.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }

        if let Some(status) = sample.status {
            *self.status_codes.entry(status).or_insert(0) += 1;
        }

        if let Some(kind) = sample.error {
            *self.errors.entry(kind).or_insert(0) += 1;
        }

        let bucket = self
            .timeline
            .entry(sample.elapsed_secs)
            .or_insert_with(|| TimelineBucket {
                elapsed_secs: sample.elapsed_secs,
                iterations: 0,
                failures: 0,
            });
        bucket.iterations += 1;
        if !sample.success {
            bucket.failures += 1;
        }
    }

    pub fn record_checks(&mut self, outcomes: &[CheckOutcome]) {
        for outcome in outcomes {
            if let Some(stats) = self.checks.get_mut(outcome.index) {
                stats.record(outcome.passed);
            }
        }
    }

    /// Folds another shard into this one. Order of merges does not matter.
    pub fn merge(&mut self, other: &Stats) {
        // Both sides share bounds, so adding cannot fail.
        let _ = self.histogram.add(&other.histogram);
        self.total_iterations += other.total_iterations;
        self.successful += other.successful;
        self.failed += other.failed;

        for (code, count) in &other.status_codes {
            *self.status_codes.entry(*code).or_insert(0) += count;
        }
        for (kind, count) in &other.errors {
            *self.errors.entry(*kind).or_insert(0) += count;
        }

        if self.checks.len() < other.checks.len() {
            self.checks.resize(other.checks.len(), CheckStats::default());
        }
        for (mine, theirs) in self.checks.iter_mut().zip(&other.checks) {
            mine.merge(theirs);
        }

        for (secs, bucket) in &other.timeline {
            let mine = self
                .timeline
                .entry(*secs)
                .or_insert_with(|| TimelineBucket {
                    elapsed_secs: *secs,
                    iterations: 0,
                    failures: 0,
                });
            mine.iterations += bucket.iterations;
            mine.failures += bucket.failures;
        }
    }

    pub fn timeline(&self) -> Vec<TimelineBucket> {
        self.timeline.values().cloned().collect()
    }

    pub fn error_rate(&self) -> f64 {
        if self.total_iterations > 0 {
            self.failed as f64 / self.total_iterations as f64
        } else {
            0.0
        }
    }

    pub fn latency_min(&self) -> u64 {
        self.histogram.min()
    }

    pub fn latency_max(&self) -> u64 {
        self.histogram.max()
    }

    pub fn latency_mean(&self) -> f64 {
        self.histogram.mean()
    }

    pub fn latency_stddev(&self) -> f64 {
        self.histogram.stdev()
    }

    pub fn latency_percentile(&self, p: f64) -> u64 {
        self.histogram.value_at_percentile(p)
    }
}
