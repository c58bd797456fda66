mod checks;
mod executor;
mod lifecycle;
mod metrics;
mod reporter;
mod runner;
mod scenario;
mod scheduler;
mod snapshot;
mod stats;
mod thresholds;
mod worker;

pub use checks::{Check, CheckOutcome, CheckSet};
pub use executor::execute_iteration;
pub use lifecycle::Lifecycle;
pub use metrics::Metrics;
pub use runner::{Engine, RunReport};
pub use scenario::{IterationResult, Outcome, Scenario};
pub use scheduler::{SchedulerSummary, StageInfo, StagesScheduler, concurrency_at, stage_position};
pub use snapshot::create_snapshot;
pub use stats::{IterationSample, Stats};
pub use thresholds::{Verdict, evaluate_thresholds, metric_value, render_verdict};
pub use worker::{WorkerGauge, WorkerState, WorkerSummary, WorkerTemplate};
