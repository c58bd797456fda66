use crate::engine::Stats;
use crate::types::StatsSnapshot;
use std::collections::HashMap;
use std::time::Duration;

pub fn create_snapshot(
    stats: &Stats,
    check_names: &[String],
    elapsed: Duration,
    workers_active: u32,
    workers_max: u32,
) -> StatsSnapshot {
    let check_stats: HashMap<_, _> = check_names
        .iter()
        .cloned()
        .zip(stats.checks.iter().copied())
        .collect();

    let (passed, total) = check_stats
        .values()
        .fold((0u64, 0u64), |(p, t), c| (p + c.passed, t + c.total));
    let overall_check_pass_rate = if total > 0 {
        Some(passed as f64 / total as f64)
    } else {
        None
    };

    let secs = elapsed.as_secs_f64();
    let iterations_per_sec = if secs > 0.0 {
        stats.total_iterations as f64 / secs
    } else {
        0.0
    };

    StatsSnapshot {
        elapsed,
        total_iterations: stats.total_iterations,
        successful: stats.successful,
        failed: stats.failed,

        iterations_per_sec,
        error_rate: stats.error_rate(),

        latency_min_us: stats.latency_min(),
        latency_max_us: stats.latency_max(),
        latency_mean_us: stats.latency_mean(),
        latency_stddev_us: stats.latency_stddev(),
        latency_p50_us: stats.latency_percentile(50.0),
        latency_p75_us: stats.latency_percentile(75.0),
        latency_p90_us: stats.latency_percentile(90.0),
        latency_p95_us: stats.latency_percentile(95.0),
        latency_p99_us: stats.latency_percentile(99.0),
        latency_p999_us: stats.latency_percentile(99.9),

        status_codes: stats.status_codes.clone(),
        errors: stats.errors.clone(),
        timeline: stats.timeline(),

        check_stats,
        overall_check_pass_rate,

        workers_active,
        workers_max,
    }
}
