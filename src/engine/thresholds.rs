use crate::types::{StatsSnapshot, Threshold, ThresholdMetric, ThresholdResult};

/// Final outcome of a run. `passed` is the AND of every threshold result.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub passed: bool,
    pub results: Vec<ThresholdResult>,
    pub summary: StatsSnapshot,
}

impl Verdict {
    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

pub fn render_verdict(thresholds: &[Threshold], summary: StatsSnapshot) -> Verdict {
    let results = evaluate_thresholds(thresholds, &summary);
    let passed = results.iter().all(|r| r.passed);
    Verdict {
        passed,
        results,
        summary,
    }
}

pub fn evaluate_thresholds(
    thresholds: &[Threshold],
    snapshot: &StatsSnapshot,
) -> Vec<ThresholdResult> {
    thresholds
        .iter()
        .map(|t| evaluate_threshold(t, snapshot))
        .collect()
}

fn evaluate_threshold(threshold: &Threshold, snapshot: &StatsSnapshot) -> ThresholdResult {
    let actual = metric_value(&threshold.metric, snapshot);
    let passed = threshold.operator.evaluate(actual, threshold.value);

    ThresholdResult {
        metric: threshold.metric.as_str().to_string(),
        condition: threshold.condition(),
        actual,
        passed,
    }
}

pub fn metric_value(metric: &ThresholdMetric, snapshot: &StatsSnapshot) -> f64 {
    match metric {
        ThresholdMetric::P50LatencyMs => snapshot.latency_p50_us as f64 / 1000.0,
        ThresholdMetric::P75LatencyMs => snapshot.latency_p75_us as f64 / 1000.0,
        ThresholdMetric::P90LatencyMs => snapshot.latency_p90_us as f64 / 1000.0,
        ThresholdMetric::P95LatencyMs => snapshot.latency_p95_us as f64 / 1000.0,
        ThresholdMetric::P99LatencyMs => snapshot.latency_p99_us as f64 / 1000.0,
        ThresholdMetric::P999LatencyMs => snapshot.latency_p999_us as f64 / 1000.0,
        ThresholdMetric::MeanLatencyMs => snapshot.latency_mean_us / 1000.0,
        ThresholdMetric::MaxLatencyMs => snapshot.latency_max_us as f64 / 1000.0,
        ThresholdMetric::ErrorRate => snapshot.error_rate,
        ThresholdMetric::Rps => snapshot.iterations_per_sec,
        ThresholdMetric::CheckPassRate => snapshot.overall_check_pass_rate.unwrap_or(1.0),
    }
}
