use crate::engine::RunReport;
use crate::types::{CheckStats, Stage, ThresholdResult, TimelineBucket};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

#[derive(Serialize, Deserialize)]
pub struct JsonOutput {
    pub metadata: Metadata,
    pub summary: Summary,
    pub latency_us: Latency,
    pub status_codes: BTreeMap<String, u64>,
    pub errors: BTreeMap<String, u64>,
    pub checks: BTreeMap<String, CheckStats>,
    pub timeline: Vec<TimelineBucket>,
    pub thresholds: ThresholdsOutput,
}

#[derive(Serialize, Deserialize)]
pub struct ThresholdsOutput {
    pub passed: bool,
    pub results: Vec<ThresholdResult>,
}

#[derive(Serialize, Deserialize)]
pub struct Metadata {
    pub tool: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub hostname: String,
    pub target: Target,
    pub stages: Vec<Stage>,
}

#[derive(Serialize, Deserialize)]
pub struct Target {
    pub base_url: String,
    pub headers: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct Summary {
    pub total_iterations: u64,
    pub successful: u64,
    pub failed: u64,
    pub error_rate: f64,
    pub iterations_per_sec: f64,
    pub workers_spawned: u32,
    pub peak_workers: u32,
    pub check_pass_rate: Option<f64>,
    pub cancelled: bool,
    pub threshold_aborted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct Latency {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: u64,
    pub p75: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
}

/// Run-level details that live outside the engine.
#[derive(Debug, Clone)]
pub struct ReportTarget<'a> {
    pub base_url: &'a str,
    pub headers: &'a [(String, String)],
    pub stages: &'a [Stage],
}

fn redact_header(name: &str, value: &str) -> String {
    let lower = name.to_lowercase();
    if lower == "authorization"
        || lower == "cookie"
        || lower == "x-api-key"
        || lower.contains("token")
        || lower.contains("secret")
        || lower.contains("password")
    {
        format!("{}: <redacted>", name)
    } else {
        format!("{}: {}", name, value)
    }
}

pub fn create_output(report: &RunReport, target: &ReportTarget<'_>) -> JsonOutput {
    let snapshot = &report.verdict.summary;

    let status_codes = snapshot
        .status_codes
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();

    let errors = snapshot
        .errors
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), *v))
        .collect();

    let checks = snapshot
        .check_stats
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();

    JsonOutput {
        metadata: Metadata {
            tool: "stampede".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: report.started_at,
            ended_at: report.ended_at,
            duration_secs: snapshot.elapsed.as_secs_f64(),
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            target: Target {
                base_url: target.base_url.to_string(),
                headers: target
                    .headers
                    .iter()
                    .map(|(k, v)| redact_header(k, v))
                    .collect(),
            },
            stages: target.stages.to_vec(),
        },
        summary: Summary {
            total_iterations: snapshot.total_iterations,
            successful: snapshot.successful,
            failed: snapshot.failed,
            error_rate: snapshot.error_rate,
            iterations_per_sec: snapshot.iterations_per_sec,
            workers_spawned: report.workers_spawned,
            peak_workers: report.peak_workers,
            check_pass_rate: snapshot.overall_check_pass_rate,
            cancelled: report.cancelled,
            threshold_aborted: report.threshold_aborted,
            teardown_error: report.teardown_error.as_ref().map(|e| e.to_string()),
        },
        latency_us: Latency {
            min: snapshot.latency_min_us,
            max: snapshot.latency_max_us,
            mean: snapshot.latency_mean_us,
            stddev: snapshot.latency_stddev_us,
            p50: snapshot.latency_p50_us,
            p75: snapshot.latency_p75_us,
            p90: snapshot.latency_p90_us,
            p95: snapshot.latency_p95_us,
            p99: snapshot.latency_p99_us,
            p999: snapshot.latency_p999_us,
        },
        status_codes,
        errors,
        checks,
        timeline: snapshot.timeline.clone(),
        thresholds: ThresholdsOutput {
            passed: report.passed(),
            results: report.verdict.results.clone(),
        },
    }
}

pub fn write_json(report: &RunReport, target: &ReportTarget<'_>, path: &Path) -> io::Result<()> {
    let output = create_output(report, target);
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &output)?;
    Ok(())
}

pub fn print_json(report: &RunReport, target: &ReportTarget<'_>) -> io::Result<()> {
    let output = create_output(report, target);
    let stdout = io::stdout();
    let writer = BufWriter::new(stdout.lock());
    serde_json::to_writer_pretty(writer, &output)?;
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::render_verdict;
    use crate::types::{ErrorKind, StatsSnapshot, Threshold, ThresholdMetric, ThresholdOp};
    use std::collections::HashMap;
    use std::time::Duration;

    fn report() -> RunReport {
        let summary = StatsSnapshot {
            elapsed: Duration::from_millis(35_200),
            total_iterations: 2000,
            successful: 1990,
            failed: 10,
            error_rate: 0.005,
            latency_p95_us: 120_000,
            status_codes: HashMap::from([(201, 1990), (500, 10)]),
            errors: HashMap::from([(ErrorKind::Status, 10)]),
            check_stats: HashMap::from([(
                "status is 201".to_string(),
                CheckStats {
                    total: 2000,
                    passed: 1990,
                    failed: 10,
                },
            )]),
            overall_check_pass_rate: Some(0.995),
            ..StatsSnapshot::default()
        };
        let thresholds = vec![Threshold::new(ThresholdMetric::ErrorRate, ThresholdOp::Lt, 0.001)];
        RunReport {
            verdict: render_verdict(&thresholds, summary),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            workers_spawned: 10,
            peak_workers: 10,
            cancelled: false,
            threshold_aborted: false,
            teardown_error: None,
        }
    }

    #[test]
    fn test_output_shape() {
        let headers = vec![
            ("Authorization".to_string(), "Bearer abc".to_string()),
            ("X-Run".to_string(), "ci".to_string()),
        ];
        let stages = vec![Stage::new(Duration::from_secs(10), 10)];
        let target = ReportTarget {
            base_url: "http://localhost:8080",
            headers: &headers,
            stages: &stages,
        };

        let value = serde_json::to_value(create_output(&report(), &target)).unwrap();
        assert_eq!(value["metadata"]["tool"], "stampede");
        assert_eq!(value["metadata"]["target"]["base_url"], "http://localhost:8080");
        assert_eq!(value["metadata"]["target"]["headers"][0], "Authorization: <redacted>");
        assert_eq!(value["metadata"]["target"]["headers"][1], "X-Run: ci");
        assert_eq!(value["metadata"]["stages"][0]["target"], 10);
        assert_eq!(value["summary"]["total_iterations"], 2000);
        assert_eq!(value["status_codes"]["201"], 1990);
        assert_eq!(value["errors"]["status"], 10);
        assert_eq!(value["checks"]["status is 201"]["failed"], 10);
        assert_eq!(value["thresholds"]["passed"], false);
        assert_eq!(value["thresholds"]["results"][0]["metric"], "error_rate");
        assert!(value["summary"].get("teardown_error").is_none());
    }
}
