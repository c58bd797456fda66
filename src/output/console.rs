use crate::engine::RunReport;
use crate::types::{CheckStats, StatsSnapshot, ThresholdResult};
use std::collections::HashMap;

pub fn print_report(report: &RunReport) {
    print_summary(&report.verdict.summary, report);
    print_check_results(&report.verdict.summary.check_stats);
    print_threshold_results(&report.verdict.results, report.threshold_aborted);
}

pub fn print_summary(snapshot: &StatsSnapshot, report: &RunReport) {
    println!("\n{}", "=".repeat(50));
    println!("{:^50}", "Load Test Results");
    println!("{}", "=".repeat(50));

    println!("\nThroughput:");
    println!("  Iterations:      {:>12}", snapshot.total_iterations);
    println!("  Successful:      {:>12}", snapshot.successful);
    println!("  Failed:          {:>12}", snapshot.failed);
    println!("  Iterations/sec:  {:>12.2}", snapshot.iterations_per_sec);
    println!("  Error Rate:      {:>11.2}%", snapshot.error_rate * 100.0);
    println!("  Duration:        {:>11.1}s", snapshot.elapsed.as_secs_f64());
    println!(
        "  Workers:         {:>12}",
        format!("{} peak / {} spawned", report.peak_workers, report.workers_spawned)
    );

    println!("\nLatency (ms):");
    let rows = [
        ("Min", snapshot.latency_min_us as f64),
        ("Max", snapshot.latency_max_us as f64),
        ("Mean", snapshot.latency_mean_us),
        ("p50", snapshot.latency_p50_us as f64),
        ("p90", snapshot.latency_p90_us as f64),
        ("p95", snapshot.latency_p95_us as f64),
        ("p99", snapshot.latency_p99_us as f64),
        ("p99.9", snapshot.latency_p999_us as f64),
    ];
    for (label, us) in rows {
        println!("  {:<16} {:>12.2}", format!("{}:", label), us / 1000.0);
    }

    if !snapshot.status_codes.is_empty() {
        println!("\nStatus Codes:");
        let mut codes: Vec<_> = snapshot.status_codes.iter().collect();
        codes.sort_by_key(|(code, _)| **code);
        for (code, count) in codes {
            println!("  {}:              {:>12}", code, count);
        }
    }

    if !snapshot.errors.is_empty() {
        println!("\nErrors:");
        let mut errors: Vec<_> = snapshot.errors.iter().collect();
        errors.sort_by_key(|(kind, _)| **kind);
        for (kind, count) in errors {
            let suggestion = kind.suggestion();
            if suggestion.is_empty() {
                println!("  {:15} {:>12}", format!("{}:", kind.as_str()), count);
            } else {
                println!(
                    "  {:15} {:>12}  ({})",
                    format!("{}:", kind.as_str()),
                    count,
                    suggestion
                );
            }
        }
    }

    if report.cancelled {
        println!("\nRun was cancelled before the last stage finished.");
    }
    if let Some(e) = &report.teardown_error {
        println!("\nWarning: {}", e);
    }

    println!("\n{}", "=".repeat(50));
}

pub fn print_check_results(check_stats: &HashMap<String, CheckStats>) {
    if check_stats.is_empty() {
        return;
    }

    println!("\n{}", "=".repeat(60));
    println!("CHECKS");
    println!("{}", "=".repeat(60));

    let mut checks: Vec<_> = check_stats.iter().collect();
    checks.sort_by_key(|(name, _)| name.as_str());

    for (name, stats) in checks {
        let rate = stats.pass_rate() * 100.0;
        let status = if rate >= 100.0 {
            "\x1b[32m✓\x1b[0m"
        } else if rate >= 90.0 {
            "\x1b[33m⚠\x1b[0m"
        } else {
            "\x1b[31m✗\x1b[0m"
        };
        println!(
            "  {} {} - {}/{} ({:.1}%)",
            status, name, stats.passed, stats.total, rate
        );
    }
}

pub fn print_threshold_results(results: &[ThresholdResult], aborted: bool) {
    if results.is_empty() {
        return;
    }

    println!("\n{}", "=".repeat(60));
    println!("THRESHOLDS");
    println!("{}", "=".repeat(60));

    for result in results {
        let status = if result.passed {
            "\x1b[32m✓ PASS\x1b[0m"
        } else {
            "\x1b[31m✗ FAIL\x1b[0m"
        };

        let actual_str = format_metric_value(&result.metric, result.actual);
        println!("  {} {} (actual: {})", status, result.condition, actual_str);
    }

    println!();
    if aborted {
        println!("\x1b[31mRun stopped early by --fail-fast. Exiting with code 4.\x1b[0m");
    } else if results.iter().any(|r| !r.passed) {
        println!("\x1b[31mThresholds failed! Exiting with code 4.\x1b[0m");
    } else {
        println!("\x1b[32mAll thresholds passed.\x1b[0m");
    }
}

fn format_metric_value(metric: &str, value: f64) -> String {
    if metric.contains("latency") {
        format!("{:.2}ms", value)
    } else if metric == "error_rate" || metric == "check_pass_rate" {
        format!("{:.4}", value)
    } else {
        format!("{:.2}", value)
    }
}
