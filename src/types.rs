use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

// ============================================================================
// Stages
// ============================================================================

/// One segment of the ramp profile: over `duration`, the worker population
/// moves linearly from wherever the previous stage left it to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: u32,
}

impl Stage {
    pub fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

// ============================================================================
// Thresholds
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: ThresholdMetric,
    pub operator: ThresholdOp,
    pub value: f64,
}

impl Threshold {
    pub fn new(metric: ThresholdMetric, operator: ThresholdOp, value: f64) -> Self {
        Self {
            metric,
            operator,
            value,
        }
    }

    /// Parses `"p95_latency_ms < 300"` (whitespace optional).
    pub fn parse(expr: &str) -> Result<Self, String> {
        let expr = expr.trim();
        let op_start = expr
            .find(['<', '>', '='])
            .ok_or_else(|| format!("Threshold '{}' has no comparison operator", expr))?;
        let metric = ThresholdMetric::parse(expr[..op_start].trim())?;
        let (operator, value) = ThresholdOp::parse_condition(&expr[op_start..])?;
        Ok(Self::new(metric, operator, value))
    }

    pub fn condition(&self) -> String {
        format!(
            "{} {} {}",
            self.metric.as_str(),
            self.operator.as_str(),
            self.value
        )
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.condition())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThresholdMetric {
    P50LatencyMs,
    P75LatencyMs,
    P90LatencyMs,
    P95LatencyMs,
    P99LatencyMs,
    P999LatencyMs,
    MeanLatencyMs,
    MaxLatencyMs,
    ErrorRate,
    Rps,
    CheckPassRate,
}

impl ThresholdMetric {
    pub const ALL: [ThresholdMetric; 11] = [
        ThresholdMetric::P50LatencyMs,
        ThresholdMetric::P75LatencyMs,
        ThresholdMetric::P90LatencyMs,
        ThresholdMetric::P95LatencyMs,
        ThresholdMetric::P99LatencyMs,
        ThresholdMetric::P999LatencyMs,
        ThresholdMetric::MeanLatencyMs,
        ThresholdMetric::MaxLatencyMs,
        ThresholdMetric::ErrorRate,
        ThresholdMetric::Rps,
        ThresholdMetric::CheckPassRate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdMetric::P50LatencyMs => "p50_latency_ms",
            ThresholdMetric::P75LatencyMs => "p75_latency_ms",
            ThresholdMetric::P90LatencyMs => "p90_latency_ms",
            ThresholdMetric::P95LatencyMs => "p95_latency_ms",
            ThresholdMetric::P99LatencyMs => "p99_latency_ms",
            ThresholdMetric::P999LatencyMs => "p999_latency_ms",
            ThresholdMetric::MeanLatencyMs => "mean_latency_ms",
            ThresholdMetric::MaxLatencyMs => "max_latency_ms",
            ThresholdMetric::ErrorRate => "error_rate",
            ThresholdMetric::Rps => "rps",
            ThresholdMetric::CheckPassRate => "check_pass_rate",
        }
    }

    pub fn parse(name: &str) -> Result<Self, String> {
        if name == "failure_rate" {
            return Ok(ThresholdMetric::ErrorRate);
        }
        Self::ALL
            .iter()
            .find(|m| m.as_str() == name)
            .copied()
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                format!(
                    "Unknown threshold metric '{}'. Valid metrics: {}",
                    name,
                    valid.join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl ThresholdOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdOp::Lt => "<",
            ThresholdOp::Lte => "<=",
            ThresholdOp::Gt => ">",
            ThresholdOp::Gte => ">=",
            ThresholdOp::Eq => "==",
        }
    }

    pub fn evaluate(&self, actual: f64, expected: f64) -> bool {
        match self {
            ThresholdOp::Lt => actual < expected,
            ThresholdOp::Lte => actual <= expected,
            ThresholdOp::Gt => actual > expected,
            ThresholdOp::Gte => actual >= expected,
            ThresholdOp::Eq => (actual - expected).abs() < f64::EPSILON,
        }
    }

    /// Parses a condition such as `"< 300"` or `">=0.95"`.
    pub fn parse_condition(condition: &str) -> Result<(Self, f64), String> {
        let condition = condition.trim();
        // Two-character operators must be tried first.
        let (op, rest) = if let Some(rest) = condition.strip_prefix("<=") {
            (ThresholdOp::Lte, rest)
        } else if let Some(rest) = condition.strip_prefix(">=") {
            (ThresholdOp::Gte, rest)
        } else if let Some(rest) = condition.strip_prefix("==") {
            (ThresholdOp::Eq, rest)
        } else if let Some(rest) = condition.strip_prefix('<') {
            (ThresholdOp::Lt, rest)
        } else if let Some(rest) = condition.strip_prefix('>') {
            (ThresholdOp::Gt, rest)
        } else {
            return Err(format!(
                "Invalid threshold condition '{}'. Expected one of <, <=, >, >=, == followed by a number",
                condition
            ));
        };

        let value: f64 = rest
            .trim()
            .parse()
            .map_err(|_| format!("Invalid threshold value in '{}'", condition))?;

        Ok((op, value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub condition: String,
    pub actual: f64,
    pub passed: bool,
}

// ============================================================================
// Checks
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStats {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
}

impl CheckStats {
    pub fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn merge(&mut self, other: &CheckStats) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total > 0 {
            self.passed as f64 / self.total as f64
        } else {
            1.0
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Dns,
    Connect,
    Tls,
    Refused,
    Reset,
    Http,
    Body,
    Status,
    Panic,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Dns => "dns",
            ErrorKind::Connect => "connect",
            ErrorKind::Tls => "tls",
            ErrorKind::Refused => "refused",
            ErrorKind::Reset => "reset",
            ErrorKind::Http => "http",
            ErrorKind::Body => "body",
            ErrorKind::Status => "status",
            ErrorKind::Panic => "panic",
            ErrorKind::Other => "other",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "try increasing --timeout",
            ErrorKind::Dns => "check the hostname",
            ErrorKind::Connect => "check network and firewall",
            ErrorKind::Tls => "check the server certificate",
            ErrorKind::Refused => "is the server running?",
            ErrorKind::Reset => "server closed the connection",
            ErrorKind::Http => "check request parameters",
            ErrorKind::Body => "response body error",
            ErrorKind::Status => "server answered with a non-2xx status",
            ErrorKind::Panic => "the workload panicked",
            ErrorKind::Other => "",
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Point-in-time view of everything the aggregator has seen. Immutable once
/// built; used for live progress, threshold evaluation and reports.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub elapsed: Duration,
    pub total_iterations: u64,
    pub successful: u64,
    pub failed: u64,

    pub iterations_per_sec: f64,
    pub error_rate: f64,

    pub latency_min_us: u64,
    pub latency_max_us: u64,
    pub latency_mean_us: f64,
    pub latency_stddev_us: f64,
    pub latency_p50_us: u64,
    pub latency_p75_us: u64,
    pub latency_p90_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
    pub latency_p999_us: u64,

    pub status_codes: HashMap<u16, u64>,
    pub errors: HashMap<ErrorKind, u64>,

    pub timeline: Vec<TimelineBucket>,

    pub check_stats: HashMap<String, CheckStats>,
    pub overall_check_pass_rate: Option<f64>,

    pub workers_active: u32,
    pub workers_max: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineBucket {
    pub elapsed_secs: u32,
    pub iterations: u64,
    pub failures: u64,
}

// ============================================================================
// Run configuration
// ============================================================================

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Everything the engine needs to drive a run. Built once, validated once,
/// then only ever borrowed.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub stages: Vec<Stage>,
    pub thresholds: Vec<Threshold>,
    /// Worker level before the first stage starts ramping.
    pub start_workers: u32,
    /// Scheduler resolution: how often the desired level is recomputed.
    pub tick: Duration,
    /// Pause between iterations of the same worker.
    pub think_time: Option<Duration>,
    /// Abort the run as soon as a threshold is breached mid-run.
    pub fail_fast: bool,
    /// Metric shards; 0 picks a count from the peak stage target.
    pub shards: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            thresholds: Vec::new(),
            start_workers: 0,
            tick: DEFAULT_TICK,
            think_time: None,
            fail_fast: false,
            shards: 0,
        }
    }
}

impl RunConfig {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            stages,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.thresholds.push(threshold);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_think_time(mut self, think_time: Duration) -> Self {
        self.think_time = Some(think_time);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stages.is_empty() {
            return Err(ConfigError::NoStages);
        }
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        for t in &self.thresholds {
            if !t.value.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "threshold '{}' has a non-finite limit",
                    t.condition()
                )));
            }
        }
        Ok(())
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    pub fn max_target(&self) -> u32 {
        self.stages
            .iter()
            .map(|s| s.target)
            .max()
            .unwrap_or(0)
            .max(self.start_workers)
    }

    pub fn shard_count(&self) -> usize {
        if self.shards > 0 {
            self.shards
        } else {
            // About eight workers per shard.
            (self.max_target() as usize / 8).clamp(4, 64)
        }
    }
}

// ============================================================================
// Run state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    SettingUp,
    Running,
    Stopping,
    TearingDown,
    Completed,
    Cancelled,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_threshold_expression() {
        let t = Threshold::parse("p95_latency_ms < 300").unwrap();
        assert_eq!(t.metric, ThresholdMetric::P95LatencyMs);
        assert_eq!(t.operator, ThresholdOp::Lt);
        assert_eq!(t.value, 300.0);

        let t = Threshold::parse("failure_rate<=0.001").unwrap();
        assert_eq!(t.metric, ThresholdMetric::ErrorRate);
        assert_eq!(t.operator, ThresholdOp::Lte);
    }

    #[test]
    fn test_parse_condition_operators() {
        assert_eq!(
            ThresholdOp::parse_condition(">= 0.95").unwrap(),
            (ThresholdOp::Gte, 0.95)
        );
        assert_eq!(
            ThresholdOp::parse_condition("== 1").unwrap(),
            (ThresholdOp::Eq, 1.0)
        );
        assert!(ThresholdOp::parse_condition("~ 3").is_err());
        assert!(ThresholdOp::parse_condition("< abc").is_err());
    }

    #[test]
    fn test_unknown_metric_lists_valid_names() {
        let err = Threshold::parse("p42 < 1").unwrap_err();
        assert!(err.contains("p95_latency_ms"));
        assert!(err.contains("check_pass_rate"));
    }

    #[test]
    fn test_run_config_validation() {
        assert!(matches!(
            RunConfig::default().validate(),
            Err(ConfigError::NoStages)
        ));

        let config = RunConfig::new(vec![Stage::new(Duration::from_secs(1), 5)])
            .with_tick(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTick)));

        let config = RunConfig::new(vec![
            Stage::new(Duration::from_secs(10), 10),
            Stage::new(Duration::from_secs(5), 0),
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.total_duration(), Duration::from_secs(15));
        assert_eq!(config.max_target(), 10);
        assert_eq!(config.shard_count(), 4);
    }

    #[test]
    fn test_check_stats_pass_rate() {
        let mut stats = CheckStats::default();
        assert_eq!(stats.pass_rate(), 1.0);
        stats.record(true);
        stats.record(false);
        assert_eq!(stats.pass_rate(), 0.5);
    }
}
