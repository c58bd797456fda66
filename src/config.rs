use crate::cli::RunArgs;
use serde::Deserialize;
use stampede::http::ClientSettings;
use stampede::types::{RunConfig, Stage, Threshold, ThresholdMetric, ThresholdOp};
use stampede::workload::TeamSettings;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_THINK_TIME: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub load: LoadSettings,
    #[serde(default)]
    pub stages: Vec<Stage>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdSpec>,
    #[serde(default)]
    pub team: TeamConfig,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub base_url: Option<String>,
    #[serde(default, with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub connect_timeout: Option<Duration>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct LoadSettings {
    #[serde(default, with = "humantime_serde::option")]
    pub think_time: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub tick: Option<Duration>,
    pub start_workers: Option<u32>,
    #[serde(default)]
    pub fail_fast: bool,
    pub shards: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TeamConfig {
    pub name_prefix: Option<String>,
    pub members: Option<u32>,
}

/// One condition (`"< 300"`) or several (`["< 300", "> 1"]`) for a metric.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ThresholdSpec {
    One(String),
    Many(Vec<String>),
}

impl ThresholdSpec {
    fn conditions(&self) -> &[String] {
        match self {
            ThresholdSpec::One(c) => std::slice::from_ref(c),
            ThresholdSpec::Many(cs) => cs,
        }
    }
}

/// Everything a run needs, after file values and CLI overrides are merged.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub run: RunConfig,
    pub client: ClientSettings,
    pub team: TeamSettings,
}

pub fn load_config(path: &Path) -> Result<TomlConfig, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;

    let content = interpolate_env_vars(&content)?;

    toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
}

fn interpolate_env_vars(content: &str) -> Result<String, String> {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| format!("Invalid interpolation pattern: {}", e))?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let (Some(full_match), Some(var_expr)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        let (full_match, var_expr) = (full_match.as_str(), var_expr.as_str());

        let (var_name, default) = match var_expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (var_expr, None),
        };

        let value = match (std::env::var(var_name), default) {
            (Ok(v), _) => v,
            (Err(_), Some(d)) => d.to_string(),
            (Err(_), None) => {
                return Err(format!("Environment variable '{}' not set", var_name));
            }
        };

        result = result.replace(full_match, &value);
    }

    Ok(result)
}

fn parse_thresholds(specs: &BTreeMap<String, ThresholdSpec>) -> Result<Vec<Threshold>, String> {
    let mut thresholds = Vec::new();
    for (name, spec) in specs {
        let metric = ThresholdMetric::parse(name)?;
        for condition in spec.conditions() {
            let (operator, value) = ThresholdOp::parse_condition(condition)
                .map_err(|e| format!("Threshold '{}': {}", name, e))?;
            thresholds.push(Threshold::new(metric, operator, value));
        }
    }
    Ok(thresholds)
}

pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(Duration::from_secs(10), 10),
        Stage::new(Duration::from_secs(20), 10),
        Stage::new(Duration::from_secs(5), 0),
    ]
}

pub fn default_thresholds() -> Vec<Threshold> {
    vec![
        Threshold::new(ThresholdMetric::P95LatencyMs, ThresholdOp::Lt, 300.0),
        Threshold::new(ThresholdMetric::ErrorRate, ThresholdOp::Lt, 0.001),
    ]
}

pub fn merge_config(args: &RunArgs, toml: Option<TomlConfig>) -> Result<Settings, String> {
    let toml = toml.unwrap_or_default();

    let base_url = args
        .base_url
        .clone()
        .or(toml.target.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(format!(
            "Invalid base URL '{}': must start with http:// or https://",
            base_url
        ));
    }

    let stages = if !args.stages.is_empty() {
        args.stages.clone()
    } else if !toml.stages.is_empty() {
        toml.stages
    } else {
        default_stages()
    };

    let thresholds = if !args.thresholds.is_empty() {
        args.thresholds.clone()
    } else if !toml.thresholds.is_empty() {
        parse_thresholds(&toml.thresholds)?
    } else {
        default_thresholds()
    };

    let think_time = args
        .think_time
        .or(toml.load.think_time)
        .unwrap_or(DEFAULT_THINK_TIME);

    let mut run = RunConfig::new(stages);
    run.thresholds = thresholds;
    run.start_workers = args.start_workers.or(toml.load.start_workers).unwrap_or(0);
    run.tick = args.tick.or(toml.load.tick).unwrap_or(run.tick);
    run.think_time = (!think_time.is_zero()).then_some(think_time);
    run.fail_fast = args.fail_fast || toml.load.fail_fast;
    run.shards = args.shards.or(toml.load.shards).unwrap_or(0);
    run.validate().map_err(|e| e.to_string())?;

    let mut headers = args.parse_headers()?;
    for (k, v) in toml.target.headers {
        if !headers.iter().any(|(hk, _)| hk.eq_ignore_ascii_case(&k)) {
            headers.push((k, v));
        }
    }

    let defaults = ClientSettings::default();
    let client = ClientSettings {
        timeout: args
            .timeout
            .or(toml.target.timeout)
            .unwrap_or(defaults.timeout),
        connect_timeout: args
            .connect_timeout
            .or(toml.target.connect_timeout)
            .unwrap_or(defaults.connect_timeout),
        headers,
        pool_size: run.max_target() as usize,
    };

    let team_defaults = TeamSettings::default();
    let team = TeamSettings {
        name_prefix: toml.team.name_prefix.unwrap_or(team_defaults.name_prefix),
        members: args
            .members
            .or(toml.team.members)
            .unwrap_or(team_defaults.members),
    };
    if team.members == 0 {
        return Err("Team must have at least one member".to_string());
    }

    Ok(Settings {
        base_url,
        run,
        client,
        team,
    })
}
