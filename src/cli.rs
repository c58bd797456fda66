use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use stampede::types::{Stage, Threshold};
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

/// `DURATION:TARGET`, e.g. `10s:10` or `1m30s:50`.
fn parse_stage(s: &str) -> Result<Stage, String> {
    let (duration, target) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("Invalid stage '{}'. Expected DURATION:TARGET", s))?;
    let duration = humantime::parse_duration(duration.trim())
        .map_err(|e| format!("Invalid stage duration '{}': {}", duration, e))?;
    let target = target
        .trim()
        .parse()
        .map_err(|_| format!("Invalid stage target '{}'", target))?;
    Ok(Stage::new(duration, target))
}

fn parse_threshold(s: &str) -> Result<Threshold, String> {
    Threshold::parse(s)
}

#[derive(Parser, Debug)]
#[command(
    name = "stampede",
    author,
    version,
    about = "Staged load test runner with checks and threshold verdicts",
    long_about = "stampede ramps a population of virtual workers through timed stages, \
                  records latency and check results for every iteration, and exits \
                  non-zero when a threshold is breached."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a staged load test against the pull-request service
    Run(Box<RunArgs>),

    /// Generate a starter config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),

    /// Generate man page
    Man,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Base URL of the service under test (default: http://localhost:8080)
    pub base_url: Option<String>,

    /// Config file path (TOML)
    #[arg(short = 'f', long = "config")]
    pub config: Option<PathBuf>,

    /// Load stage as DURATION:TARGET (repeatable, replaces configured stages)
    #[arg(short = 's', long = "stage", value_name = "DURATION:TARGET", value_parser = parse_stage)]
    pub stages: Vec<Stage>,

    /// Threshold such as "p95_latency_ms<300" (repeatable, replaces configured thresholds)
    #[arg(short = 't', long = "threshold", value_name = "EXPR", value_parser = parse_threshold)]
    pub thresholds: Vec<Threshold>,

    /// Workers running before the first stage starts ramping
    #[arg(long)]
    pub start_workers: Option<u32>,

    /// Pause between iterations of one worker (e.g., 100ms, 0s to disable)
    #[arg(long, value_parser = parse_duration)]
    pub think_time: Option<Duration>,

    /// Scheduler resolution (e.g., 100ms)
    #[arg(long, value_parser = parse_duration)]
    pub tick: Option<Duration>,

    /// Request timeout (e.g., 5s)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Connection timeout (e.g., 2s)
    #[arg(long, value_parser = parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// HTTP headers (can be specified multiple times)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Number of team members created during setup
    #[arg(long)]
    pub members: Option<u32>,

    /// Metric shards (0 = pick from peak stage target)
    #[arg(long)]
    pub shards: Option<usize>,

    /// Stop the run as soon as any threshold fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Output file path for the JSON report
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Print the JSON report to stdout instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Suppress the console summary (for CI)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Validate config and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn parse_headers(&self) -> Result<Vec<(String, String)>, String> {
        self.headers
            .iter()
            .map(|h| {
                let (name, value) = h.split_once(':').ok_or_else(|| {
                    format!("Invalid header format: {}. Expected 'Name: Value'", h)
                })?;
                Ok((name.trim().to_string(), value.trim().to_string()))
            })
            .collect()
    }
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output file path (default: stampede.toml)
    #[arg(short, long, default_value = "stampede.toml")]
    pub output: PathBuf,

    /// Base URL to include in config
    #[arg(short, long)]
    pub url: Option<String>,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "stampede", &mut std::io::stdout());
}

pub fn generate_man_page() -> Result<(), std::io::Error> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    man.render(&mut std::io::stdout())
}
