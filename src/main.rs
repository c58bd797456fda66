mod cli;
mod config;

use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use config::{Settings, load_config, merge_config};
use stampede::engine::Engine;
use stampede::error::EngineError;
use stampede::http::create_client;
use stampede::output::{ReportTarget, print_json, print_report, write_json};
use stampede::workload::PullRequestScenario;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32, String> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_load_test(&args).await,
        Commands::Init(args) => run_init(&args),
        Commands::Completions(args) => {
            cli::generate_completions(args.shell);
            Ok(0)
        }
        Commands::Man => {
            cli::generate_man_page().map_err(|e| format!("Failed to generate man page: {}", e))?;
            Ok(0)
        }
    }
}

fn run_init(args: &cli::InitArgs) -> Result<i32, String> {
    use std::fs;

    if args.output.exists() && !args.force {
        return Err(format!(
            "File '{}' already exists. Use --force to overwrite.",
            args.output.display()
        ));
    }

    let url = args.url.as_deref().unwrap_or(config::DEFAULT_BASE_URL);

    let config = format!(
        r#"# Stampede Load Test Configuration

[target]
base_url = "{url}"
timeout = "5s"
connect_timeout = "2s"

# Headers sent with every request
# [target.headers]
# Authorization = "Bearer ${{API_TOKEN:-changeme}}"

[load]
think_time = "100ms"
# tick = "100ms"          # how often the worker level is recomputed
# start_workers = 0       # level before the first stage ramps
# fail_fast = false       # stop on the first threshold breach
# shards = 0              # metric shards, 0 = automatic

# Ramp up to 10 workers, hold, then ramp down
[[stages]]
duration = "10s"
target = 10

[[stages]]
duration = "20s"
target = 10

[[stages]]
duration = "5s"
target = 0

# Metrics: p50|p75|p90|p95|p99|p999|mean|max_latency_ms, error_rate,
# rps, check_pass_rate. Operators: < <= > >= ==
[thresholds]
p95_latency_ms = "< 300"
error_rate = "< 0.001"

[team]
name_prefix = "loadtest_team"
members = 20
"#,
        url = url
    );

    fs::write(&args.output, config).map_err(|e| format!("Failed to write config file: {}", e))?;

    eprintln!("Created config file: {}", args.output.display());
    eprintln!("\nRun with: stampede run -f {}", args.output.display());

    Ok(0)
}

fn print_plan(settings: &Settings) {
    let run = &settings.run;

    eprintln!("Configuration validated successfully!\n");
    eprintln!("Target:      {}", settings.base_url);
    eprintln!(
        "Workload:    team of {} ({}_*), POST /pullRequest/create",
        settings.team.members, settings.team.name_prefix
    );
    eprintln!(
        "Stages:      {} defined (total: {:?}, max workers: {})",
        run.stages.len(),
        run.total_duration(),
        run.max_target()
    );
    for (i, s) in run.stages.iter().enumerate() {
        eprintln!("  {}. {:?} -> {} workers", i + 1, s.duration, s.target);
    }
    if run.start_workers > 0 {
        eprintln!("Start level: {} workers", run.start_workers);
    }
    match run.think_time {
        Some(t) => eprintln!("Think time:  {:?}", t),
        None => eprintln!("Think time:  none"),
    }
    eprintln!("Tick:        {:?}", run.tick);
    eprintln!("Timeout:     {:?}", settings.client.timeout);
    if !settings.client.headers.is_empty() {
        eprintln!("Headers:     {} custom", settings.client.headers.len());
    }
    eprintln!("Thresholds:  {} defined", run.thresholds.len());
    for t in &run.thresholds {
        eprintln!("  - {}", t.condition());
    }
    let checks = PullRequestScenario::checks();
    eprintln!("Checks:      {} defined", checks.len());
    for c in &checks {
        eprintln!("  - {}", c.name());
    }
    if run.fail_fast {
        eprintln!("Fail fast:   enabled");
    }
}

async fn run_load_test(args: &RunArgs) -> Result<i32, String> {
    let toml_config = match &args.config {
        Some(path) => Some(load_config(path)?),
        None => None,
    };

    let settings = merge_config(args, toml_config)?;

    if args.dry_run {
        print_plan(&settings);
        return Ok(0);
    }

    let client = create_client(&settings.client)?;
    let scenario =
        PullRequestScenario::new(client, settings.base_url.clone(), settings.team.clone());
    let engine =
        Engine::new(settings.run.clone(), scenario).with_checks(PullRequestScenario::checks());

    let cancel_token = engine.cancel_token();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, winding down");
            ctrl_c_token.cancel();
        }
    });

    let report = match engine.run().await {
        Ok(report) => report,
        Err(EngineError::Setup(e)) => {
            eprintln!("Error: {}", e);
            return Ok(3);
        }
        Err(e) => return Err(e.to_string()),
    };

    let target = ReportTarget {
        base_url: &settings.base_url,
        headers: &settings.client.headers,
        stages: &settings.run.stages,
    };

    if args.json {
        print_json(&report, &target).map_err(|e| format!("Failed to write JSON: {}", e))?;
    } else if !args.quiet {
        print_report(&report);
    }

    if let Some(path) = &args.output {
        write_json(&report, &target, path)
            .map_err(|e| format!("Failed to write output file: {}", e))?;
        if !args.quiet && !args.json {
            eprintln!("Results written to: {}", path.display());
        }
    }

    if report.passed() { Ok(0) } else { Ok(4) }
}
