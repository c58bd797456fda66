//! End-to-end engine tests against in-process workloads.
//!
//! All tests run on a paused clock so stage timing is deterministic.

use futures_util::future::BoxFuture;
use stampede::engine::{Check, Engine, RunReport};
use stampede::error::{EngineError, IterationError, SetupError, TeardownError};
use stampede::types::{RunConfig, RunState, Stage, Threshold, ThresholdMetric, ThresholdOp};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;

const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Counters {
    setups: AtomicU32,
    teardowns: AtomicU32,
    started: AtomicU64,
    finished: AtomicU64,
}

#[derive(Default)]
struct Probe {
    fail_setup: bool,
    fail_iterations: bool,
    fail_teardown: bool,
    latency: Duration,
    counters: Arc<Counters>,
}

impl Probe {
    fn new(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }
}

impl stampede::engine::Scenario for Probe {
    type Context = String;
    type Output = ();

    fn setup(&self) -> BoxFuture<'_, Result<String, SetupError>> {
        Box::pin(async move {
            self.counters.setups.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(1)).await;
            if self.fail_setup {
                return Err(SetupError::new("team/add returned 500"));
            }
            Ok("user_0".to_string())
        })
    }

    fn iteration<'a>(&'a self, ctx: &'a String) -> BoxFuture<'a, Result<(), IterationError>> {
        Box::pin(async move {
            assert_eq!(ctx, "user_0");
            self.counters.started.fetch_add(1, Ordering::SeqCst);
            sleep(self.latency).await;
            self.counters.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail_iterations {
                Err(IterationError::Status(500))
            } else {
                Ok(())
            }
        })
    }

    fn teardown<'a>(&'a self, _: &'a String) -> BoxFuture<'a, Result<(), TeardownError>> {
        Box::pin(async move {
            self.counters.teardowns.fetch_add(1, Ordering::SeqCst);
            sleep(Duration::from_millis(1)).await;
            if self.fail_teardown {
                return Err(TeardownError::new("cleanup endpoint missing"));
            }
            Ok(())
        })
    }
}

fn failure_rate_below(limit: f64) -> Threshold {
    Threshold::new(ThresholdMetric::ErrorRate, ThresholdOp::Lt, limit)
}

fn config(stages: Vec<Stage>) -> RunConfig {
    RunConfig::new(stages)
        .with_tick(TICK)
        .with_think_time(Duration::from_millis(10))
        .with_threshold(failure_rate_below(0.001))
}

async fn run(config: RunConfig, probe: Probe) -> Result<RunReport, EngineError> {
    Engine::new(config, probe)
        .with_check(Check::infallible("always true", |_| true))
        .run()
        .await
}

mod scenarios {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn single_tick_stage_passes() {
        let probe = Probe::new(Duration::from_millis(5));
        let counters = probe.counters.clone();

        let report = run(config(vec![Stage::new(TICK, 1)]), probe).await.unwrap();

        assert!(report.verdict.passed);
        assert!(report.passed());
        assert_eq!(report.verdict.summary.error_rate, 0.0);
        assert!(report.verdict.summary.total_iterations > 0);
        assert_eq!(report.verdict.results.len(), 1);
        assert!(report.verdict.results[0].passed);
        assert_eq!(report.verdict.summary.overall_check_pass_rate, Some(1.0));
        assert_eq!(counters.setups.load(Ordering::SeqCst), 1);
        assert_eq!(counters.teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_workload_fails_verdict() {
        let probe = Probe {
            fail_iterations: true,
            ..Probe::new(Duration::from_millis(5))
        };

        let report = run(config(vec![Stage::new(Duration::from_millis(500), 2)]), probe)
            .await
            .unwrap();

        let summary = &report.verdict.summary;
        assert!(summary.total_iterations > 0);
        assert_eq!(summary.error_rate, 1.0);
        assert_eq!(summary.failed, summary.total_iterations);
        assert_eq!(summary.status_codes.get(&500), Some(&summary.total_iterations));
        assert!(!report.verdict.passed);
        assert_eq!(report.verdict.results[0].metric, "error_rate");
        assert!(!report.verdict.results[0].passed);
        assert_eq!(report.verdict.results[0].actual, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn setup_failure_runs_nothing() {
        let probe = Probe {
            fail_setup: true,
            ..Probe::new(Duration::from_millis(5))
        };
        let counters = probe.counters.clone();

        let err = run(config(vec![Stage::new(Duration::from_secs(1), 10)]), probe)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Setup(_)));
        assert!(err.to_string().contains("team/add returned 500"));
        assert_eq!(counters.setups.load(Ordering::SeqCst), 1);
        assert_eq!(counters.started.load(Ordering::SeqCst), 0);
        assert_eq!(counters.teardowns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ramp_down_reaches_zero_without_aborting() {
        let probe = Probe::new(Duration::from_millis(30));
        let counters = probe.counters.clone();

        let engine = Engine::new(
            config(vec![
                Stage::new(TICK * 10, 10),
                Stage::new(TICK * 5, 0),
            ]),
            probe,
        );
        let mut stage_rx = engine.stage_info_rx();
        let monitor = tokio::spawn(async move {
            let mut ramp_up_peak = 0;
            let mut ramp_down = Vec::new();
            while stage_rx.changed().await.is_ok() {
                let info = stage_rx.borrow_and_update().clone();
                if info.stage_index == 0 {
                    ramp_up_peak = ramp_up_peak.max(info.assigned);
                } else {
                    ramp_down.push(info.assigned);
                }
            }
            (ramp_up_peak, ramp_down)
        });

        let report = engine.run().await.unwrap();
        let (ramp_up_peak, ramp_down) = monitor.await.unwrap();

        assert_eq!(ramp_up_peak, 10);
        assert_eq!(report.peak_workers, 10);
        assert!(ramp_down.iter().any(|&a| a > 0));
        assert!(ramp_down.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ramp_down.last(), Some(&0));
        assert_eq!(report.verdict.summary.workers_active, 0);

        let started = counters.started.load(Ordering::SeqCst);
        assert!(started > 0);
        assert_eq!(started, counters.finished.load(Ordering::SeqCst));
        assert_eq!(started, report.verdict.summary.total_iterations);
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn setup_runs_once_for_many_workers() {
        let probe = Probe::new(Duration::from_millis(20));
        let counters = probe.counters.clone();

        let report = run(config(vec![Stage::new(Duration::from_secs(1), 25)]), probe)
            .await
            .unwrap();

        assert!(report.workers_spawned >= 25);
        assert_eq!(counters.setups.load(Ordering::SeqCst), 1);
        assert_eq!(counters.teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_failure_keeps_verdict() {
        let probe = Probe {
            fail_teardown: true,
            ..Probe::new(Duration::from_millis(5))
        };

        let report = run(config(vec![Stage::new(Duration::from_millis(300), 2)]), probe)
            .await
            .unwrap();

        assert!(report.passed());
        let err = report.teardown_error.unwrap();
        assert!(err.to_string().contains("cleanup endpoint missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_still_tears_down_and_renders_verdict() {
        let probe = Probe::new(Duration::from_millis(40));
        let counters = probe.counters.clone();

        let engine = Engine::new(config(vec![Stage::new(Duration::from_secs(60), 5)]), probe);
        let cancel = engine.cancel_token();
        tokio::spawn(async move {
            sleep(Duration::from_millis(750)).await;
            cancel.cancel();
        });

        let report = engine.run().await.unwrap();

        assert!(report.cancelled);
        assert!(report.verdict.summary.elapsed < Duration::from_secs(2));
        assert_eq!(report.verdict.results.len(), 1);
        assert_eq!(counters.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(
            counters.started.load(Ordering::SeqCst),
            counters.finished.load(Ordering::SeqCst)
        );
    }

    async fn record_states(
        engine: Engine<Probe>,
    ) -> (Vec<RunState>, Result<RunReport, EngineError>) {
        let mut state_rx = engine.state_rx();
        let mut states = vec![*state_rx.borrow_and_update()];
        let monitor = tokio::spawn(async move {
            let mut seen = Vec::new();
            while state_rx.changed().await.is_ok() {
                seen.push(*state_rx.borrow_and_update());
            }
            seen
        });

        let result = engine.run().await;
        states.extend(monitor.await.unwrap());
        (states, result)
    }

    #[tokio::test(start_paused = true)]
    async fn run_state_follows_lifecycle() {
        let engine = Engine::new(
            config(vec![Stage::new(Duration::from_millis(300), 2)]),
            Probe::new(Duration::from_millis(5)),
        );

        let (states, result) = record_states(engine).await;

        assert!(result.unwrap().passed());
        assert_eq!(
            states,
            vec![
                RunState::Initializing,
                RunState::SettingUp,
                RunState::Running,
                RunState::Stopping,
                RunState::TearingDown,
                RunState::Completed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_state_reports_setup_error() {
        let probe = Probe {
            fail_setup: true,
            ..Probe::new(Duration::from_millis(5))
        };
        let engine = Engine::new(config(vec![Stage::new(Duration::from_secs(1), 2)]), probe);

        let (states, result) = record_states(engine).await;

        assert!(matches!(result, Err(EngineError::Setup(_))));
        assert_eq!(
            states,
            vec![RunState::Initializing, RunState::SettingUp, RunState::Error]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_is_rejected_before_setup() {
        let probe = Probe::new(Duration::from_millis(5));
        let counters = probe.counters.clone();

        let err = run(RunConfig::new(Vec::new()), probe).await.unwrap_err();

        assert!(matches!(err, EngineError::Config(_)));
        assert_eq!(counters.setups.load(Ordering::SeqCst), 0);
    }
}

mod checks {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn failing_checks_do_not_fail_iterations() {
        let probe = Probe::new(Duration::from_millis(5));

        let report = Engine::new(config(vec![Stage::new(Duration::from_millis(400), 2)]), probe)
            .with_check(Check::infallible("never", |_| false))
            .with_check(Check::new("broken", |_| {
                Err(stampede::error::CheckError::MissingField("pr"))
            }))
            .run()
            .await
            .unwrap();

        let summary = &report.verdict.summary;
        assert!(summary.total_iterations > 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.overall_check_pass_rate, Some(0.0));
        assert_eq!(summary.check_stats["never"].failed, summary.total_iterations);
        assert_eq!(summary.check_stats["broken"].failed, summary.total_iterations);
        assert!(report.passed());
    }

    #[tokio::test(start_paused = true)]
    async fn check_pass_rate_threshold() {
        let probe = Probe::new(Duration::from_millis(5));
        let config = config(vec![Stage::new(Duration::from_millis(400), 2)]).with_threshold(
            Threshold::new(ThresholdMetric::CheckPassRate, ThresholdOp::Gte, 0.99),
        );

        let report = Engine::new(config, probe)
            .with_check(Check::infallible("never", |_| false))
            .run()
            .await
            .unwrap();

        assert!(!report.passed());
        let failed: Vec<_> = report.verdict.failed_thresholds().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].metric, "check_pass_rate");
    }
}

mod fail_fast {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn breach_stops_run_early() {
        let probe = Probe {
            fail_iterations: true,
            ..Probe::new(Duration::from_millis(5))
        };
        let mut config = config(vec![Stage::new(Duration::from_secs(30), 2)]);
        config.fail_fast = true;

        let report = run(config, probe).await.unwrap();

        assert!(report.threshold_aborted);
        assert!(report.cancelled);
        assert!(!report.passed());
        assert!(report.verdict.summary.elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_run_is_not_aborted() {
        let probe = Probe::new(Duration::from_millis(5));
        let mut config = config(vec![Stage::new(Duration::from_millis(500), 2)]);
        config.fail_fast = true;

        let report = run(config, probe).await.unwrap();

        assert!(!report.threshold_aborted);
        assert!(!report.cancelled);
        assert!(report.passed());
    }
}
