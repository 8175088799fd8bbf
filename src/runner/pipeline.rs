// src/runner/pipeline.rs

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::collectors::run_collector;
use crate::error::Result;
use crate::models::{
    CollectorRunResult, Config, ExitStatus, Isolation, PipelineReport, RunState, Source,
};
use crate::utils::log;

use super::unit::{
    CollectorCommand, IsolationUnit, MissingUnit, ProcessUnit, TaskUnit, UnitOutcome, UnitOutput,
};

/// Sequential, halt-on-first-failure runner over isolation units.
pub struct Pipeline {
    units: Vec<Box<dyn IsolationUnit>>,
    timeout: Duration,
    pause: Duration,
    kill_grace: Duration,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(units: Vec<Box<dyn IsolationUnit>>) -> Self {
        let defaults = crate::models::RunnerConfig::default();
        Self {
            units,
            timeout: defaults.timeout(),
            pause: defaults.pause(),
            kill_grace: defaults.kill_grace(),
            cancel: CancellationToken::new(),
        }
    }

    /// Build one unit per configured collector name.
    ///
    /// Process isolation re-invokes the binary through `command`; task
    /// isolation runs the collector inside this process.
    pub fn from_config(config: &Config, names: &[String], command: &CollectorCommand) -> Self {
        let shared = Arc::new(config.clone());
        let units = names
            .iter()
            .map(|name| -> Box<dyn IsolationUnit> {
                let Ok(source) = name.parse::<Source>() else {
                    return Box::new(MissingUnit::new(name.as_str()));
                };
                match config.runner.isolation {
                    Isolation::Process => {
                        Box::new(ProcessUnit::collector(command, name))
                    }
                    Isolation::Task => Box::new(collector_task(source, Arc::clone(&shared))),
                }
            })
            .collect();

        Self::new(units)
            .with_timeout(config.runner.timeout())
            .with_pause(config.runner.pause())
            .with_kill_grace(config.runner.kill_grace())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Token that stops the current unit and the rest of the run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every unit in order until one fails.
    pub async fn run(&self) -> PipelineReport {
        let started_at = Utc::now();
        let total = self.units.len();
        let mut states: Vec<(String, RunState)> = self
            .units
            .iter()
            .map(|unit| (unit.name().to_string(), RunState::Pending))
            .collect();
        let mut results = Vec::new();
        let mut success = true;

        log::header(&format!("Starting pipeline with {total} collectors"));

        for (index, unit) in self.units.iter().enumerate() {
            if self.cancel.is_cancelled() {
                ::log::warn!("Pipeline cancelled before {}", unit.name());
                success = false;
                break;
            }

            states[index].1 = RunState::Running;
            log::step(index + 1, total, &format!("Running collector: {}", unit.name()));

            let result = self.run_unit(unit.as_ref()).await;
            report_result(&result);
            states[index].1 = result.status.state();
            let failed = !result.status.is_success();
            results.push(result);

            self.pause_after(unit.name()).await;

            if failed {
                ::log::error!(
                    "Collector {} did not succeed; halting pipeline",
                    unit.name()
                );
                success = false;
                break;
            }
        }

        let report = PipelineReport {
            started_at,
            finished_at: Utc::now(),
            states,
            results,
            success,
        };
        report_summary(&report);
        report
    }

    /// Execute one unit under the timeout.
    async fn run_unit(&self, unit: &dyn IsolationUnit) -> CollectorRunResult {
        let token = self.cancel.child_token();
        let started = Instant::now();

        let execution = unit.execute(token.clone());
        tokio::pin!(execution);

        let (output, timed_out) = tokio::select! {
            output = &mut execution => (output, false),
            _ = tokio::time::sleep(self.timeout) => {
                ::log::error!(
                    "Collector {} exceeded {}; cancelling",
                    unit.name(),
                    log::seconds(self.timeout)
                );
                token.cancel();
                let partial = match tokio::time::timeout(self.kill_grace, &mut execution).await {
                    Ok(output) => output,
                    Err(_) => {
                        ::log::warn!(
                            "No output recovered from {} within the grace period",
                            unit.name()
                        );
                        UnitOutput {
                            outcome: UnitOutcome::Cancelled,
                            stdout: String::new(),
                            stderr: String::new(),
                        }
                    }
                };
                (partial, true)
            }
        };

        let status = if timed_out {
            ExitStatus::Timeout
        } else {
            match output.outcome {
                UnitOutcome::Exited { success: true, .. } => ExitStatus::Success,
                UnitOutcome::Exited { success: false, code } => ExitStatus::Failure { code },
                UnitOutcome::Cancelled => ExitStatus::Failure { code: None },
                UnitOutcome::Missing => ExitStatus::Missing,
            }
        };

        CollectorRunResult {
            name: unit.name().to_string(),
            status,
            duration: started.elapsed(),
            captured_stdout: output.stdout,
            captured_stderr: output.stderr,
        }
    }

    async fn pause_after(&self, name: &str) {
        if self.pause.is_zero() {
            return;
        }
        ::log::info!("Pausing {} after {}", log::seconds(self.pause), name);
        tokio::select! {
            _ = tokio::time::sleep(self.pause) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

/// Task unit that runs one collector in this process.
fn collector_task(source: Source, config: Arc<Config>) -> TaskUnit {
    TaskUnit::new(source.as_str(), move |sink| {
        let config = Arc::clone(&config);
        async move {
            run_collector(source, &config, &*sink)
                .await
                .map(|_| ())
        }
    })
}

fn report_result(result: &CollectorRunResult) {
    log::block(
        &format!("STDOUT for {}", result.name),
        &result.captured_stdout,
        "(no stdout)",
    );
    log::block(
        &format!("STDERR for {}", result.name),
        &result.captured_stderr,
        "(no stderr)",
    );

    let outcome = match &result.status {
        ExitStatus::Success => "completed successfully".to_string(),
        ExitStatus::Failure { code: Some(code) } => format!("failed with exit code {code}"),
        ExitStatus::Failure { code: None } => "failed without an exit code".to_string(),
        ExitStatus::Timeout => "timed out".to_string(),
        ExitStatus::Missing => "could not be found".to_string(),
    };
    ::log::info!(
        "{} {} in {}",
        result.name,
        outcome,
        log::seconds(result.duration)
    );
    log::separator();
}

fn report_summary(report: &PipelineReport) {
    let mut items: Vec<(&str, String)> = report
        .states
        .iter()
        .map(|(name, state)| (name.as_str(), format!("{state:?}")))
        .collect();
    let elapsed = (report.finished_at - report.started_at)
        .to_std()
        .unwrap_or_default();
    items.push(("elapsed", log::seconds(elapsed)));

    let title = if report.success {
        "Pipeline finished successfully"
    } else {
        "Pipeline finished with errors"
    };
    log::summary(title, &items);
}

/// Resolve the configuration path passed on to child processes.
pub fn child_config_path(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)?;
    Ok(absolute.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ok_unit(name: &str, runs: Arc<AtomicUsize>) -> Box<dyn IsolationUnit> {
        Box::new(TaskUnit::new(name, move |_sink| {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    fn failing_unit(name: &str) -> Box<dyn IsolationUnit> {
        Box::new(TaskUnit::new(name, |_sink| async move {
            Err(AppError::structure("job-scrape", "zero rows"))
        }))
    }

    fn quick(units: Vec<Box<dyn IsolationUnit>>) -> Pipeline {
        Pipeline::new(units)
            .with_pause(Duration::ZERO)
            .with_timeout(Duration::from_secs(5))
            .with_kill_grace(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn all_collectors_succeed() {
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = quick(vec![
            ok_unit("a", Arc::clone(&runs)),
            ok_unit("b", Arc::clone(&runs)),
        ]);

        let report = pipeline.run().await;

        assert!(report.success);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(report.attempted(), vec!["a", "b"]);
        assert!(report.skipped().is_empty());
    }

    #[tokio::test]
    async fn failure_halts_remaining_collectors() {
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = quick(vec![
            ok_unit("a", Arc::clone(&runs)),
            failing_unit("b"),
            ok_unit("c", Arc::clone(&runs)),
        ]);

        let report = pipeline.run().await;

        assert!(!report.success);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(report.attempted(), vec!["a", "b"]);
        assert_eq!(report.state_of("a"), Some(RunState::Completed));
        assert_eq!(report.state_of("b"), Some(RunState::Failed));
        assert_eq!(report.state_of("c"), Some(RunState::Pending));
        assert_eq!(report.skipped(), vec!["c"]);
        assert!(report.results[1].captured_stderr.contains("zero rows"));
    }

    #[tokio::test]
    async fn timeout_halts_like_failure() {
        let runs = Arc::new(AtomicUsize::new(0));
        let slow: Box<dyn IsolationUnit> = Box::new(TaskUnit::new("slow", |_sink| async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }));
        let pipeline = quick(vec![slow, ok_unit("next", Arc::clone(&runs))])
            .with_timeout(Duration::from_millis(100));

        let report = pipeline.run().await;

        assert!(!report.success);
        assert_eq!(report.results[0].status, ExitStatus::Timeout);
        assert_eq!(report.state_of("slow"), Some(RunState::TimedOut));
        assert_eq!(report.state_of("next"), Some(RunState::Pending));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn timed_out_process_is_stopped() {
        let unit: Box<dyn IsolationUnit> =
            Box::new(ProcessUnit::new("sleeper", "sh", ["-c", "echo started; exec sleep 30"]));
        let pipeline = quick(vec![unit])
            .with_timeout(Duration::from_millis(300))
            .with_kill_grace(Duration::from_secs(5));

        let started = Instant::now();
        let report = pipeline.run().await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(report.results[0].status, ExitStatus::Timeout);
        assert_eq!(report.results[0].captured_stdout, "started\n");
    }

    #[tokio::test]
    async fn unknown_collector_is_missing() {
        let config = Config::default();
        let names = vec!["social-c".to_string(), "job-api".to_string()];
        let pipeline = Pipeline::from_config(&config, &names, &CollectorCommand::new("harvester"))
            .with_pause(Duration::ZERO);

        let report = pipeline.run().await;

        assert!(!report.success);
        assert_eq!(report.results[0].status, ExitStatus::Missing);
        assert_eq!(report.state_of("job-api"), Some(RunState::Pending));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failure_with_code() {
        let unit: Box<dyn IsolationUnit> =
            Box::new(ProcessUnit::new("broken", "sh", ["-c", "echo boom >&2; exit 1"]));
        let report = quick(vec![unit]).run().await;

        assert_eq!(report.results[0].status, ExitStatus::Failure { code: Some(1) });
        assert_eq!(report.results[0].captured_stderr, "boom\n");
    }

    #[tokio::test]
    async fn cancelled_pipeline_stops_before_next_unit() {
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = quick(vec![ok_unit("a", Arc::clone(&runs))]);
        pipeline.cancellation_token().cancel();

        let report = pipeline.run().await;

        assert!(!report.success);
        assert!(report.results.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
