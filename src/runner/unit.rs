// src/runner/unit.rs

//! Isolation units: the runner's handle on one collector execution.

use std::future::Future;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::events::MemorySink;

/// How a unit stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    Exited { success: bool, code: Option<i32> },
    /// Stopped through the cancellation token
    Cancelled,
    /// Nothing to run under this name
    Missing,
}

/// Everything a unit reports back to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutput {
    pub outcome: UnitOutcome,
    pub stdout: String,
    pub stderr: String,
}

impl UnitOutput {
    fn missing(message: String) -> Self {
        Self {
            outcome: UnitOutcome::Missing,
            stdout: String::new(),
            stderr: message,
        }
    }
}

/// One isolated collector execution.
#[async_trait]
pub trait IsolationUnit: Send + Sync {
    fn name(&self) -> &str;

    /// Run to completion, or stop promptly once `cancel` fires.
    async fn execute(&self, cancel: CancellationToken) -> UnitOutput;
}

/// Child process with captured stdout and stderr.
#[derive(Debug, Clone)]
pub struct ProcessUnit {
    name: String,
    program: PathBuf,
    args: Vec<String>,
}

/// How child processes re-invoke this binary for one collector.
#[derive(Debug, Clone)]
pub struct CollectorCommand {
    pub exe: PathBuf,
    pub config_path: Option<String>,
    pub verbose: bool,
}

impl CollectorCommand {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            config_path: None,
            verbose: false,
        }
    }

    pub fn with_config_path(mut self, path: Option<String>) -> Self {
        self.config_path = path;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// `[--config PATH] [--verbose] collect {name}`
    fn args(&self, name: &str) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.config_path {
            args.push("--config".to_string());
            args.push(path.clone());
        }
        if self.verbose {
            args.push("--verbose".to_string());
        }
        args.push("collect".to_string());
        args.push(name.to_string());
        args
    }
}

impl ProcessUnit {
    pub fn new(
        name: impl Into<String>,
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn collector(command: &CollectorCommand, name: &str) -> Self {
        Self::new(name, command.exe.clone(), command.args(name))
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        log::debug!("Pipe read ended early: {e}");
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[async_trait]
impl IsolationUnit for ProcessUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, cancel: CancellationToken) -> UnitOutput {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return UnitOutput::missing(format!(
                    "Executable {} not found: {e}",
                    self.program.display()
                ));
            }
            Err(e) => {
                return UnitOutput {
                    outcome: UnitOutcome::Exited {
                        success: false,
                        code: None,
                    },
                    stdout: String::new(),
                    stderr: format!("Failed to start {}: {e}", self.program.display()),
                };
            }
        };
        log::debug!("Started {} as pid {:?}", self.name, child.id());

        let stdout = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr = tokio::spawn(read_pipe(child.stderr.take()));

        let outcome = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => UnitOutcome::Exited {
                    success: status.success(),
                    code: status.code(),
                },
                Err(e) => {
                    log::error!("Waiting on {} failed: {e}", self.name);
                    UnitOutcome::Exited { success: false, code: None }
                }
            },
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill {}: {e}", self.name);
                }
                UnitOutcome::Cancelled
            }
        };

        UnitOutput {
            outcome,
            stdout: stdout.await.unwrap_or_default(),
            stderr: stderr.await.unwrap_or_default(),
        }
    }
}

type TaskJob =
    Box<dyn Fn(Arc<MemorySink>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Future on a tokio task; its event stream becomes the captured stdout.
pub struct TaskUnit {
    name: String,
    job: TaskJob,
}

impl TaskUnit {
    pub fn new<F, Fut>(name: impl Into<String>, job: F) -> Self
    where
        F: Fn(Arc<MemorySink>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            job: Box::new(move |sink| Box::pin(job(sink))),
        }
    }
}

#[async_trait]
impl IsolationUnit for TaskUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, cancel: CancellationToken) -> UnitOutput {
        let sink = Arc::new(MemorySink::quiet());
        let mut handle = tokio::spawn((self.job)(Arc::clone(&sink)));

        let (outcome, stderr) = tokio::select! {
            joined = &mut handle => match joined {
                Ok(Ok(())) => (UnitOutcome::Exited { success: true, code: Some(0) }, String::new()),
                Ok(Err(e)) => (
                    UnitOutcome::Exited { success: false, code: Some(1) },
                    format!("ERROR: {e}"),
                ),
                Err(e) => (
                    UnitOutcome::Exited { success: false, code: None },
                    format!("Task ended abnormally: {e}"),
                ),
            },
            _ = cancel.cancelled() => {
                handle.abort();
                (UnitOutcome::Cancelled, String::new())
            }
        };

        UnitOutput {
            outcome,
            stdout: sink.render(),
            stderr,
        }
    }
}

/// Placeholder for a configured name that matches no collector.
#[derive(Debug, Clone)]
pub struct MissingUnit {
    name: String,
}

impl MissingUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl IsolationUnit for MissingUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _cancel: CancellationToken) -> UnitOutput {
        UnitOutput::missing(format!("No collector named '{}'", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::events::{CollectorEvent, EventSink};
    use crate::models::Source;
    use std::time::Duration;

    #[tokio::test]
    async fn process_output_and_exit_code_are_captured() {
        let unit = ProcessUnit::new("sh", "sh", ["-c", "echo fetched; echo warned >&2; exit 3"]);
        let output = unit.execute(CancellationToken::new()).await;

        assert_eq!(
            output.outcome,
            UnitOutcome::Exited {
                success: false,
                code: Some(3)
            }
        );
        assert_eq!(output.stdout, "fetched\n");
        assert_eq!(output.stderr, "warned\n");
    }

    #[tokio::test]
    async fn missing_executable_is_reported_as_missing() {
        let unit = ProcessUnit::new("ghost", "/nonexistent/harvester-collector", ["collect"]);
        let output = unit.execute(CancellationToken::new()).await;
        assert_eq!(output.outcome, UnitOutcome::Missing);
        assert!(output.stderr.contains("not found"));
    }

    #[tokio::test]
    async fn cancelled_process_is_killed() {
        let unit = ProcessUnit::new("sleeper", "sh", ["-c", "exec sleep 30"]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let output = tokio::time::timeout(Duration::from_secs(10), unit.execute(cancel))
            .await
            .unwrap();
        assert_eq!(output.outcome, UnitOutcome::Cancelled);
    }

    #[test]
    fn collector_command_line() {
        let command = CollectorCommand::new("/usr/bin/harvester")
            .with_config_path(Some("config.toml".to_string()));
        let unit = ProcessUnit::collector(&command, "job-api");
        assert_eq!(unit.name(), "job-api");
        assert_eq!(unit.program, PathBuf::from("/usr/bin/harvester"));
        assert_eq!(unit.args, vec!["--config", "config.toml", "collect", "job-api"]);
    }

    #[test]
    fn verbose_is_passed_to_children() {
        let command = CollectorCommand::new("harvester").with_verbose(true);
        let unit = ProcessUnit::collector(&command, "social-b");
        assert_eq!(unit.args, vec!["--verbose", "collect", "social-b"]);
    }

    #[tokio::test]
    async fn task_events_become_stdout() {
        let unit = TaskUnit::new("job-api", |sink: Arc<MemorySink>| async move {
            sink.emit(CollectorEvent::CollectorFinished {
                source: Source::JobApi,
                count: 1,
                skipped: 0,
            });
            Ok(())
        });
        let output = unit.execute(CancellationToken::new()).await;
        assert!(matches!(output.outcome, UnitOutcome::Exited { success: true, .. }));
        assert!(output.stdout.contains("Finished: 1 records parsed"));
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn task_error_goes_to_stderr() {
        let unit = TaskUnit::new("job-scrape", |_sink| async move {
            Err(AppError::structure("job-scrape", "no rows"))
        });
        let output = unit.execute(CancellationToken::new()).await;
        assert_eq!(
            output.outcome,
            UnitOutcome::Exited {
                success: false,
                code: Some(1)
            }
        );
        assert!(output.stderr.contains("no rows"));
    }

    #[tokio::test]
    async fn missing_unit_never_runs() {
        let output = MissingUnit::new("social-c")
            .execute(CancellationToken::new())
            .await;
        assert_eq!(output.outcome, UnitOutcome::Missing);
        assert!(output.stderr.contains("social-c"));
    }
}
