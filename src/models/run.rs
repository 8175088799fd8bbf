//! Runner-side view of collector executions.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of one collector within a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
    Missing,
}

/// How a single collector invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExitStatus {
    Success,
    /// Non-zero exit; the code is absent when the process was killed by a signal
    Failure { code: Option<i32> },
    Timeout,
    Missing,
}

impl ExitStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    /// Terminal runner state this status maps to.
    pub fn state(&self) -> RunState {
        match self {
            ExitStatus::Success => RunState::Completed,
            ExitStatus::Failure { .. } => RunState::Failed,
            ExitStatus::Timeout => RunState::TimedOut,
            ExitStatus::Missing => RunState::Missing,
        }
    }
}

/// Immutable record of one collector execution.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorRunResult {
    pub name: String,
    pub status: ExitStatus,
    pub duration: Duration,
    pub captured_stdout: String,
    pub captured_stderr: String,
}

/// Outcome of a whole pipeline invocation.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Every configured collector in order, with its final state
    pub states: Vec<(String, RunState)>,
    /// One entry per attempted collector
    pub results: Vec<CollectorRunResult>,
    pub success: bool,
}

impl PipelineReport {
    /// Names of collectors that were never attempted.
    pub fn skipped(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, state)| *state == RunState::Pending)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn state_of(&self, name: &str) -> Option<RunState> {
        self.states
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, state)| *state)
    }

    pub fn attempted(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }
}
