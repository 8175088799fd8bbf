// src/events.rs

//! Structured progress events emitted by collectors.
//!
//! Collectors never print directly; they emit [`CollectorEvent`]s into an
//! [`EventSink`]. The CLI routes them to the `log` facade, while the
//! in-process runner mode buffers them as the collector's captured output.

use std::fmt;
use std::sync::Mutex;

use crate::error::ErrorKind;
use crate::models::{NormalizedRecord, Source};

/// One observable step of a collector run.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorEvent {
    CollectorStarted {
        source: Source,
    },
    /// A request is about to be sent
    Fetching {
        source: Source,
        target: String,
    },
    /// Top-level payload shape recognized
    ShapeDetected {
        source: Source,
        detail: String,
    },
    /// Payload shape not recognized; the result degrades to empty
    ShapeUnrecognized {
        source: Source,
        detail: String,
    },
    ItemSkipped {
        source: Source,
        reason: String,
    },
    /// Search result already collected earlier in this pass
    DuplicateDropped {
        source: Source,
        external_id: String,
    },
    /// Non-fatal warning worth an operator's attention
    Diagnostic {
        source: Source,
        message: String,
    },
    /// Progress for one query, subreddit or page
    Progress {
        source: Source,
        scope: String,
        count: usize,
    },
    Preview {
        source: Source,
        index: usize,
        record: Box<NormalizedRecord>,
    },
    RecordsStored {
        source: Source,
        count: usize,
        destination: String,
    },
    CollectorFinished {
        source: Source,
        count: usize,
        skipped: usize,
    },
    CollectorFailed {
        source: Source,
        kind: ErrorKind,
        message: String,
    },
}

impl CollectorEvent {
    /// Log level the event maps to.
    pub fn level(&self) -> log::Level {
        match self {
            CollectorEvent::DuplicateDropped { .. } => log::Level::Debug,
            CollectorEvent::ShapeUnrecognized { .. }
            | CollectorEvent::ItemSkipped { .. }
            | CollectorEvent::Diagnostic { .. } => log::Level::Warn,
            CollectorEvent::CollectorFailed { .. } => log::Level::Error,
            _ => log::Level::Info,
        }
    }
}

impl fmt::Display for CollectorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorEvent::CollectorStarted { source } => {
                write!(f, "[{source}] Starting {} collection", source.system())
            }
            CollectorEvent::Fetching { source, target } => {
                write!(f, "[{source}] Requesting {target}")
            }
            CollectorEvent::ShapeDetected { source, detail } => {
                write!(f, "[{source}] Response shape: {detail}")
            }
            CollectorEvent::ShapeUnrecognized { source, detail } => {
                write!(f, "[{source}] Unrecognized response shape: {detail}")
            }
            CollectorEvent::ItemSkipped { source, reason } => {
                write!(f, "[{source}] Skipped item: {reason}")
            }
            CollectorEvent::DuplicateDropped {
                source,
                external_id,
            } => write!(f, "[{source}] Dropped duplicate {external_id}"),
            CollectorEvent::Diagnostic { source, message } => write!(f, "[{source}] {message}"),
            CollectorEvent::Progress {
                source,
                scope,
                count,
            } => write!(f, "[{source}] Collected {count} items from {scope}"),
            CollectorEvent::Preview {
                source,
                index,
                record,
            } => {
                let body = serde_json::to_string_pretty(record).map_err(|_| fmt::Error)?;
                write!(f, "[{source}] Example record {}:\n{body}", index + 1)
            }
            CollectorEvent::RecordsStored {
                source,
                count,
                destination,
            } => write!(f, "[{source}] Stored {count} records in {destination}"),
            CollectorEvent::CollectorFinished {
                source,
                count,
                skipped,
            } => write!(
                f,
                "[{source}] Finished: {count} records parsed, {skipped} skipped"
            ),
            CollectorEvent::CollectorFailed {
                source,
                kind,
                message,
            } => write!(f, "[{source}] {kind} error: {message}"),
        }
    }
}

/// Consumer of collector events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CollectorEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: CollectorEvent) {
        log::log!(event.level(), "{event}");
    }
}

/// Buffers events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CollectorEvent>>,
    quiet: bool,
}

impl MemorySink {
    /// Buffer and also forward to the `log` facade.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer only.
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    /// Snapshot of the events emitted so far.
    pub fn events(&self) -> Vec<CollectorEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events rendered one per line, as a log sink would print them.
    pub fn render(&self) -> String {
        self.events()
            .iter()
            .map(|event| format!("[{}] {event}", event.level()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: CollectorEvent) {
        if !self.quiet {
            log::log!(event.level(), "{event}");
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
