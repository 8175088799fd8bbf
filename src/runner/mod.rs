//! Pipeline runner.
//!
//! Runs collectors one after another, each inside an isolation unit with
//! its own timeout and cancellation token. The first unit that does not
//! succeed halts the run; later collectors stay pending.

mod pipeline;
mod unit;

pub use pipeline::{Pipeline, child_config_path};
pub use unit::{
    CollectorCommand, IsolationUnit, MissingUnit, ProcessUnit, TaskUnit, UnitOutcome, UnitOutput,
};
