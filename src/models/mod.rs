// src/models/mod.rs

//! Domain models for the harvester.
//!
//! Records produced by collectors, the runner's view of collector
//! executions, and the application configuration.

mod config;
mod record;
mod run;

// Re-export all public types
pub use config::{
    Config, CryptoJobsListConfig, HttpConfig, Isolation, ListingSelectors, OutputConfig,
    RedditConfig, RunnerConfig, StoreConfig, StoreKind, TwitterConfig, Web3CareerConfig,
};
pub use record::{NormalizedRecord, PLACEHOLDER, Source};
pub use run::{CollectorRunResult, ExitStatus, PipelineReport, RunState};
