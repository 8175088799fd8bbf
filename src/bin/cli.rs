//! Harvester CLI
//!
//! `run` drives the pipeline; `collect` runs one collector and is what the
//! pipeline's child processes invoke.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use harvester::{
    collectors::{self, run_collector},
    error::Result,
    events::LogSink,
    models::{Config, Isolation, Source},
    runner::{CollectorCommand, Pipeline, child_config_path},
};

/// Harvester - job-market and social signal collector
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Sequential multi-source collection pipeline"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the configured collectors in order, halting on the first failure
    Run {
        /// Run only these collectors, in the given order
        #[arg(long, value_name = "NAME")]
        only: Vec<String>,

        /// Run collectors as tasks in this process instead of child processes
        #[arg(long)]
        in_process: bool,

        /// Per-collector timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Pause after each collector in seconds
        #[arg(long, value_name = "SECS")]
        pause: Option<u64>,
    },

    /// Run a single collector
    Collect {
        /// Collector name (job-api, job-scrape, social-a, social-b)
        name: String,
    },

    /// Show the configured order and the credentials each collector needs
    List,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
///
/// Collector runs log to stdout so that the pipeline captures them as the
/// collector's output.
fn init_logging(verbose: bool, target: env_logger::Target) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .target(target)
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let target = match cli.command {
        Command::Collect { .. } => env_logger::Target::Stdout,
        _ => env_logger::Target::Stderr,
    };
    init_logging(cli.verbose, target);

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<bool> {
    let mut config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Run {
            only,
            in_process,
            timeout,
            pause,
        } => {
            if in_process {
                config.runner.isolation = Isolation::Task;
            }
            if let Some(secs) = timeout {
                config.runner.timeout_secs = secs;
            }
            if let Some(secs) = pause {
                config.runner.pause_secs = secs;
            }
            config.validate()?;

            let names = if only.is_empty() {
                config.runner.collectors.clone()
            } else {
                only
            };
            let config_path = if cli.config.exists() {
                Some(child_config_path(&cli.config)?)
            } else {
                None
            };
            let command = CollectorCommand::new(std::env::current_exe()?)
                .with_config_path(config_path)
                .with_verbose(cli.verbose);

            let pipeline = Pipeline::from_config(&config, &names, &command);
            let token = pipeline.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupted; stopping the running collector");
                    token.cancel();
                }
            });

            let report = pipeline.run().await;
            Ok(report.success)
        }

        Command::Collect { name } => {
            let source: Source = name.parse()?;
            config.validate()?;
            Ok(run_collector(source, &config, &LogSink).await.is_ok())
        }

        Command::List => {
            log::info!("Configuration: {}", cli.config.display());
            for (index, name) in config.runner.collectors.iter().enumerate() {
                let Ok(source) = name.parse::<Source>() else {
                    log::warn!("{}. {} (unknown collector)", index + 1, name);
                    continue;
                };
                log::info!("{}. {} ({})", index + 1, name, source.system());
                for env in collectors::required_credentials(source, &config) {
                    let state = match std::env::var(&env) {
                        Ok(value) if !value.trim().is_empty() => "set",
                        _ => "missing",
                    };
                    log::info!("     {env}: {state}");
                }
            }
            Ok(true)
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} collectors, {:?} isolation, store {:?})",
                config.runner.collectors.len(),
                config.runner.isolation,
                config.store.kind
            );
            Ok(true)
        }
    }
}
