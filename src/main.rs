//! Depot Lane CLI
//!
//! Entry point for the `depot-lane` command-line tool: installs or updates a
//! set of Steam apps with SteamCMD under a bounded worker pool, guarded by a
//! single-run lockfile, with Slack failure alerts.

use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use depot_lane::config::{self, BackendKind, ConfigError, RunConfig, SlackConfig};
use depot_lane::lock::LockError;
use depot_lane::pipeline::{self, LaneError};

#[derive(Parser)]
#[command(name = "depot-lane")]
#[command(about = "Install or update Steam games using SteamCMD", version)]
struct Cli {
    /// Comma-separated list of Steam app ids
    #[arg(long = "app_ids", required = true)]
    app_ids: String,

    /// Root path; each app id gets its own install directory beneath it
    #[arg(long = "install_path", required = true)]
    install_path: PathBuf,

    /// Maximum number of app ids processed concurrently
    #[arg(long = "max_workers", default_value_t = config::DEFAULT_MAX_WORKERS)]
    max_workers: usize,

    /// Run the SteamCMD container in interactive mode (true/false)
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    interactive: bool,

    /// Execution backend: container (Docker) or native (local steamcmd)
    #[arg(long, default_value_t = BackendKind::Container)]
    backend: BackendKind,

    /// SteamCMD container image reference
    #[arg(long, default_value = config::DEFAULT_IMAGE)]
    image: String,

    /// Run lock marker path
    #[arg(long, default_value = config::DEFAULT_LOCKFILE)]
    lockfile: PathBuf,

    /// Append-only run log path
    #[arg(long = "log_file", default_value = config::DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let config = match build_config(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("depot-lane: {err}");
            process::exit(2);
        }
    };

    if let Err(err) = init_logging(&config.log_path) {
        eprintln!(
            "depot-lane: cannot open log file {}: {err}",
            config.log_path.display()
        );
        process::exit(2);
    }

    if let Err(err) = pipeline::run(&config) {
        match &err {
            LaneError::Lock(LockError::Held(path)) => {
                eprintln!(
                    "Steam game updater is already running. Please wait for it to \
                     complete or delete the lockfile at {}. Exiting...",
                    path.display()
                );
            }
            other => eprintln!("depot-lane: {other}"),
        }
        process::exit(err.exit_code());
    }
    // Per-job failures were reported as they completed; the run itself
    // finished its sequence, so the process exits 0.
}

/// Resolve CLI flags and the Slack environment into one configuration value.
/// This is the only place that reads the process environment.
fn build_config(cli: Cli) -> Result<RunConfig, ConfigError> {
    let app_ids = config::parse_app_ids(&cli.app_ids)?;
    let slack = SlackConfig::from_parts(
        env::var(config::ENV_SLACK_CHANNEL).ok(),
        env::var(config::ENV_SLACK_TOKEN).ok(),
        env::var(config::ENV_NODE_NAME).ok(),
    );

    let config = RunConfig {
        app_ids,
        install_root: cli.install_path,
        max_workers: cli.max_workers,
        interactive: cli.interactive,
        backend: cli.backend,
        image: cli.image,
        slack,
        lockfile_path: cli.lockfile,
        log_path: cli.log_file,
    };
    config.validate()?;
    Ok(config)
}

/// Append timestamped, level-tagged lines to the run log. Per-app outcome
/// lines still go to stdout; the log file is the durable record.
fn init_logging(log_path: &Path) -> io::Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(file_layer)
        .init();
    Ok(())
}
