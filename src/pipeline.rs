//! Run orchestration
//!
//! The pipeline sequences one run: acquire the run lock, refresh the
//! SteamCMD tool, dispatch the jobs, release the lock on every exit path.
//! A held lock stops everything before any other component runs. A refresh
//! failure is fatal and dispatches zero jobs. Per-job failures are reported
//! and aggregated but never fail the run or affect the process exit status.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info};

use crate::backend::{Backend, ContainerBackend, MaintenanceError, NativeBackend};
use crate::config::{BackendKind, RunConfig};
use crate::dispatch::Dispatcher;
use crate::job::{Job, JobOutcome};
use crate::lock::{LockError, RunLock};
use crate::notify::{self, Notifier};

/// Notification subject for fatal tool maintenance failures.
pub const MAINTENANCE_SUBJECT: &str = "Failed to update SteamCMD";

/// Fatal orchestration errors. Per-job failures never appear here.
#[derive(Debug, Error)]
pub enum LaneError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Maintenance(#[from] MaintenanceError),
}

impl LaneError {
    /// Stable process exit code for this error.
    ///
    /// A held lock exits 1. A fatal maintenance failure exits 2 rather than
    /// reporting success, so operators can tell an aborted run from a
    /// completed one.
    pub fn exit_code(&self) -> i32 {
        match self {
            LaneError::Lock(LockError::Held(_)) => 1,
            LaneError::Lock(LockError::Create { .. }) => 2,
            LaneError::Maintenance(_) => 2,
        }
    }
}

/// Aggregated result of one completed orchestration run.
#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One outcome per submitted app id, in completion order.
    pub outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Run the full orchestration sequence with collaborators chosen from the
/// configuration.
pub fn run(config: &RunConfig) -> Result<RunReport, LaneError> {
    let backend: Box<dyn Backend> = match config.backend {
        BackendKind::Container => Box::new(ContainerBackend::new(&config.image)),
        BackendKind::Native => Box::new(NativeBackend::default()),
    };
    let notifier = notify::for_config(config.slack.as_ref());
    run_with(config, backend.as_ref(), notifier.as_ref())
}

/// Orchestrate one run with explicit collaborators. Split out so tests can
/// drive the full sequence with a scripted backend and a collecting notifier.
pub fn run_with(
    config: &RunConfig,
    backend: &dyn Backend,
    notifier: &dyn Notifier,
) -> Result<RunReport, LaneError> {
    // Acquired before anything else happens; released by Drop on every path.
    let _lock = RunLock::acquire(&config.lockfile_path)?;
    let started_at = Utc::now();

    if config.interactive {
        info!(app_ids = ?config.app_ids, "starting the steam game updater");
    } else {
        info!(app_ids = ?config.app_ids, "starting the non-interactive steam game installer");
    }

    info!(backend = backend.name(), "checking for latest steamcmd version");
    if let Err(err) = backend.refresh() {
        error!(error = %err, "steamcmd refresh failed; aborting before any job");
        notifier.notify(MAINTENANCE_SUBJECT, &err.to_string());
        return Err(err.into());
    }

    let jobs: Vec<Job> = config
        .app_ids
        .iter()
        .cloned()
        .map(|app_id| Job::new(&config.install_root, app_id, config.interactive))
        .collect();

    let dispatcher = Dispatcher::new(config.max_workers);
    let outcomes = dispatcher.run(jobs, backend, notifier);

    let report = RunReport {
        started_at,
        finished_at: Utc::now(),
        outcomes,
    };
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CommandError;

    #[test]
    fn held_lock_maps_to_exit_code_one() {
        let err = LaneError::Lock(LockError::Held("lockfile".into()));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn maintenance_failure_maps_to_exit_code_two() {
        let err = LaneError::Maintenance(MaintenanceError::from(CommandError::Exit {
            tool: "docker pull".to_string(),
            code: 1,
            stderr: "network unreachable".to_string(),
        }));
        assert_eq!(err.exit_code(), 2);
    }
}
