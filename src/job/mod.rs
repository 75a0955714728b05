//! Job model
//!
//! One job is one SteamCMD install/update for one Steam app id. Jobs are
//! immutable once created and owned exclusively by the worker that executes
//! them; outcomes are returned as values, never thrown.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Opaque Steam application identifier.
///
/// App ids are treated as tokens: they name a depot to SteamCMD and a
/// subdirectory under the install root, nothing more. No uniqueness check is
/// performed within a run; duplicate ids are a caller error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId(String);

impl AppId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AppId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One install/update unit of work.
#[derive(Debug, Clone)]
pub struct Job {
    /// App id being installed or updated.
    pub app_id: AppId,

    /// Target directory, derived deterministically as install root + app id.
    pub install_dir: PathBuf,

    /// Whether the container backend allocates a TTY (`docker run -it`).
    /// The native backend ignores this.
    pub interactive: bool,
}

impl Job {
    pub fn new(install_root: &Path, app_id: AppId, interactive: bool) -> Self {
        let install_dir = install_root.join(app_id.as_str());
        Self {
            app_id,
            install_dir,
            interactive,
        }
    }
}

/// Failure of a single job.
///
/// Isolated by construction: a `JobError` is reported and aggregated, it
/// never cancels sibling jobs or fails the run.
#[derive(Debug, Clone, Error)]
#[error("app {app_id}: {detail}")]
pub struct JobError {
    pub app_id: AppId,
    /// Captured stderr (or spawn failure text) from the SteamCMD invocation.
    pub detail: String,
}

/// Outcome of one dispatched job, reported exactly once per submitted app id.
#[derive(Debug)]
pub struct JobOutcome {
    pub app_id: AppId,
    pub result: Result<(), JobError>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_dir_is_root_plus_app_id() {
        let job = Job::new(Path::new("/data/games"), AppId::new("730"), true);
        assert_eq!(job.install_dir, PathBuf::from("/data/games/730"));
        assert_eq!(job.app_id.as_str(), "730");
    }

    #[test]
    fn job_error_mentions_app_and_detail() {
        let err = JobError {
            app_id: AppId::new("10"),
            detail: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "app 10: disk full");
    }
}
