//! SteamCMD execution backends
//!
//! Two interchangeable backends satisfy one contract: refresh the SteamCMD
//! tool before any job runs, then perform one blocking install/update
//! invocation per job. [`ContainerBackend`] wraps SteamCMD in an ephemeral
//! Docker container with the install directory bind-mounted at an identical
//! path on both sides; [`NativeBackend`] invokes a locally installed
//! `steamcmd` binary. Which one runs is a configuration choice.

mod container;
mod native;

pub use container::ContainerBackend;
pub use native::NativeBackend;

use std::io;
use std::process::Command;

use thiserror::Error;

use crate::job::{Job, JobError};

/// An external command invocation that did not produce a successful exit.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with status {code}: {stderr}")]
    Exit {
        tool: String,
        /// Process exit code; -1 when the process was killed by a signal.
        code: i32,
        /// Trimmed captured stderr.
        stderr: String,
    },
}

/// Fatal tool maintenance failure. Aborts the run before any job starts.
#[derive(Debug, Error)]
#[error("steamcmd refresh failed: {0}")]
pub struct MaintenanceError(#[from] pub CommandError);

/// A SteamCMD execution backend.
pub trait Backend: Send + Sync {
    /// Backend label for logs and reports.
    fn name(&self) -> &'static str;

    /// Refresh the cached SteamCMD tool. Must complete successfully before
    /// any job is dispatched; failure is fatal to the run.
    fn refresh(&self) -> Result<(), MaintenanceError>;

    /// Run one blocking SteamCMD invocation for `job`. The worker owns the
    /// call until the external process exits.
    fn install(&self, job: &Job) -> Result<(), JobError>;
}

/// Captured output of a completed external command.
#[derive(Debug)]
pub(crate) struct CapturedOutput {
    pub stdout: String,
}

/// Run `command` to completion with captured streams. Non-zero exit becomes
/// a [`CommandError::Exit`] carrying the trimmed stderr.
pub(crate) fn run_captured(mut command: Command, tool: &str) -> Result<CapturedOutput, CommandError> {
    let output = command.output().map_err(|source| CommandError::Spawn {
        tool: tool.to_string(),
        source,
    })?;
    if !output.status.success() {
        return Err(CommandError::Exit {
            tool: tool.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(CapturedOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
}

/// Convert a command failure into this job's isolated error.
pub(crate) fn job_error(job: &Job, err: CommandError) -> JobError {
    let detail = match err {
        CommandError::Exit { stderr, code, .. } if !stderr.is_empty() => {
            format!("exit status {code}: {stderr}")
        }
        other => other.to_string(),
    };
    JobError {
        app_id: job.app_id.clone(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::AppId;
    use std::path::Path;

    #[test]
    fn run_captured_reports_spawn_failure() {
        let command = Command::new("depot-lane-no-such-binary");
        match run_captured(command, "missing tool") {
            Err(CommandError::Spawn { tool, .. }) => assert_eq!(tool, "missing tool"),
            other => panic!("expected Spawn error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn run_captured_carries_stderr_on_nonzero_exit() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo boom >&2; exit 3"]);
        match run_captured(command, "sh") {
            Err(CommandError::Exit { code, stderr, .. }) => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected Exit error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn run_captured_returns_stdout_on_success() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo hello"]);
        let output = run_captured(command, "sh").unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[test]
    fn job_error_prefers_captured_stderr() {
        let job = Job::new(Path::new("/data"), AppId::new("10"), false);
        let err = job_error(
            &job,
            CommandError::Exit {
                tool: "docker run".to_string(),
                code: 8,
                stderr: "No subscription".to_string(),
            },
        );
        assert_eq!(err.detail, "exit status 8: No subscription");
        assert_eq!(err.app_id.as_str(), "10");
    }
}
