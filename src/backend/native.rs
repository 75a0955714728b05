//! Locally installed SteamCMD execution.

use std::fs;
use std::process::Command;

use tracing::info;

use crate::job::{Job, JobError};

use super::{job_error, run_captured, Backend, MaintenanceError};

const DEFAULT_BINARY: &str = "steamcmd";

/// Invokes the `steamcmd` binary installed on the host. SteamCMD self-updates
/// on login, so the refresh step is a bare anonymous login. The interactive
/// flag has no meaning here and is ignored.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    binary: String,
}

impl NativeBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// SteamCMD directive tail for one job.
    fn install_args(job: &Job) -> Vec<String> {
        let dir = job.install_dir.display().to_string();
        vec![
            "+login".to_string(),
            "anonymous".to_string(),
            "+force_install_dir".to_string(),
            dir,
            "+app_update".to_string(),
            job.app_id.as_str().to_string(),
            "validate".to_string(),
            "+quit".to_string(),
        ]
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

impl Backend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn refresh(&self) -> Result<(), MaintenanceError> {
        info!(binary = %self.binary, "updating steamcmd via anonymous login");
        let mut command = Command::new(&self.binary);
        command.args(["+login", "anonymous", "+quit"]);
        run_captured(command, "steamcmd").map(drop)?;
        Ok(())
    }

    fn install(&self, job: &Job) -> Result<(), JobError> {
        // Unlike the container backend there is no mount to create the
        // target, so make the directory before SteamCMD touches it.
        fs::create_dir_all(&job.install_dir).map_err(|err| JobError {
            app_id: job.app_id.clone(),
            detail: format!(
                "failed to create install directory {}: {err}",
                job.install_dir.display()
            ),
        })?;

        let mut command = Command::new(&self.binary);
        command.args(Self::install_args(job));
        run_captured(command, "steamcmd")
            .map(drop)
            .map_err(|err| job_error(job, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::AppId;
    use std::path::Path;

    #[test]
    fn install_args_follow_steamcmd_directive_order() {
        let job = Job::new(Path::new("/data/games"), AppId::new("440"), true);
        assert_eq!(
            NativeBackend::install_args(&job),
            vec![
                "+login",
                "anonymous",
                "+force_install_dir",
                "/data/games/440",
                "+app_update",
                "440",
                "validate",
                "+quit",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn install_creates_missing_directory_before_invoking() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::new(dir.path(), AppId::new("440"), false);

        // Use `true` as a stand-in binary so the invocation itself succeeds.
        let backend = NativeBackend::new("true");
        backend.install(&job).unwrap();
        assert!(job.install_dir.is_dir());
    }
}
