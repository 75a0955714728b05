//! Docker-backed SteamCMD execution.
//!
//! Each job runs in an ephemeral container with the install directory
//! bind-mounted at the same path inside the container, so the path handed to
//! `+force_install_dir` is valid on both sides of the mount.

use std::process::Command;

use tracing::{info, warn};

use crate::job::{Job, JobError};

use super::{job_error, run_captured, Backend, CommandError, MaintenanceError};

/// Runs SteamCMD through `docker run`, refreshing and pruning the cached
/// image before any job starts.
#[derive(Debug, Clone)]
pub struct ContainerBackend {
    image: String,
}

impl ContainerBackend {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Pull the latest tool image. Fatal on failure.
    fn pull(&self) -> Result<(), CommandError> {
        info!(image = %self.image, "pulling steamcmd image");
        let mut command = Command::new("docker");
        command.args(["pull", &self.image]);
        let output = run_captured(command, "docker pull")?;
        info!(image = %self.image, output = %output.stdout.trim(), "steamcmd image updated");
        Ok(())
    }

    /// Remove every cached copy of the image except the most recently pulled
    /// one. Best-effort per image: a failed removal is logged and skipped,
    /// and never aborts the refresh or the run.
    fn prune_stale_images(&self) {
        let repository = self.image.split(':').next().unwrap_or(&self.image);
        let mut command = Command::new("docker");
        command.args(["images", "-q", repository]);
        let listing = match run_captured(command, "docker images") {
            Ok(output) => output,
            Err(err) => {
                warn!(repository, error = %err, "could not enumerate cached steamcmd images");
                return;
            }
        };

        // `docker images -q` lists newest first; the head is the retained copy.
        let mut ids = listing
            .stdout
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let Some(retained) = ids.next() else {
            return;
        };
        for stale in ids {
            if stale == retained {
                continue;
            }
            let mut remove = Command::new("docker");
            remove.args(["rmi", "-f", stale]);
            match run_captured(remove, "docker rmi") {
                Ok(_) => info!(image_id = stale, "removed stale steamcmd image"),
                Err(err) => {
                    warn!(image_id = stale, error = %err, "failed to remove stale steamcmd image")
                }
            }
        }
    }

    /// `docker run` argv for one job, bind-mounting the install directory at
    /// an identical host/guest path.
    fn install_args(&self, job: &Job) -> Vec<String> {
        let dir = job.install_dir.display().to_string();
        let mut args = vec!["run".to_string()];
        if job.interactive {
            args.push("-it".to_string());
        }
        args.extend([
            "-v".to_string(),
            format!("{dir}:{dir}"),
            self.image.clone(),
            "+force_install_dir".to_string(),
            dir,
            "+login".to_string(),
            "anonymous".to_string(),
            "+app_update".to_string(),
            job.app_id.as_str().to_string(),
            "validate".to_string(),
            "+quit".to_string(),
        ]);
        args
    }
}

impl Backend for ContainerBackend {
    fn name(&self) -> &'static str {
        "container"
    }

    fn refresh(&self) -> Result<(), MaintenanceError> {
        self.pull()?;
        self.prune_stale_images();
        Ok(())
    }

    fn install(&self, job: &Job) -> Result<(), JobError> {
        let mut command = Command::new("docker");
        command.args(self.install_args(job));
        run_captured(command, "docker run")
            .map(drop)
            .map_err(|err| job_error(job, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::AppId;
    use std::path::Path;

    fn backend() -> ContainerBackend {
        ContainerBackend::new("steamcmd/steamcmd:latest")
    }

    #[test]
    fn install_args_bind_mount_is_symmetric() {
        let job = Job::new(Path::new("/data/games"), AppId::new("730"), false);
        let args = backend().install_args(&job);
        assert_eq!(
            args,
            vec![
                "run",
                "-v",
                "/data/games/730:/data/games/730",
                "steamcmd/steamcmd:latest",
                "+force_install_dir",
                "/data/games/730",
                "+login",
                "anonymous",
                "+app_update",
                "730",
                "validate",
                "+quit",
            ]
        );
    }

    #[test]
    fn interactive_mode_adds_tty_flag() {
        let job = Job::new(Path::new("/data/games"), AppId::new("10"), true);
        let args = backend().install_args(&job);
        assert_eq!(args[1], "-it");
        // The SteamCMD directive tail is unaffected.
        assert_eq!(args.last().map(String::as_str), Some("+quit"));
    }
}
