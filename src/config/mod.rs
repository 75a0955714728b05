//! Run configuration
//!
//! All configuration is resolved once in `main` (CLI flags plus the Slack
//! environment variables) into a `RunConfig` value that is passed by
//! reference into each component. No component reads ambient process state.

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::job::AppId;

/// Default SteamCMD container image reference.
pub const DEFAULT_IMAGE: &str = "steamcmd/steamcmd:latest";

/// Default number of concurrently processed app ids.
pub const DEFAULT_MAX_WORKERS: usize = 2;

/// Node label used in notifications when `NODE_NAME` is unset.
pub const DEFAULT_NODE_NAME: &str = "unknown";

/// Default run lock marker path, relative to the working directory.
pub const DEFAULT_LOCKFILE: &str = "lockfile";

/// Default append-only run log path.
pub const DEFAULT_LOG_FILE: &str = "steamcmd.log";

/// Environment variables consulted once at startup (in `main` only).
pub const ENV_NODE_NAME: &str = "NODE_NAME";
pub const ENV_SLACK_CHANNEL: &str = "SLACK_BOT_CHANNEL";
pub const ENV_SLACK_TOKEN: &str = "SLACK_BOT_TOKEN";

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no app ids supplied")]
    NoAppIds,

    #[error("empty app id token in --app_ids")]
    EmptyAppId,

    #[error("max_workers must be at least 1")]
    ZeroWorkers,

    #[error("unknown backend '{0}' (expected 'container' or 'native')")]
    UnknownBackend(String),
}

/// Which execution backend runs SteamCMD. A configuration choice, not a
/// different API: both backends satisfy the same job contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Ephemeral Docker container per invocation (default).
    #[default]
    Container,
    /// Locally installed `steamcmd` binary.
    Native,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Container => write!(f, "container"),
            BackendKind::Native => write!(f, "native"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "container" | "docker" => Ok(BackendKind::Container),
            "native" | "local" => Ok(BackendKind::Native),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Slack notification settings. Present only when both channel and token are
/// configured; absence disables notification entirely.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub channel: String,
    pub token: String,
    /// Operator-facing label identifying this cache node.
    pub node_name: String,
}

impl SlackConfig {
    /// Assemble from raw environment values. Empty strings count as unset,
    /// matching how the variables behave in shell deployments.
    pub fn from_parts(
        channel: Option<String>,
        token: Option<String>,
        node_name: Option<String>,
    ) -> Option<Self> {
        let channel = non_empty(channel)?;
        let token = non_empty(token)?;
        let node_name = non_empty(node_name).unwrap_or_else(|| DEFAULT_NODE_NAME.to_string());
        Some(Self {
            channel,
            token,
            node_name,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Everything one orchestration run needs, constructed once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// App ids to install or update, in submission order.
    pub app_ids: Vec<AppId>,

    /// Root path; each app id gets its own subdirectory beneath it.
    pub install_root: PathBuf,

    /// Worker pool bound.
    pub max_workers: usize,

    /// Container interactive mode (`docker run -it`).
    pub interactive: bool,

    /// Execution backend.
    pub backend: BackendKind,

    /// SteamCMD container image reference (container backend only).
    pub image: String,

    /// Slack settings; `None` turns the notification sink into a no-op.
    pub slack: Option<SlackConfig>,

    /// Run lock marker path.
    pub lockfile_path: PathBuf,

    /// Append-only run log path.
    pub log_path: PathBuf,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_ids.is_empty() {
            return Err(ConfigError::NoAppIds);
        }
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}

/// Parse the `--app_ids` comma-separated token list.
pub fn parse_app_ids(raw: &str) -> Result<Vec<AppId>, ConfigError> {
    let mut ids = Vec::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(ConfigError::EmptyAppId);
        }
        ids.push(AppId::new(token));
    }
    if ids.is_empty() {
        return Err(ConfigError::NoAppIds);
    }
    Ok(ids)
}
