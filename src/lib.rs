//! Depot Lane - Steam depot cache updater
//!
//! This crate implements Depot Lane, a host-side orchestrator that keeps a
//! cache node's Steam depots fresh by driving SteamCMD once per app id under
//! a bounded worker pool, guarded by a single-run lockfile, with Slack
//! failure alerts.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod job;
pub mod lock;
pub mod mock;
pub mod notify;
pub mod pipeline;

pub use backend::{Backend, ContainerBackend, MaintenanceError, NativeBackend};
pub use config::{BackendKind, RunConfig, SlackConfig};
pub use dispatch::Dispatcher;
pub use job::{AppId, Job, JobError, JobOutcome};
pub use lock::{LockError, RunLock};
pub use notify::{Notifier, SlackNotifier};
pub use pipeline::{LaneError, RunReport};
