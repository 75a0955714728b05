//! Test doubles for the orchestration pipeline
//!
//! [`MockBackend`] scripts refresh and install results without touching
//! Docker or SteamCMD, and records what the dispatcher asked of it.
//! [`CollectingNotifier`] captures alerts for assertions.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::backend::{Backend, CommandError, MaintenanceError};
use crate::job::{Job, JobError};
use crate::notify::Notifier;

/// Scriptable backend for tests.
#[derive(Debug, Default)]
pub struct MockBackend {
    fail_refresh: bool,
    failing_apps: HashSet<String>,
    install_delay: Option<Duration>,
    refresh_calls: AtomicUsize,
    installed: Mutex<Vec<(String, PathBuf)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `refresh` fail with a scripted pull error.
    pub fn failing_refresh(mut self) -> Self {
        self.fail_refresh = true;
        self
    }

    /// Make installs of `app_id` fail with an injected error.
    pub fn failing_app(mut self, app_id: &str) -> Self {
        self.failing_apps.insert(app_id.to_string());
        self
    }

    /// Hold each install for `delay`, to exercise pool concurrency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.install_delay = Some(delay);
        self
    }

    /// Number of times `refresh` was invoked.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// `(app_id, install_dir)` pairs in execution order.
    pub fn installed(&self) -> Vec<(String, PathBuf)> {
        self.installed
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// High-water mark of concurrently running installs.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn refresh(&self) -> Result<(), MaintenanceError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh {
            return Err(MaintenanceError::from(CommandError::Exit {
                tool: "docker pull".to_string(),
                code: 1,
                stderr: "injected pull failure".to_string(),
            }));
        }
        Ok(())
    }

    fn install(&self, job: &Job) -> Result<(), JobError> {
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.install_delay {
            std::thread::sleep(delay);
        }
        if let Ok(mut records) = self.installed.lock() {
            records.push((job.app_id.as_str().to_string(), job.install_dir.clone()));
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.failing_apps.contains(job.app_id.as_str()) {
            return Err(JobError {
                app_id: job.app_id.clone(),
                detail: "injected install failure".to_string(),
            });
        }
        Ok(())
    }
}

/// Notifier that records every alert.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl CollectingNotifier {
    /// `(subject, detail)` pairs in delivery order.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, subject: &str, detail: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((subject.to_string(), detail.to_string()));
        }
    }
}
