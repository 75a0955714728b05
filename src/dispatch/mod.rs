//! Bounded concurrent job dispatch
//!
//! A fixed pool of worker threads drains a shared queue of jobs; each worker
//! owns one blocking SteamCMD invocation at a time. Completions flow back to
//! the coordinator over a channel and are handled in arrival order, which is
//! non-deterministic. Every submitted app id yields exactly one outcome.
//! Failures are isolated: reported and aggregated, never a reason to cancel
//! or block sibling jobs.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use tracing::{error, info};

use crate::backend::Backend;
use crate::job::{Job, JobOutcome};
use crate::notify::Notifier;

/// Bounded worker pool for install/update jobs.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    max_workers: usize,
}

impl Dispatcher {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }

    /// Run every job to completion and return one outcome per job.
    ///
    /// Failing jobs are logged, notified, and echoed to stdout as they
    /// complete; the pool keeps draining the queue regardless. Outcome order
    /// is completion order and carries no meaning.
    pub fn run(
        &self,
        jobs: Vec<Job>,
        backend: &dyn Backend,
        notifier: &dyn Notifier,
    ) -> Vec<JobOutcome> {
        let total = jobs.len();
        if total == 0 {
            return Vec::new();
        }

        let queue = Mutex::new(VecDeque::from(jobs));
        let (outcome_tx, outcome_rx) = mpsc::channel::<JobOutcome>();
        let workers = self.max_workers.min(total);
        let mut outcomes = Vec::with_capacity(total);

        thread::scope(|scope| {
            for _ in 0..workers {
                let outcome_tx = outcome_tx.clone();
                let queue = &queue;
                scope.spawn(move || loop {
                    let job = match queue.lock() {
                        Ok(mut pending) => pending.pop_front(),
                        // A sibling panicked while holding the queue; stop
                        // pulling work and let the scope surface the panic.
                        Err(_) => None,
                    };
                    let Some(job) = job else { break };

                    info!(
                        app_id = %job.app_id,
                        install_dir = %job.install_dir.display(),
                        "installing/updating app"
                    );
                    let result = backend.install(&job);
                    let outcome = JobOutcome {
                        app_id: job.app_id.clone(),
                        result,
                    };
                    if outcome_tx.send(outcome).is_err() {
                        break;
                    }
                });
            }
            // Workers hold the only remaining senders; the drain below ends
            // when the last one exits.
            drop(outcome_tx);

            for outcome in outcome_rx.iter() {
                match &outcome.result {
                    Ok(()) => {
                        info!(app_id = %outcome.app_id, "successfully updated/installed app");
                        println!("Successfully updated/installed {}", outcome.app_id);
                    }
                    Err(err) => {
                        error!(app_id = %outcome.app_id, error = %err, "app install/update failed");
                        notifier.notify(
                            &format!("Error during installation/update of {}", outcome.app_id),
                            &err.detail,
                        );
                        println!(
                            "Error during installation/update of {}: {}",
                            outcome.app_id, err.detail
                        );
                    }
                }
                outcomes.push(outcome);
            }
        });

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_app_ids;
    use crate::mock::{CollectingNotifier, MockBackend};
    use std::collections::HashSet;
    use std::path::Path;
    use std::time::Duration;

    fn jobs_for(csv: &str) -> Vec<Job> {
        parse_app_ids(csv)
            .unwrap()
            .into_iter()
            .map(|id| Job::new(Path::new("/data/games"), id, false))
            .collect()
    }

    #[test]
    fn every_submitted_app_id_is_reported_exactly_once() {
        for workers in [1, 2, 8] {
            let backend = MockBackend::new();
            let notifier = CollectingNotifier::default();
            let outcomes =
                Dispatcher::new(workers).run(jobs_for("10,20,30,40,50"), &backend, &notifier);

            let reported: HashSet<&str> =
                outcomes.iter().map(|o| o.app_id.as_str()).collect();
            assert_eq!(outcomes.len(), 5, "workers={workers}");
            assert_eq!(
                reported,
                HashSet::from(["10", "20", "30", "40", "50"]),
                "workers={workers}"
            );
        }
    }

    #[test]
    fn failing_job_does_not_block_siblings() {
        let backend = MockBackend::new().failing_app("20");
        let notifier = CollectingNotifier::default();
        let outcomes = Dispatcher::new(2).run(jobs_for("10,20,30"), &backend, &notifier);

        assert_eq!(outcomes.len(), 3);
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.app_id.as_str())
            .collect();
        assert_eq!(failed, vec!["20"]);

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].0.contains("20"));
    }

    #[test]
    fn pool_never_exceeds_the_worker_bound() {
        let backend = MockBackend::new().with_delay(Duration::from_millis(20));
        let notifier = CollectingNotifier::default();
        let outcomes =
            Dispatcher::new(2).run(jobs_for("1,2,3,4,5,6"), &backend, &notifier);

        assert_eq!(outcomes.len(), 6);
        assert!(
            backend.max_active() <= 2,
            "observed {} concurrent installs",
            backend.max_active()
        );
    }

    #[test]
    fn empty_job_set_produces_no_outcomes() {
        let backend = MockBackend::new();
        let notifier = CollectingNotifier::default();
        let outcomes = Dispatcher::new(4).run(Vec::new(), &backend, &notifier);
        assert!(outcomes.is_empty());
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn zero_worker_request_is_clamped_to_one() {
        let backend = MockBackend::new();
        let notifier = CollectingNotifier::default();
        let outcomes = Dispatcher::new(0).run(jobs_for("10"), &backend, &notifier);
        assert_eq!(outcomes.len(), 1);
    }
}
