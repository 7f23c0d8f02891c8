//! Cancellation registry for generation jobs
//!
//! Cooperative cancellation with owner verification: only the user who
//! submitted a batch may stop it. `JobGuard` removes the entry on drop so
//! finished jobs never linger in the registry.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Global cancellation registry singleton
pub static CANCELLATION: Lazy<CancellationRegistry> = Lazy::new(CancellationRegistry::default);

/// Tracks one running job's token and the user who owns it
struct JobEntry {
    token: CancellationToken,
    owner_id: Uuid,
}

/// RAII guard returned by `register`. Hold it for the whole batch run; the
/// registry entry disappears when it drops.
pub struct JobGuard {
    job_id: Uuid,
    token: CancellationToken,
    registry: CancellationRegistry,
}

impl JobGuard {
    /// Token to hand to the batch runner. Cancelling the job through the
    /// registry trips this same token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.job_id);
    }
}

/// Error type for cancel operations
#[derive(Debug, PartialEq, Eq)]
pub enum CancelError {
    /// Caller is not the owner of this job
    NotOwner,
}

/// Thread-safe registry of in-flight jobs. Every operation is a single
/// HashMap access under one mutex.
#[derive(Clone, Default)]
pub struct CancellationRegistry {
    jobs: Arc<Mutex<HashMap<Uuid, JobEntry>>>,
}

impl CancellationRegistry {
    /// Register a job as running on behalf of `owner_id`. Keep the returned
    /// guard alive while processing; dropping it unregisters the job.
    pub fn register(&self, job_id: Uuid, owner_id: Uuid) -> JobGuard {
        let token = CancellationToken::new();
        self.jobs.lock().insert(
            job_id,
            JobEntry {
                token: token.clone(),
                owner_id,
            },
        );
        JobGuard {
            job_id,
            token,
            registry: self.clone(),
        }
    }

    /// Cancel a job on behalf of `caller_id`.
    ///
    /// Returns:
    /// - `Ok(true)`  job found and cancelled
    /// - `Ok(false)` job not registered (finished, or still queued)
    /// - `Err(NotOwner)` job belongs to a different user
    pub fn cancel(&self, job_id: &Uuid, caller_id: Uuid) -> Result<bool, CancelError> {
        let jobs = self.jobs.lock();
        match jobs.get(job_id) {
            Some(entry) => {
                if entry.owner_id != caller_id {
                    return Err(CancelError::NotOwner);
                }
                entry.token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Park an already-cancelled token for a job that is still in the queue.
    /// The processor's pickup check sees it and skips the job outright.
    pub fn pre_cancel(&self, job_id: Uuid, caller_id: Uuid) {
        let token = CancellationToken::new();
        token.cancel();
        self.jobs.lock().insert(
            job_id,
            JobEntry {
                token,
                owner_id: caller_id,
            },
        );
    }

    /// Whether a job has been cancelled. Hot path: one lookup under the lock.
    pub fn is_cancelled(&self, job_id: &Uuid) -> bool {
        self.jobs
            .lock()
            .get(job_id)
            .map_or(false, |e| e.token.is_cancelled())
    }

    /// Drop a job's entry. `JobGuard::drop` calls this automatically; the
    /// processor also calls it after consuming a pre-cancel marker.
    pub fn remove(&self, job_id: &Uuid) {
        self.jobs.lock().remove(job_id);
    }

    #[cfg(test)]
    fn contains(&self, job_id: &Uuid) -> bool {
        self.jobs.lock().contains_key(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: fresh registry per test so the global singleton stays out of it
    fn new_registry() -> CancellationRegistry {
        CancellationRegistry::default()
    }

    // ── 1.1 ──────────────────────────────────────────────────────────────
    #[test]
    fn test_registered_job_starts_uncancelled() {
        let reg = new_registry();
        let job_id = Uuid::new_v4();

        let guard = reg.register(job_id, Uuid::new_v4());

        assert!(!reg.is_cancelled(&job_id));
        assert!(!guard.token().is_cancelled());
    }

    // ── 1.2 ──────────────────────────────────────────────────────────────
    #[test]
    fn test_owner_cancel_trips_the_guard_token() {
        let reg = new_registry();
        let job_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();

        let guard = reg.register(job_id, owner_id);
        let token = guard.token();

        assert_eq!(reg.cancel(&job_id, owner_id), Ok(true));
        assert!(reg.is_cancelled(&job_id));
        // The token handed to the batch runner observes the cancel.
        assert!(token.is_cancelled());
    }

    // ── 1.3 ──────────────────────────────────────────────────────────────
    #[test]
    fn test_cancel_by_non_owner_is_rejected() {
        let reg = new_registry();
        let job_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();

        let _guard = reg.register(job_id, owner_id);

        assert_eq!(reg.cancel(&job_id, other_id), Err(CancelError::NotOwner));
        // Job keeps running.
        assert!(!reg.is_cancelled(&job_id));
    }

    // ── 1.4 ──────────────────────────────────────────────────────────────
    #[test]
    fn test_cancel_unknown_job_returns_false() {
        let reg = new_registry();

        let result = reg.cancel(&Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(result, Ok(false));
    }

    // ── 1.5 ──────────────────────────────────────────────────────────────
    #[test]
    fn test_pre_cancel_marks_queued_job() {
        let reg = new_registry();
        let job_id = Uuid::new_v4();

        reg.pre_cancel(job_id, Uuid::new_v4());

        assert!(reg.is_cancelled(&job_id));
    }

    // ── 1.6 ──────────────────────────────────────────────────────────────
    #[test]
    fn test_guard_drop_unregisters_job() {
        let reg = new_registry();
        let job_id = Uuid::new_v4();

        {
            let _guard = reg.register(job_id, Uuid::new_v4());
            assert!(reg.contains(&job_id));
        }

        assert!(!reg.contains(&job_id));
    }
}
