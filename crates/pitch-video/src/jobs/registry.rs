//! In-memory job registry.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::error::JobError;
use crate::jobs::model::{Job, JobStatus};

/// Number of registered jobs in each status.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Queued => self.queued,
            JobStatus::Processing => self.processing,
            JobStatus::Completed => self.completed,
            JobStatus::Failed => self.failed,
        }
    }

    fn bump(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}

/// Process-wide store of job records keyed by job id.
///
/// Every mutation copies the stored record, edits the copy and swaps it back
/// in under the write lock, so readers only ever see whole records. Nothing
/// here awaits; lock hold times are a map operation plus one clone.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Job>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Job>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Stores a job, replacing any record with the same id.
    pub fn insert(&self, job: Job) {
        self.write().insert(job.id.clone(), job);
    }

    /// Returns a snapshot of the job. It is not kept current.
    pub fn get(&self, id: &str) -> Option<Job> {
        self.read().get(id).cloned()
    }

    pub fn require(&self, id: &str) -> Result<Job, JobError> {
        self.get(id).ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Applies `f` to a copy of the record and stores the copy.
    ///
    /// Returns the updated snapshot, or `None` if the id is unknown.
    pub fn update<F>(&self, id: &str, f: F) -> Option<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.write();
        let mut next = jobs.get(id)?.clone();
        f(&mut next);
        jobs.insert(id.to_string(), next.clone());
        Some(next)
    }

    /// Returns jobs newest first, optionally restricted to one status.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        let mut result: Vec<Job> = self
            .read()
            .values()
            .filter(|job| status.map_or(true, |s| job.status == s))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }

    /// Removes terminal jobs that finished at least `max_age` ago.
    ///
    /// Queued and processing jobs are never removed. A zero age removes every
    /// terminal job.
    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        let now = Utc::now();
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|_, job| {
            if !job.is_finished() {
                return true;
            }
            let finished_at = job.completed_at.unwrap_or(job.created_at);
            // Clock skew can make the age negative; treat that as brand new.
            let age = now
                .signed_duration_since(finished_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            age < max_age
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            log::debug!("Evicted {} finished jobs", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for job in self.read().values() {
            counts.bump(job.status);
        }
        counts
    }
}
