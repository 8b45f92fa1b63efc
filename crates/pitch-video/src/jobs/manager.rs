//! Admission control and the public job API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;

use crate::config::Config;
use crate::error::JobError;
use crate::jobs::model::{Job, JobOptions, JobStatus};
use crate::jobs::registry::{JobRegistry, StatusCounts};
use crate::pipeline::Pipeline;
use crate::sanitize;

/// Snapshot of the manager's load.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total_jobs: usize,
    pub by_status: StatusCounts,
    pub active_jobs: usize,
    pub max_concurrent: usize,
}

/// One admitted job's claim on the concurrency budget.
///
/// Released on drop, which happens after the pipeline has written the
/// terminal state, or during unwinding if the run task itself panics.
struct ActiveSlot {
    active: Arc<AtomicUsize>,
}

impl ActiveSlot {
    fn try_acquire(active: &Arc<AtomicUsize>, max: usize) -> Result<Self, JobError> {
        active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < max).then_some(current + 1)
            })
            .map(|_| Self {
                active: Arc::clone(active),
            })
            .map_err(|current| JobError::Capacity { active: current, max })
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct JobManager {
    registry: Arc<JobRegistry>,
    pipeline: Arc<Pipeline>,
    defaults: JobOptions,
    max_concurrent: usize,
    active: Arc<AtomicUsize>,
}

impl JobManager {
    /// Production constructor.
    pub fn from_config(config: &Config) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let pipeline = Arc::new(Pipeline::from_config(config, registry));
        Self::new(pipeline, config.job_options(), config.max_concurrent_jobs)
    }

    /// Shares the pipeline's registry.
    pub fn new(pipeline: Arc<Pipeline>, defaults: JobOptions, max_concurrent: usize) -> Self {
        Self {
            registry: Arc::clone(pipeline.registry()),
            pipeline,
            defaults,
            max_concurrent,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Admits a job and starts it in the background.
    ///
    /// Returns the `queued` record immediately. Fails synchronously when the
    /// input is malformed, when no tokio runtime is running, or when
    /// `max_concurrent` jobs are already active. Nothing is queued past the
    /// limit.
    pub fn submit(&self, source: &str, options: Option<JobOptions>) -> Result<Job, JobError> {
        let options = options.unwrap_or_else(|| self.defaults.clone());
        validate_submission(source, &options)?;

        let runtime = Handle::try_current().map_err(|_| JobError::RuntimeUnavailable)?;
        let slot = ActiveSlot::try_acquire(&self.active, self.max_concurrent)?;

        let trace_id = self.pipeline.diagnostics().generate_request_id();
        let job = Job::new(source, options, trace_id);
        self.registry.insert(job.clone());

        tracing::info!(
            job_id = %job.id,
            trace_id = %job.trace_id,
            source = %sanitize::redact_source(source),
            "Job queued"
        );

        let pipeline = Arc::clone(&self.pipeline);
        let job_id = job.id.clone();
        runtime.spawn(async move {
            let _slot = slot;
            pipeline.run(job_id).await;
        });

        Ok(job)
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.registry.get(id)
    }

    pub fn require(&self, id: &str) -> Result<Job, JobError> {
        self.registry.require(id)
    }

    /// Jobs newest first, optionally restricted to one status.
    pub fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        self.registry.list(status)
    }

    pub fn evict_older_than(&self, max_age: Duration) -> usize {
        self.registry.evict_older_than(max_age)
    }

    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> JobStats {
        JobStats {
            total_jobs: self.registry.len(),
            by_status: self.registry.status_counts(),
            active_jobs: self.active_jobs(),
            max_concurrent: self.max_concurrent,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn default_options(&self) -> &JobOptions {
        &self.defaults
    }
}

fn validate_submission(source: &str, options: &JobOptions) -> Result<(), JobError> {
    let invalid = |message: String| Err(JobError::InvalidInput(message));

    if source.trim().is_empty() {
        return invalid("source reference is empty".to_string());
    }
    let interval = options.frame_interval_secs;
    if !interval.is_finite() || interval <= 0.0 {
        return invalid(format!("frame interval must be positive, got {}", interval));
    }
    if !(1..=100).contains(&options.frame_quality) {
        return invalid(format!(
            "frame quality must be between 1 and 100, got {}",
            options.frame_quality
        ));
    }
    if let Some(res) = options.frame_resolution {
        if res.width == 0 || res.height == 0 {
            return invalid(format!(
                "frame resolution must be positive, got {}x{}",
                res.width, res.height
            ));
        }
    }
    Ok(())
}
