//! Test harness for isolated job manager runs.
//!
//! `TestHarness` wires a real `JobManager` and `Pipeline` to the fakes in
//! `fakes.rs`, with scratch space inside a private temp directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use pitch_video::jobs::{Job, JobManager, JobOptions, JobRegistry};
use pitch_video::pipeline::{Pipeline, PipelineServices};

use super::fakes::{FakeMedia, FakeVideo, Gate, MemoryStore, RecordingDiagnostics};

const WAIT_LIMIT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(5);

pub struct TestHarness {
    temp_dir: TempDir,
    pub scratch_root: PathBuf,
    pub media: Arc<FakeMedia>,
    pub store: Arc<MemoryStore>,
    pub diagnostics: Arc<RecordingDiagnostics>,
    pub gate: Option<Arc<Gate>>,
    pub manager: JobManager,
}

impl TestHarness {
    /// Harness with the default limit of 3 and default job options.
    pub fn new() -> Self {
        Self::build(3, JobOptions::default(), false)
    }

    /// Harness whose samplers block until `gate.release` is called.
    pub fn gated(max_concurrent: usize) -> Self {
        Self::build(max_concurrent, JobOptions::default(), true)
    }

    pub fn with_options(options: JobOptions) -> Self {
        Self::build(3, options, false)
    }

    fn build(max_concurrent: usize, defaults: JobOptions, gated: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let scratch_root = temp_dir.path().join("scratch");
        std::fs::create_dir_all(&scratch_root).expect("Failed to create scratch root");

        let gate = gated.then(|| Arc::new(Gate::closed()));
        let media = Arc::new(FakeMedia::new(gate.clone()));
        let store = Arc::new(MemoryStore::new());
        let diagnostics = Arc::new(RecordingDiagnostics::default());

        let registry = Arc::new(JobRegistry::new());
        let pipeline = Arc::new(Pipeline::new(
            registry,
            PipelineServices {
                probe: media.clone(),
                sampler: media.clone(),
                transcoder: media.clone(),
                store: store.clone(),
                diagnostics: diagnostics.clone(),
                scratch_root: Some(scratch_root.clone()),
            },
        ));
        let manager = JobManager::new(pipeline, defaults, max_concurrent);

        Self {
            temp_dir,
            scratch_root,
            media,
            store,
            diagnostics,
            gate,
            manager,
        }
    }

    pub fn add_video(&self, source: &str, video: FakeVideo) {
        self.media.add(source, video);
    }

    pub fn submit(&self, source: &str) -> Job {
        self.manager.submit(source, None).expect("submission rejected")
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_deref().expect("harness was not built gated")
    }

    /// Polls until the job is completed or failed.
    pub async fn wait_for_terminal(&self, id: &str) -> Job {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        loop {
            let job = self.manager.require(id).expect("job vanished");
            if job.is_finished() {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} stuck in {:?} at {}%",
                id,
                job.status,
                job.progress
            );
            tokio::time::sleep(POLL).await;
        }
    }

    /// Polls until exactly `count` jobs hold a concurrency slot.
    pub async fn wait_for_active(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        while self.manager.active_jobs() != count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "active jobs stuck at {}, wanted {}",
                self.manager.active_jobs(),
                count
            );
            tokio::time::sleep(POLL).await;
        }
    }

    /// Polls until `count` samplers are parked at the gate.
    pub async fn wait_for_gate(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        while self.gate().waiting() != count {
            assert!(
                tokio::time::Instant::now() < deadline,
                "{} samplers waiting, wanted {}",
                self.gate().waiting(),
                count
            );
            tokio::time::sleep(POLL).await;
        }
    }

    /// Entries left under the scratch root.
    pub fn scratch_entries(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.scratch_root)
            .expect("scratch root missing")
            .map(|entry| entry.expect("bad dir entry").path())
            .collect()
    }
}
