use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::jobs::model::{FrameRecord, JobOptions, VideoMetadata};
use crate::media::{FrameRequest, FrameSampler};
use crate::storage::{ObjectStore, StoredObject};

use super::error::{PipelineError, PipelineWarning};
use super::progress::{ProgressReporter, SplitProgress};
use super::scratch::ScratchDir;

const FRAME_CONTENT_TYPE: &str = "image/jpeg";

/// What the frames stage produced.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    pub frames: Vec<FrameRecord>,
    pub failed_uploads: usize,
    pub warnings: Vec<PipelineWarning>,
}

/// Number of frames a video of `duration_secs` yields at one per `interval_secs`.
pub fn expected_frame_count(duration_secs: f64, interval_secs: f64) -> u64 {
    if !duration_secs.is_finite() || !interval_secs.is_finite() || interval_secs <= 0.0 {
        return 0;
    }
    (duration_secs / interval_secs).floor().max(0.0) as u64
}

pub fn frame_key(job_id: &str, index: usize) -> String {
    format!("jobs/{}/frames/frame_{:05}.jpg", job_id, index)
}

/// Frames stage: sample stills into a scratch directory, then upload each.
pub struct FrameExtractor {
    sampler: Arc<dyn FrameSampler>,
    store: Arc<dyn ObjectStore>,
    scratch_root: Option<PathBuf>,
}

impl FrameExtractor {
    pub fn new(
        sampler: Arc<dyn FrameSampler>,
        store: Arc<dyn ObjectStore>,
        scratch_root: Option<PathBuf>,
    ) -> Self {
        Self {
            sampler,
            store,
            scratch_root,
        }
    }

    pub async fn run(
        &self,
        job_id: &str,
        source: &str,
        metadata: &VideoMetadata,
        options: &JobOptions,
        progress: &dyn ProgressReporter,
    ) -> Result<FrameOutcome, PipelineError> {
        let split = SplitProgress::new(progress);
        let interval = options.frame_interval_secs;

        let expected = expected_frame_count(metadata.duration_secs, interval);
        if expected == 0 {
            log::info!(
                "Video is shorter than one {}s interval ({:.2}s), no frames to extract",
                interval,
                metadata.duration_secs
            );
            split.finished();
            return Ok(FrameOutcome::default());
        }

        let scratch = ScratchDir::create(self.scratch_root.as_deref(), "frames-")
            .await
            .map_err(|e| PipelineError::frames("failed to create scratch directory", e))?;

        let request = FrameRequest {
            source,
            interval_secs: interval,
            quality: options.frame_quality,
            resolution: options.frame_resolution,
            duration_secs: metadata.duration_secs,
            max_frames: expected,
            output_dir: scratch.path(),
        };
        let report = |percent: f64| split.tool_percent(percent);
        self.sampler
            .extract_frames(&request, &report)
            .await
            .map_err(|e| PipelineError::frames("sampling failed", e))?;

        let files = list_frame_files(scratch.path())?;
        if files.is_empty() {
            return Err(PipelineError::FrameExtraction(format!(
                "tool produced no frames, expected {}",
                expected
            )));
        }
        log::debug!("Sampled {} of {} expected frames", files.len(), expected);

        let (width, height) = match options.frame_resolution {
            Some(res) => (res.width, res.height),
            None => (metadata.width, metadata.height),
        };

        let mut outcome = FrameOutcome::default();
        let total = files.len();
        for (index, path) in files.iter().enumerate() {
            let key = frame_key(job_id, index);
            match self.upload_frame(path, &key).await {
                Ok(stored) => outcome.frames.push(FrameRecord {
                    timestamp_secs: index as f64 * interval,
                    url: stored.url,
                    size_bytes: stored.size_bytes,
                    width,
                    height,
                }),
                Err(error) => {
                    let warning = PipelineWarning::FrameUploadFailed { index, key, error };
                    log::warn!("Skipping frame: {}", warning);
                    outcome.failed_uploads += 1;
                    outcome.warnings.push(warning);
                }
            }
            split.uploads(index + 1, total);
        }

        if let Err(e) = scratch.close() {
            let warning = PipelineWarning::ScratchCleanupFailed {
                error: e.to_string(),
            };
            log::warn!("{}", warning);
            outcome.warnings.push(warning);
        }

        Ok(outcome)
    }

    async fn upload_frame(&self, path: &Path, key: &str) -> Result<StoredObject, String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        self.store
            .put(bytes, key, FRAME_CONTENT_TYPE)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Lists `*.jpg` files directly inside `dir`, in file name order.
fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| PipelineError::frames("failed to list frames", e))?;
        let is_jpeg = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"));
        if entry.file_type().is_file() && is_jpeg {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
