use std::time::Instant;

use crate::jobs::model::{AudioRecord, FrameRecord, Job, VideoMetadata};

use super::error::PipelineWarning;

/// Per-run state threaded through the stages.
pub struct PipelineContext {
    // Input snapshot taken when the run started
    pub job: Job,
    pub started: Instant,

    // Metadata stage result, guaranteed Some once that stage succeeds
    pub metadata: Option<VideoMetadata>,

    // Frames stage result
    pub frames: Vec<FrameRecord>,
    pub failed_frame_uploads: usize,

    // Audio stage result
    pub audio: Option<AudioRecord>,
    pub audio_extracted: bool,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            started: Instant::now(),
            metadata: None,
            frames: Vec::new(),
            failed_frame_uploads: 0,
            audio: None,
            audio_extracted: false,
            warnings: Vec::new(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job.id
    }
}
