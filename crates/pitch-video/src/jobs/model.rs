//! Job records and the results they carry.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::progress::Stage;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Queued,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    /// Completed and failed jobs never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Container for the extracted audio track.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,
    #[default]
    Medium,
    High,
}

/// Target size for sampled frames. `None` on the options keeps the source size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameResolution {
    pub width: u32,
    pub height: u32,
}

/// Per-job processing options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct JobOptions {
    /// Seconds between sampled frames.
    pub frame_interval_secs: f64,
    /// JPEG quality, 1 (worst) to 100 (best).
    pub frame_quality: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_resolution: Option<FrameResolution>,
    pub audio_format: AudioFormat,
    pub audio_quality: AudioQuality,
    /// Wall-clock budget for the whole run.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "duration_secs")]
    pub timeout: Option<Duration>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            frame_interval_secs: 5.0,
            frame_quality: 80,
            frame_resolution: None,
            audio_format: AudioFormat::default(),
            audio_quality: AudioQuality::default(),
            timeout: None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        match secs.filter(|s| s.is_finite() && *s > 0.0) {
            Some(s) => Duration::try_from_secs_f64(s)
                .map(Some)
                .map_err(|e| D::Error::custom(format!("invalid timeout {}: {}", s, e))),
            None => Ok(None),
        }
    }
}

/// Container and stream facts reported by the probe stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub size_bytes: u64,
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub timestamp_secs: f64,
    pub url: String,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AudioRecord {
    /// Empty when the source has no audio stream.
    pub url: String,
    pub duration_secs: f64,
    pub format: AudioFormat,
    pub size_bytes: u64,
    pub sample_rate: u32,
    pub channels: u32,
}

impl AudioRecord {
    /// The record returned for sources without an audio stream.
    pub fn silent(duration_secs: f64, format: AudioFormat) -> Self {
        Self {
            url: String::new(),
            duration_secs,
            format,
            size_bytes: 0,
            sample_rate: 0,
            channels: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub processing_time_ms: u64,
    pub frame_count: usize,
    pub failed_frame_uploads: usize,
    pub audio_extracted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResults {
    pub frames: Vec<FrameRecord>,
    pub audio: AudioRecord,
    pub metadata: VideoMetadata,
    pub stats: ProcessingStats,
}

/// One processing request and its lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub source_reference: String,
    pub status: JobStatus,
    /// 0-100.
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ProcessingResults>,
    pub trace_id: String,
    /// Stage currently running, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    pub options: JobOptions,
}

impl Job {
    pub fn new(source_reference: &str, options: JobOptions, trace_id: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_reference: source_reference.to_string(),
            status: JobStatus::Queued,
            progress: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            results: None,
            trace_id,
            stage: None,
            options,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// `queued -> processing`.
    pub fn mark_started(&mut self) {
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
    }

    /// Raises progress, never lowering it and never past 100.
    pub fn advance_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
    }

    pub fn mark_completed(&mut self, results: ProcessingResults) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.completed_at = Some(Utc::now());
        self.error = None;
        self.results = Some(results);
        self.stage = None;
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error = Some(error);
        self.results = None;
        self.stage = None;
    }
}
