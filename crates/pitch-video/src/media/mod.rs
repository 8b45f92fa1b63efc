//! Capabilities the pipeline needs from an external media tool.
//!
//! The pipeline only talks to these traits. [`FfmpegToolkit`] is the
//! production implementation; tests substitute fakes.

pub mod ffmpeg;
pub mod progress;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MediaError;
use crate::jobs::model::{AudioFormat, AudioQuality, FrameResolution};

pub use ffmpeg::FfmpegToolkit;

/// Receives tool completion as a percentage, 0.0-100.0.
pub type ToolProgress<'a> = &'a (dyn Fn(f64) + Send + Sync);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

/// One stream as reported by the probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamInfo {
    pub kind: StreamKind,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Rational frame rate exactly as reported, e.g. `"30000/1001"`.
    pub frame_rate: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub duration_secs: Option<f64>,
}

impl StreamInfo {
    pub fn video(codec: &str, width: u32, height: u32, frame_rate: &str) -> Self {
        Self {
            kind: StreamKind::Video,
            codec_name: Some(codec.to_string()),
            width: Some(width),
            height: Some(height),
            frame_rate: Some(frame_rate.to_string()),
            sample_rate: None,
            channels: None,
            duration_secs: None,
        }
    }

    pub fn audio(codec: &str, sample_rate: u32, channels: u32) -> Self {
        Self {
            kind: StreamKind::Audio,
            codec_name: Some(codec.to_string()),
            width: None,
            height: None,
            frame_rate: None,
            sample_rate: Some(sample_rate),
            channels: Some(channels),
            duration_secs: None,
        }
    }
}

/// Container-level facts plus every stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProbeOutput {
    pub duration_secs: Option<f64>,
    pub format_name: Option<String>,
    pub size_bytes: Option<u64>,
    pub bit_rate: Option<u64>,
    pub streams: Vec<StreamInfo>,
}

impl ProbeOutput {
    pub fn video_stream(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == StreamKind::Video)
    }

    pub fn audio_stream(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind == StreamKind::Audio)
    }
}

/// Parameters for sampling still frames out of a video.
#[derive(Debug, Clone)]
pub struct FrameRequest<'a> {
    pub source: &'a str,
    pub interval_secs: f64,
    /// JPEG quality, 1-100.
    pub quality: u8,
    pub resolution: Option<FrameResolution>,
    pub duration_secs: f64,
    /// Upper bound on files written.
    pub max_frames: u64,
    /// Directory the frames are written into, as `frame_NNNNN.jpg`.
    pub output_dir: &'a Path,
}

/// Encoder settings derived from the requested format and quality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioEncoding {
    pub format: AudioFormat,
    pub codec: &'static str,
    /// e.g. `"128k"`; only set for lossy formats.
    pub bitrate: Option<&'static str>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

impl AudioEncoding {
    pub fn select(format: AudioFormat, quality: AudioQuality) -> Self {
        match format {
            AudioFormat::Mp3 => Self {
                format,
                codec: "libmp3lame",
                bitrate: Some(match quality {
                    AudioQuality::Low => "64k",
                    AudioQuality::Medium => "128k",
                    AudioQuality::High => "192k",
                }),
                sample_rate: None,
                channels: None,
            },
            AudioFormat::Wav => Self {
                format,
                codec: "pcm_s16le",
                bitrate: None,
                sample_rate: Some(match quality {
                    AudioQuality::Low => 16_000,
                    AudioQuality::Medium => 22_050,
                    AudioQuality::High => 44_100,
                }),
                channels: Some(1),
            },
        }
    }

    /// Sample rate to record when the extracted file cannot be re-probed.
    pub fn fallback_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(44_100)
    }

    pub fn fallback_channels(&self) -> u32 {
        self.channels.unwrap_or(2)
    }

    pub fn content_type(&self) -> String {
        mime_guess::from_ext(self.format.extension())
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// Parameters for extracting the audio track into one file.
#[derive(Debug, Clone)]
pub struct AudioRequest<'a> {
    pub source: &'a str,
    pub encoding: &'a AudioEncoding,
    pub duration_secs: f64,
    pub output_path: &'a Path,
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, source: &str) -> Result<ProbeOutput, MediaError>;
}

#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Writes frames into `request.output_dir`. Reports 0-100 as it goes.
    async fn extract_frames(
        &self,
        request: &FrameRequest<'_>,
        progress: ToolProgress<'_>,
    ) -> Result<(), MediaError>;
}

#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Writes exactly one file at `request.output_path`.
    async fn extract_audio(
        &self,
        request: &AudioRequest<'_>,
        progress: ToolProgress<'_>,
    ) -> Result<(), MediaError>;
}
