use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::jobs::model::{AudioFormat, AudioQuality, FrameResolution, JobOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Upper bound on jobs that are queued or processing at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Default wall-clock budget per job; unlimited when absent.
    #[serde(default)]
    pub job_timeout_secs: Option<f64>,
    /// Parent directory for scratch space; the system temp dir when absent.
    #[serde(default)]
    pub temp_directory: Option<PathBuf>,
    #[serde(default)]
    pub frames: FramesConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_max_concurrent_jobs() -> usize {
    3
}

impl Config {
    /// Options applied to a submission that does not bring its own.
    pub fn job_options(&self) -> JobOptions {
        let frame_resolution = match (self.frames.width, self.frames.height) {
            (Some(width), Some(height)) => Some(FrameResolution { width, height }),
            _ => None,
        };
        JobOptions {
            frame_interval_secs: self.frames.interval_secs,
            frame_quality: self.frames.quality,
            frame_resolution,
            audio_format: self.audio.format,
            audio_quality: self.audio.quality,
            timeout: self
                .job_timeout_secs
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramesConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Both `width` and `height` must be set for frames to be scaled.
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

fn default_interval_secs() -> f64 {
    5.0
}

fn default_quality() -> u8 {
    80
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            quality: default_quality(),
            width: None,
            height: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub format: AudioFormat,
    #[serde(default)]
    pub quality: AudioQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_root_directory")]
    pub root_directory: PathBuf,
    /// Prefix for object URLs; `file://{root_directory}` when absent.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl StorageConfig {
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!("file://{}", self.root_directory.display()),
        }
    }
}

fn default_root_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("pitch-video")
        .join("objects")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_directory: default_root_directory(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: PathBuf,
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            ffprobe_path: default_ffprobe(),
        }
    }
}
