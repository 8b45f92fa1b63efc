//! In-process stand-ins for ffmpeg, object storage and diagnostics.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use pitch_video::diagnostics::{Diagnostics, ErrorContext};
use pitch_video::error::{MediaError, StorageError};
use pitch_video::media::{
    AudioRequest, AudioTranscoder, FrameRequest, FrameSampler, MediaProbe, ProbeOutput,
    StreamInfo, ToolProgress,
};
use pitch_video::storage::{ObjectStore, StoredObject};

/// How a fake source behaves when probed and processed.
#[derive(Debug, Clone)]
pub struct FakeVideo {
    pub duration_secs: f64,
    pub has_audio: bool,
    /// Frames the sampler writes; `None` writes as many as requested.
    pub frames_written: Option<usize>,
    /// Probe succeeds but reports no streams.
    pub corrupted: bool,
    pub panic_in_sampler: bool,
    /// Sampler never returns.
    pub hang_in_sampler: bool,
}

impl FakeVideo {
    pub fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            has_audio: true,
            frames_written: None,
            corrupted: false,
            panic_in_sampler: false,
            hang_in_sampler: false,
        }
    }

    pub fn without_audio(mut self) -> Self {
        self.has_audio = false;
        self
    }

    pub fn writing_frames(mut self, count: usize) -> Self {
        self.frames_written = Some(count);
        self
    }

    pub fn corrupted(mut self) -> Self {
        self.corrupted = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_in_sampler = true;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang_in_sampler = true;
        self
    }
}

/// Holds samplers until the test lets them through, one permit per job.
pub struct Gate {
    permits: Semaphore,
    waiting: Mutex<usize>,
}

impl Gate {
    pub fn closed() -> Self {
        Self {
            permits: Semaphore::new(0),
            waiting: Mutex::new(0),
        }
    }

    pub fn release(&self, jobs: usize) {
        self.permits.add_permits(jobs);
    }

    pub fn waiting(&self) -> usize {
        *self.waiting.lock().unwrap()
    }

    async fn pass(&self) {
        *self.waiting.lock().unwrap() += 1;
        let permit = self.permits.acquire().await.expect("gate semaphore closed");
        permit.forget();
        *self.waiting.lock().unwrap() -= 1;
    }
}

/// Fake ffprobe/ffmpeg. Unknown sources are unreachable.
pub struct FakeMedia {
    videos: Mutex<HashMap<String, FakeVideo>>,
    gate: Option<std::sync::Arc<Gate>>,
    fail_audio_reprobe: Mutex<bool>,
    /// Extracted audio files, with (sample rate, channels, duration).
    audio_outputs: Mutex<HashMap<String, (u32, u32, f64)>>,
    frame_dirs: Mutex<Vec<PathBuf>>,
    audio_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeMedia {
    pub fn new(gate: Option<std::sync::Arc<Gate>>) -> Self {
        Self {
            videos: Mutex::new(HashMap::new()),
            gate,
            fail_audio_reprobe: Mutex::new(false),
            audio_outputs: Mutex::new(HashMap::new()),
            frame_dirs: Mutex::new(Vec::new()),
            audio_dirs: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, source: &str, video: FakeVideo) {
        self.videos
            .lock()
            .unwrap()
            .insert(source.to_string(), video);
    }

    pub fn fail_audio_reprobe(&self) {
        *self.fail_audio_reprobe.lock().unwrap() = true;
    }

    /// Scratch directories the sampler was asked to write into.
    pub fn frame_dirs(&self) -> Vec<PathBuf> {
        self.frame_dirs.lock().unwrap().clone()
    }

    pub fn audio_dirs(&self) -> Vec<PathBuf> {
        self.audio_dirs.lock().unwrap().clone()
    }

    fn video(&self, source: &str) -> Option<FakeVideo> {
        self.videos.lock().unwrap().get(source).cloned()
    }
}

fn video_probe(video: &FakeVideo) -> ProbeOutput {
    let mut streams = Vec::new();
    if !video.corrupted {
        streams.push(StreamInfo::video("h264", 1920, 1080, "30/1"));
        if video.has_audio {
            streams.push(StreamInfo::audio("aac", 48_000, 2));
        }
    }
    ProbeOutput {
        duration_secs: Some(video.duration_secs),
        format_name: Some("mov,mp4,m4a,3gp,3g2,mj2".to_string()),
        size_bytes: Some(4_000_000),
        bit_rate: Some(1_000_000),
        streams,
    }
}

#[async_trait]
impl MediaProbe for FakeMedia {
    async fn probe(&self, source: &str) -> Result<ProbeOutput, MediaError> {
        let extracted = self.audio_outputs.lock().unwrap().get(source).copied();
        if let Some((sample_rate, channels, duration)) = extracted {
            if *self.fail_audio_reprobe.lock().unwrap() {
                return Err(MediaError::ToolFailed {
                    tool: "ffprobe".to_string(),
                    message: "invalid data found when processing input".to_string(),
                });
            }
            return Ok(ProbeOutput {
                duration_secs: Some(duration),
                format_name: Some("mp3".to_string()),
                size_bytes: None,
                bit_rate: None,
                streams: vec![StreamInfo::audio("mp3", sample_rate, channels)],
            });
        }

        match self.video(source) {
            Some(video) => Ok(video_probe(&video)),
            None => Err(MediaError::Unreachable(format!(
                "{}: Server returned 404 Not Found",
                source
            ))),
        }
    }
}

#[async_trait]
impl FrameSampler for FakeMedia {
    async fn extract_frames(
        &self,
        request: &FrameRequest<'_>,
        progress: ToolProgress<'_>,
    ) -> Result<(), MediaError> {
        self.frame_dirs
            .lock()
            .unwrap()
            .push(request.output_dir.to_path_buf());
        let video = self
            .video(request.source)
            .ok_or_else(|| MediaError::Unreachable(request.source.to_string()))?;

        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        if video.panic_in_sampler {
            panic!("sampler crashed");
        }
        if video.hang_in_sampler {
            std::future::pending::<()>().await;
        }

        let count = video
            .frames_written
            .unwrap_or(request.max_frames as usize);
        for i in 0..count {
            let path = request.output_dir.join(format!("frame_{:05}.jpg", i + 1));
            std::fs::write(path, format!("jpeg-{}", i)).map_err(|e| MediaError::ToolFailed {
                tool: "ffmpeg".to_string(),
                message: e.to_string(),
            })?;
            progress((i + 1) as f64 / count as f64 * 100.0);
        }
        progress(100.0);
        Ok(())
    }
}

#[async_trait]
impl AudioTranscoder for FakeMedia {
    async fn extract_audio(
        &self,
        request: &AudioRequest<'_>,
        progress: ToolProgress<'_>,
    ) -> Result<(), MediaError> {
        if let Some(parent) = request.output_path.parent() {
            self.audio_dirs.lock().unwrap().push(parent.to_path_buf());
        }
        progress(50.0);
        std::fs::write(request.output_path, vec![7_u8; 2048]).map_err(|e| {
            MediaError::ToolFailed {
                tool: "ffmpeg".to_string(),
                message: e.to_string(),
            }
        })?;
        let encoding = request.encoding;
        self.audio_outputs.lock().unwrap().insert(
            request.output_path.to_string_lossy().into_owned(),
            (
                encoding.sample_rate.unwrap_or(44_100),
                encoding.channels.unwrap_or(2),
                request.duration_secs,
            ),
        );
        progress(100.0);
        Ok(())
    }
}

/// Object store kept in memory, with per-key failure injection.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    failing: Mutex<HashSet<String>>,
    fail_suffix: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_key(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    /// Fails every key ending in `suffix`.
    pub fn fail_keys_ending_with(&self, suffix: &str) {
        *self.fail_suffix.lock().unwrap() = Some(suffix.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, content_type)| content_type.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let suffix_fails = self
            .fail_suffix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|suffix| key.ends_with(suffix));
        if suffix_fails || self.failing.lock().unwrap().contains(key) {
            return Err(StorageError::Rejected(format!("injected failure for {}", key)));
        }

        let size_bytes = bytes.len() as u64;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(StoredObject {
            key: key.to_string(),
            url: format!("mem://bucket/{}", key),
            size_bytes,
        })
    }
}

/// Records every reported error and hands out sequential trace ids.
#[derive(Default)]
pub struct RecordingDiagnostics {
    errors: Mutex<Vec<(String, ErrorContext)>>,
    next_id: Mutex<u64>,
}

impl RecordingDiagnostics {
    pub fn errors(&self) -> Vec<(String, ErrorContext)> {
        self.errors.lock().unwrap().clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn log_error(&self, error: &(dyn Error + 'static), context: &ErrorContext) {
        self.errors
            .lock()
            .unwrap()
            .push((error.to_string(), context.clone()));
    }

    fn generate_request_id(&self) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("trace-{}", next)
    }
}
