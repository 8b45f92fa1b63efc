//! ffprobe / ffmpeg backed media capabilities.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::error::MediaError;
use crate::sanitize;

use super::progress::ProgressTracker;
use super::{
    AudioRequest, AudioTranscoder, FrameRequest, FrameSampler, MediaProbe, ProbeOutput,
    StreamInfo, StreamKind, ToolProgress,
};

/// stderr fragments that mean the input could not be opened at all.
const UNREACHABLE_MARKERS: &[&str] = &[
    "No such file or directory",
    "Connection refused",
    "Connection timed out",
    "Server returned 404",
    "Server returned 403",
    "Name or service not known",
    "Failed to resolve hostname",
];

/// Number of trailing stderr lines kept in error messages.
const STDERR_TAIL_LINES: usize = 5;

#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegToolkit {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Runs ffmpeg with progress reporting on stdout.
    ///
    /// The child is killed if this future is dropped before it exits.
    async fn run_ffmpeg(
        &self,
        args: Vec<OsString>,
        source: &str,
        duration_secs: f64,
        progress: ToolProgress<'_>,
    ) -> Result<(), MediaError> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-nostats", "-progress", "pipe:1", "-y"])
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| MediaError::Spawn {
            tool: "ffmpeg".to_string(),
            source: e,
        })?;

        // Drain stderr concurrently so a chatty ffmpeg never blocks on a full pipe.
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let mut reader = BufReader::new(stderr);
                if let Err(e) = reader.read_to_string(&mut text).await {
                    log::debug!("Failed to read ffmpeg stderr: {}", e);
                }
                text
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut tracker = ProgressTracker::new(duration_secs);
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(percent) = tracker.feed(&line) {
                    progress(percent);
                }
            }
        }

        let status = child.wait().await.map_err(|e| MediaError::Spawn {
            tool: "ffmpeg".to_string(),
            source: e,
        })?;

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            progress(100.0);
            Ok(())
        } else {
            Err(classify_failure("ffmpeg", source, &stderr))
        }
    }
}

#[async_trait]
impl MediaProbe for FfmpegToolkit {
    async fn probe(&self, source: &str) -> Result<ProbeOutput, MediaError> {
        log::debug!("Probing {}", sanitize::redact_source(source));

        let output = Command::new(&self.ffprobe)
            .args(probe_args(source))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Spawn {
                tool: "ffprobe".to_string(),
                source: e,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure("ffprobe", source, &stderr));
        }

        parse_probe_json(&output.stdout)
    }
}

#[async_trait]
impl FrameSampler for FfmpegToolkit {
    async fn extract_frames(
        &self,
        request: &FrameRequest<'_>,
        progress: ToolProgress<'_>,
    ) -> Result<(), MediaError> {
        let args = frame_args(request);
        self.run_ffmpeg(args, request.source, request.duration_secs, progress)
            .await
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegToolkit {
    async fn extract_audio(
        &self,
        request: &AudioRequest<'_>,
        progress: ToolProgress<'_>,
    ) -> Result<(), MediaError> {
        let args = audio_args(request);
        self.run_ffmpeg(args, request.source, request.duration_secs, progress)
            .await
    }
}

/// Maps JPEG quality 1-100 onto ffmpeg's `-q:v` scale (2 best, 31 worst).
pub fn jpeg_qscale(quality: u8) -> u8 {
    let quality = u32::from(quality.clamp(1, 100));
    let scaled = ((100 - quality) * 29 + 50) / 100;
    (2 + scaled) as u8
}

// `-i` keeps a source starting with `-` from being read as an option.
fn probe_args(source: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(source.into());
    args
}

fn frame_args(request: &FrameRequest<'_>) -> Vec<OsString> {
    let mut filter = format!("fps=1/{}", request.interval_secs);
    if let Some(res) = request.resolution {
        filter.push_str(&format!(",scale={}:{}", res.width, res.height));
    }

    let mut args: Vec<OsString> = vec!["-i".into(), request.source.into()];
    args.extend(
        [
            "-vf".to_string(),
            filter,
            "-q:v".to_string(),
            jpeg_qscale(request.quality).to_string(),
            "-frames:v".to_string(),
            request.max_frames.to_string(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(request.output_dir.join("frame_%05d.jpg").into_os_string());
    args
}

fn audio_args(request: &AudioRequest<'_>) -> Vec<OsString> {
    let encoding = request.encoding;
    let mut args: Vec<OsString> = vec![
        "-i".into(),
        request.source.into(),
        "-vn".into(),
        "-acodec".into(),
        encoding.codec.into(),
    ];
    if let Some(bitrate) = encoding.bitrate {
        args.push("-b:a".into());
        args.push(bitrate.into());
    }
    if let Some(rate) = encoding.sample_rate {
        args.push("-ar".into());
        args.push(rate.to_string().into());
    }
    if let Some(channels) = encoding.channels {
        args.push("-ac".into());
        args.push(channels.to_string().into());
    }
    args.push(request.output_path.as_os_str().to_os_string());
    args
}

fn classify_failure(tool: &str, source: &str, stderr: &str) -> MediaError {
    let tail = stderr_tail(stderr);
    if UNREACHABLE_MARKERS.iter().any(|m| stderr.contains(m)) {
        MediaError::Unreachable(format!("{}: {}", sanitize::redact_source(source), tail))
    } else {
        MediaError::ToolFailed {
            tool: tool.to_string(),
            message: if tail.is_empty() {
                "exited with non-zero status".to_string()
            } else {
                tail
            },
        }
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("; ")
}

// ffprobe reports most numbers as strings.
#[derive(Deserialize)]
struct FfprobeJson {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
}

fn parse_num<T: std::str::FromStr>(value: Option<&String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

pub(crate) fn parse_probe_json(stdout: &[u8]) -> Result<ProbeOutput, MediaError> {
    let parsed: FfprobeJson = serde_json::from_slice(stdout).map_err(|e| MediaError::Parse {
        tool: "ffprobe".to_string(),
        message: e.to_string(),
    })?;

    let streams = parsed
        .streams
        .into_iter()
        .map(|s| {
            let kind = match s.codec_type.as_deref() {
                Some("video") => StreamKind::Video,
                Some("audio") => StreamKind::Audio,
                _ => StreamKind::Other,
            };
            // avg_frame_rate is "0/0" for some containers; prefer it only when usable.
            let frame_rate = match s.avg_frame_rate {
                Some(ref rate) if !rate.starts_with('0') => Some(rate.clone()),
                _ => s.r_frame_rate,
            };
            StreamInfo {
                kind,
                codec_name: s.codec_name,
                width: s.width,
                height: s.height,
                frame_rate,
                sample_rate: parse_num(s.sample_rate.as_ref()),
                channels: s.channels,
                duration_secs: parse_num(s.duration.as_ref()),
            }
        })
        .collect();

    let format = parsed.format;
    Ok(ProbeOutput {
        duration_secs: format.as_ref().and_then(|f| parse_num(f.duration.as_ref())),
        format_name: format.as_ref().and_then(|f| f.format_name.clone()),
        size_bytes: format.as_ref().and_then(|f| parse_num(f.size.as_ref())),
        bit_rate: format.as_ref().and_then(|f| parse_num(f.bit_rate.as_ref())),
        streams,
    })
}
