use std::path::PathBuf;
use std::sync::Arc;

use crate::jobs::model::{AudioRecord, JobOptions, VideoMetadata};
use crate::media::{AudioEncoding, AudioRequest, AudioTranscoder, MediaProbe};
use crate::storage::ObjectStore;

use super::error::{PipelineError, PipelineWarning};
use super::progress::{ProgressReporter, SplitProgress};
use super::scratch::ScratchDir;

#[derive(Debug)]
pub struct AudioOutcome {
    pub audio: AudioRecord,
    pub extracted: bool,
    pub warnings: Vec<PipelineWarning>,
}

pub fn audio_key(job_id: &str, encoding: &AudioEncoding) -> String {
    format!("jobs/{}/audio/audio.{}", job_id, encoding.format.extension())
}

/// Audio stage: extract and upload the audio track, if there is one.
pub struct AudioExtractor {
    probe: Arc<dyn MediaProbe>,
    transcoder: Arc<dyn AudioTranscoder>,
    store: Arc<dyn ObjectStore>,
    scratch_root: Option<PathBuf>,
}

impl AudioExtractor {
    pub fn new(
        probe: Arc<dyn MediaProbe>,
        transcoder: Arc<dyn AudioTranscoder>,
        store: Arc<dyn ObjectStore>,
        scratch_root: Option<PathBuf>,
    ) -> Self {
        Self {
            probe,
            transcoder,
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
    ) -> Result<AudioOutcome, PipelineError> {
        let split = SplitProgress::new(progress);
        let encoding = AudioEncoding::select(options.audio_format, options.audio_quality);

        let probed = self
            .probe
            .probe(source)
            .await
            .map_err(|e| PipelineError::audio("failed to probe for an audio stream", e))?;
        if probed.audio_stream().is_none() {
            log::info!("Source has no audio stream, skipping extraction");
            split.finished();
            return Ok(AudioOutcome {
                audio: AudioRecord::silent(metadata.duration_secs, encoding.format),
                extracted: false,
                warnings: Vec::new(),
            });
        }

        let scratch = ScratchDir::create(self.scratch_root.as_deref(), "audio-")
            .await
            .map_err(|e| PipelineError::audio("failed to create scratch directory", e))?;
        let output_path = scratch
            .path()
            .join(format!("audio.{}", encoding.format.extension()));

        let request = AudioRequest {
            source,
            encoding: &encoding,
            duration_secs: metadata.duration_secs,
            output_path: &output_path,
        };
        let report = |percent: f64| split.tool_percent(percent);
        self.transcoder
            .extract_audio(&request, &report)
            .await
            .map_err(|e| PipelineError::audio("transcoding failed", e))?;

        let bytes = tokio::fs::read(&output_path)
            .await
            .map_err(|e| PipelineError::audio("failed to read extracted audio", e))?;
        let key = audio_key(job_id, &encoding);
        let stored = self
            .store
            .put(bytes, &key, &encoding.content_type())
            .await
            .map_err(|e| PipelineError::audio("upload failed", e))?;
        split.uploads(1, 1);

        let mut warnings = Vec::new();
        let output_source = output_path.to_string_lossy();
        let (sample_rate, channels, duration_secs) = match self.probe.probe(&output_source).await {
            Ok(out) => {
                let stream = out.audio_stream();
                (
                    stream
                        .and_then(|s| s.sample_rate)
                        .unwrap_or_else(|| encoding.fallback_sample_rate()),
                    stream
                        .and_then(|s| s.channels)
                        .unwrap_or_else(|| encoding.fallback_channels()),
                    out.duration_secs
                        .or_else(|| stream.and_then(|s| s.duration_secs))
                        .unwrap_or(metadata.duration_secs),
                )
            }
            Err(e) => {
                let warning = PipelineWarning::AudioProbeFallback {
                    error: e.to_string(),
                };
                log::warn!("{}", warning);
                warnings.push(warning);
                (
                    encoding.fallback_sample_rate(),
                    encoding.fallback_channels(),
                    metadata.duration_secs,
                )
            }
        };

        if let Err(e) = scratch.close() {
            let warning = PipelineWarning::ScratchCleanupFailed {
                error: e.to_string(),
            };
            log::warn!("{}", warning);
            warnings.push(warning);
        }

        Ok(AudioOutcome {
            audio: AudioRecord {
                url: stored.url,
                duration_secs,
                format: encoding.format,
                size_bytes: stored.size_bytes,
                sample_rate,
                channels,
            },
            extracted: true,
            warnings,
        })
    }
}
