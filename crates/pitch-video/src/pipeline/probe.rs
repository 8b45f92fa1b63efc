use std::sync::Arc;

use crate::jobs::model::VideoMetadata;
use crate::media::MediaProbe;

use super::error::PipelineError;
use super::progress::ProgressReporter;

/// Frame rate assumed when the probe reports none or an unusable one.
pub const DEFAULT_FPS: f64 = 30.0;

/// Metadata stage: probes the source and validates what came back.
pub struct MetadataProbe {
    probe: Arc<dyn MediaProbe>,
}

impl MetadataProbe {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self { probe }
    }

    pub async fn run(
        &self,
        source: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<VideoMetadata, PipelineError> {
        let output = self.probe.probe(source).await?;

        let format = match output.format_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(PipelineError::CorruptedInput(
                    "probe returned no container information".to_string(),
                ))
            }
        };
        if output.streams.is_empty() {
            return Err(PipelineError::CorruptedInput(
                "probe returned no streams".to_string(),
            ));
        }

        let video = output
            .video_stream()
            .ok_or_else(|| PipelineError::Format("source has no video stream".to_string()))?;

        let duration_secs = output
            .duration_secs
            .or(video.duration_secs)
            .filter(|d| d.is_finite() && *d >= 0.0)
            .ok_or_else(|| {
                PipelineError::CorruptedInput("probe reported no usable duration".to_string())
            })?;

        let metadata = VideoMetadata {
            duration_secs,
            width: video.width.unwrap_or(0),
            height: video.height.unwrap_or(0),
            fps: parse_frame_rate(video.frame_rate.as_deref()),
            codec: video
                .codec_name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            size_bytes: output.size_bytes.unwrap_or(0),
            format,
            bit_rate: output.bit_rate,
            audio_codec: output.audio_stream().and_then(|a| a.codec_name.clone()),
        };

        log::debug!(
            "Probed {}x{} {} ({:.1}s @ {:.2} fps)",
            metadata.width,
            metadata.height,
            metadata.codec,
            metadata.duration_secs,
            metadata.fps
        );

        progress.report(1.0);
        Ok(metadata)
    }
}

/// Parses a rational (`"30000/1001"`) or plain (`"25"`) frame rate.
///
/// Anything unparsable, non-positive or with a zero denominator yields
/// [`DEFAULT_FPS`].
pub fn parse_frame_rate(rate: Option<&str>) -> f64 {
    let Some(rate) = rate.map(str::trim) else {
        return DEFAULT_FPS;
    };

    let parsed = match rate.split_once('/') {
        Some((num, den)) => match (num.trim().parse::<f64>(), den.trim().parse::<f64>()) {
            (Ok(num), Ok(den)) if den != 0.0 => Some(num / den),
            _ => None,
        },
        None => rate.parse::<f64>().ok(),
    };

    parsed
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .unwrap_or(DEFAULT_FPS)
}
