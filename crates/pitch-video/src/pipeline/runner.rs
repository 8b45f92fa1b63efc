use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tracing::{info, info_span, Instrument};

use crate::config::Config;
use crate::diagnostics::{Diagnostics, ErrorContext, TracingDiagnostics};
use crate::jobs::model::{ProcessingResults, ProcessingStats};
use crate::jobs::JobRegistry;
use crate::media::{AudioTranscoder, FfmpegToolkit, FrameSampler, MediaProbe};
use crate::sanitize;
use crate::storage::{FilesystemStore, ObjectStore};

use super::audio::AudioExtractor;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::frames::FrameExtractor;
use super::probe::MetadataProbe;
use super::progress::{band, ProgressReporter, Stage, StageProgress};

/// External collaborators a pipeline is assembled from.
pub struct PipelineServices {
    pub probe: Arc<dyn MediaProbe>,
    pub sampler: Arc<dyn FrameSampler>,
    pub transcoder: Arc<dyn AudioTranscoder>,
    pub store: Arc<dyn ObjectStore>,
    pub diagnostics: Arc<dyn Diagnostics>,
    /// Parent for per-stage scratch directories; system temp when `None`.
    pub scratch_root: Option<PathBuf>,
}

pub struct Pipeline {
    registry: Arc<JobRegistry>,
    metadata: MetadataProbe,
    frames: FrameExtractor,
    audio: AudioExtractor,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Pipeline {
    /// Production constructor: ffmpeg tools and filesystem storage from config.
    pub fn from_config(config: &Config, registry: Arc<JobRegistry>) -> Self {
        let toolkit = Arc::new(FfmpegToolkit::new(
            &config.tools.ffmpeg_path,
            &config.tools.ffprobe_path,
        ));
        let store = Arc::new(FilesystemStore::new(
            &config.storage.root_directory,
            &config.storage.resolved_base_url(),
        ));

        Self::new(
            registry,
            PipelineServices {
                probe: toolkit.clone(),
                sampler: toolkit.clone(),
                transcoder: toolkit,
                store,
                diagnostics: Arc::new(TracingDiagnostics),
                scratch_root: config.temp_directory.clone(),
            },
        )
    }

    pub fn new(registry: Arc<JobRegistry>, services: PipelineServices) -> Self {
        Self {
            registry,
            metadata: MetadataProbe::new(services.probe.clone()),
            frames: FrameExtractor::new(
                services.sampler,
                services.store.clone(),
                services.scratch_root.clone(),
            ),
            audio: AudioExtractor::new(
                services.probe,
                services.transcoder,
                services.store,
                services.scratch_root,
            ),
            diagnostics: services.diagnostics,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Arc<dyn Diagnostics> {
        &self.diagnostics
    }

    /// Runs one queued job to a terminal state.
    ///
    /// Stage errors, the optional timeout and panics inside the stages all
    /// end in `failed`; nothing is returned to the caller.
    pub async fn run(self: Arc<Self>, job_id: String) {
        let Some(job) = self.registry.update(&job_id, |job| job.mark_started()) else {
            log::warn!("Job {} disappeared before it started", job_id);
            return;
        };

        let span = info_span!("pipeline",
            job_id = %job.id,
            trace_id = %job.trace_id,
            source = %sanitize::redact_source(&job.source_reference),
        );

        async move {
            let timeout = job.options.timeout;
            let pipeline = Arc::clone(&self);
            let ctx = PipelineContext::new(job);

            // Stages run in their own task so a panic surfaces as a JoinError.
            let mut handle =
                tokio::spawn(async move { pipeline.run_stages(ctx).await }.in_current_span());

            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                    Ok(joined) => joined,
                    Err(_) => abort_after_timeout(handle, limit).await,
                },
                None => handle.await,
            };

            let outcome = match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(PipelineError::Internal(format!(
                    "stage task panicked: {}",
                    panic_message(e.into_panic())
                ))),
                Err(e) => Err(PipelineError::Internal(format!("stage task ended: {}", e))),
            };

            self.finish(&job_id, outcome);
        }
        .instrument(span)
        .await
    }

    fn finish(&self, job_id: &str, outcome: Result<ProcessingResults, PipelineError>) {
        match outcome {
            Ok(results) => {
                info!(
                    frames = results.stats.frame_count,
                    audio = results.stats.audio_extracted,
                    elapsed_ms = results.stats.processing_time_ms,
                    "Job completed"
                );
                self.registry
                    .update(job_id, move |job| job.mark_completed(results));
            }
            Err(error) => {
                let current = self.registry.get(job_id);
                let context = ErrorContext {
                    job_id: job_id.to_string(),
                    trace_id: current
                        .as_ref()
                        .map(|job| job.trace_id.clone())
                        .unwrap_or_default(),
                    stage: current.and_then(|job| job.stage),
                };
                self.diagnostics.log_error(&error, &context);
                let message = error.to_string();
                self.registry
                    .update(job_id, move |job| job.mark_failed(message));
            }
        }
    }

    async fn run_stages(&self, mut ctx: PipelineContext) -> Result<ProcessingResults, PipelineError> {
        self.step_probe_metadata(&mut ctx)
            .instrument(info_span!("probe_metadata"))
            .await?;

        self.step_extract_frames(&mut ctx)
            .instrument(info_span!("extract_frames"))
            .await?;

        self.step_extract_audio(&mut ctx)
            .instrument(info_span!("extract_audio"))
            .await?;

        info_span!("finalize").in_scope(|| self.step_finalize(ctx))
    }

    /// Marks `stage` as current and moves progress to the start of its band.
    fn enter_stage(&self, job_id: &str, stage: Stage) -> StageProgress {
        let start = band(stage).start;
        self.registry.update(job_id, |job| {
            job.stage = Some(stage);
            job.advance_progress(start);
        });
        StageProgress::new(Arc::clone(&self.registry), job_id, stage)
    }

    async fn step_probe_metadata(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let progress = self.enter_stage(ctx.job_id(), Stage::Metadata);
        let metadata = self
            .metadata
            .run(&ctx.job.source_reference, &progress)
            .await?;
        progress.report(1.0);
        ctx.metadata = Some(metadata);
        Ok(())
    }

    async fn step_extract_frames(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let progress = self.enter_stage(ctx.job_id(), Stage::Frames);
        let metadata = ctx.metadata.as_ref().ok_or_else(|| missing(Stage::Metadata))?;
        let outcome = self
            .frames
            .run(
                &ctx.job.id,
                &ctx.job.source_reference,
                metadata,
                &ctx.job.options,
                &progress,
            )
            .await?;
        progress.report(1.0);

        ctx.frames = outcome.frames;
        ctx.failed_frame_uploads = outcome.failed_uploads;
        ctx.warnings.extend(outcome.warnings);
        Ok(())
    }

    async fn step_extract_audio(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let progress = self.enter_stage(ctx.job_id(), Stage::Audio);
        let metadata = ctx.metadata.as_ref().ok_or_else(|| missing(Stage::Metadata))?;
        let outcome = self
            .audio
            .run(
                &ctx.job.id,
                &ctx.job.source_reference,
                metadata,
                &ctx.job.options,
                &progress,
            )
            .await?;
        progress.report(1.0);

        ctx.audio = Some(outcome.audio);
        ctx.audio_extracted = outcome.extracted;
        ctx.warnings.extend(outcome.warnings);
        Ok(())
    }

    fn step_finalize(&self, ctx: PipelineContext) -> Result<ProcessingResults, PipelineError> {
        let progress = self.enter_stage(ctx.job_id(), Stage::Finalize);
        let metadata = ctx.metadata.ok_or_else(|| missing(Stage::Metadata))?;
        let audio = ctx.audio.ok_or_else(|| missing(Stage::Audio))?;

        if !ctx.warnings.is_empty() {
            log::info!("Job finished with {} warning(s)", ctx.warnings.len());
        }

        let stats = ProcessingStats {
            processing_time_ms: u64::try_from(ctx.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            frame_count: ctx.frames.len(),
            failed_frame_uploads: ctx.failed_frame_uploads,
            audio_extracted: ctx.audio_extracted,
        };
        progress.report(1.0);

        Ok(ProcessingResults {
            frames: ctx.frames,
            audio,
            metadata,
            stats,
        })
    }
}

/// Cancels a stage task whose deadline passed and waits for it to unwind,
/// so scratch directories and child processes are gone before the job turns
/// terminal. A task that finished before the abort landed keeps its result.
async fn abort_after_timeout<T>(
    handle: JoinHandle<Result<T, PipelineError>>,
    limit: Duration,
) -> Result<Result<T, PipelineError>, JoinError> {
    handle.abort();
    match handle.await {
        Err(e) if e.is_cancelled() => Ok(Err(PipelineError::Timeout(limit))),
        finished => finished,
    }
}

fn missing(stage: Stage) -> PipelineError {
    PipelineError::Internal(format!("{} stage produced no result", stage))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
