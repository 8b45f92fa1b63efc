use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::jobs::JobRegistry;

/// The four sequential steps of a job run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Metadata,
    Frames,
    Audio,
    Finalize,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Metadata => write!(f, "Probing metadata"),
            Stage::Frames => write!(f, "Extracting frames"),
            Stage::Audio => write!(f, "Extracting audio"),
            Stage::Finalize => write!(f, "Finalizing"),
        }
    }
}

/// Slice of the 0-100 job scale owned by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBand {
    pub stage: Stage,
    pub start: u8,
    pub end: u8,
}

/// Stage boundaries, in execution order. Bands are contiguous and cover 0-100.
pub const PROGRESS_BANDS: [ProgressBand; 4] = [
    ProgressBand {
        stage: Stage::Metadata,
        start: 0,
        end: 10,
    },
    ProgressBand {
        stage: Stage::Frames,
        start: 10,
        end: 70,
    },
    ProgressBand {
        stage: Stage::Audio,
        start: 70,
        end: 90,
    },
    ProgressBand {
        stage: Stage::Finalize,
        start: 90,
        end: 100,
    },
];

pub fn band(stage: Stage) -> ProgressBand {
    PROGRESS_BANDS
        .iter()
        .copied()
        .find(|b| b.stage == stage)
        .unwrap_or(ProgressBand {
            stage,
            start: 0,
            end: 100,
        })
}

/// Maps a stage-local fraction (0.0-1.0) onto the job-level 0-100 scale.
///
/// Fractions outside the unit range (and NaN) are clamped to it.
pub fn job_progress(stage: Stage, fraction: f64) -> u8 {
    let fraction = if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    };
    let band = band(stage);
    let span = f64::from(band.end - band.start);
    let value = f64::from(band.start) + span * fraction;
    value.floor().min(100.0) as u8
}

/// Receives stage-local progress fractions.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, fraction: f64);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _fraction: f64) {}
}

/// Persists one stage's progress into the job registry.
pub struct StageProgress {
    registry: Arc<JobRegistry>,
    job_id: String,
    stage: Stage,
}

impl StageProgress {
    pub fn new(registry: Arc<JobRegistry>, job_id: &str, stage: Stage) -> Self {
        Self {
            registry,
            job_id: job_id.to_string(),
            stage,
        }
    }
}

impl ProgressReporter for StageProgress {
    fn report(&self, fraction: f64) {
        let value = job_progress(self.stage, fraction);
        let stage = self.stage;
        self.registry.update(&self.job_id, |job| {
            // Late reports after the terminal transition are dropped.
            if !job.is_finished() {
                job.stage = Some(stage);
                job.advance_progress(value);
            }
        });
    }
}

/// Splits one stage into a tool-driven part and an upload-driven part.
///
/// The external tool reports 0-100% which fills the first `tool_share` of the
/// stage; uploads fill the rest as `done / total`.
pub struct SplitProgress<'a> {
    inner: &'a dyn ProgressReporter,
    tool_share: f64,
}

impl<'a> SplitProgress<'a> {
    pub const TOOL_SHARE: f64 = 0.7;

    pub fn new(inner: &'a dyn ProgressReporter) -> Self {
        Self {
            inner,
            tool_share: Self::TOOL_SHARE,
        }
    }

    pub fn tool_percent(&self, percent: f64) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        self.inner.report(self.tool_share * percent / 100.0);
    }

    pub fn uploads(&self, done: usize, total: usize) {
        let fraction = if total == 0 {
            1.0
        } else {
            done.min(total) as f64 / total as f64
        };
        self.inner
            .report(self.tool_share + (1.0 - self.tool_share) * fraction);
    }

    pub fn finished(&self) {
        self.inner.report(1.0);
    }
}
