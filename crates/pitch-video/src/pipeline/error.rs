use std::time::Duration;

use thiserror::Error;

use crate::error::{MediaError, StorageError};

/// Errors that end a job run. Each one moves the job to `failed`.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported or unreadable video: {0}")]
    Format(String),

    #[error("Corrupted input: {0}")]
    CorruptedInput(String),

    #[error("Frame extraction failed: {0}")]
    FrameExtraction(String),

    #[error("Audio extraction failed: {0}")]
    AudioExtraction(String),

    #[error("Job timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn frames(context: &str, err: impl std::fmt::Display) -> Self {
        PipelineError::FrameExtraction(format!("{}: {}", context, err))
    }

    pub fn audio(context: &str, err: impl std::fmt::Display) -> Self {
        PipelineError::AudioExtraction(format!("{}: {}", context, err))
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Unreachable(msg) => PipelineError::Format(format!("source not reachable: {}", msg)),
            other => PipelineError::Format(other.to_string()),
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        PipelineError::Internal(err.to_string())
    }
}

/// Problems a run recovered from. They are logged and counted, never fatal.
#[derive(Debug, Clone)]
pub enum PipelineWarning {
    FrameUploadFailed {
        index: usize,
        key: String,
        error: String,
    },
    AudioProbeFallback {
        error: String,
    },
    ScratchCleanupFailed {
        error: String,
    },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::FrameUploadFailed { index, key, error } => {
                write!(f, "frame {} upload to '{}' failed: {}", index, key, error)
            }
            PipelineWarning::AudioProbeFallback { error } => {
                write!(f, "could not re-probe extracted audio, using defaults: {}", error)
            }
            PipelineWarning::ScratchCleanupFailed { error } => {
                write!(f, "failed to remove scratch directory: {}", error)
            }
        }
    }
}
