pub mod config;
pub mod diagnostics;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod sanitize;
pub mod storage;

pub use config::{load_config, load_config_from_str, Config};
pub use diagnostics::{Diagnostics, ErrorContext, TracingDiagnostics};
pub use error::{ConfigError, JobError, MediaError, PitchVideoError, Result, StorageError};
pub use jobs::{Job, JobManager, JobOptions, JobRegistry, JobStats, JobStatus};
pub use media::{AudioTranscoder, FfmpegToolkit, FrameSampler, MediaProbe};
pub use pipeline::{Pipeline, PipelineError, PipelineServices, Stage};
pub use storage::{FilesystemStore, ObjectStore, StoredObject};
