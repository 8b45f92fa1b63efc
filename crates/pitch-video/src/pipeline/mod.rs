pub mod audio;
pub mod context;
pub mod error;
pub mod frames;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod scratch;

pub use context::PipelineContext;
pub use error::{PipelineError, PipelineWarning};
pub use progress::{
    job_progress, NoopProgress, ProgressBand, ProgressReporter, Stage, PROGRESS_BANDS,
};
pub use runner::{Pipeline, PipelineServices};
pub use scratch::ScratchDir;
