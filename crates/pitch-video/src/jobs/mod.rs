pub mod manager;
pub mod model;
pub mod registry;

pub use manager::{JobManager, JobStats};
pub use model::{
    AudioFormat, AudioQuality, AudioRecord, FrameRecord, FrameResolution, Job, JobOptions,
    JobStatus, ProcessingResults, ProcessingStats, VideoMetadata,
};
pub use registry::{JobRegistry, StatusCounts};
