use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PitchVideoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Media tool error: {0}")]
    Media(#[from] MediaError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config does not match schema: {errors}")]
    SchemaValidation { errors: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write object '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Upload rejected: {0}")]
    Rejected(String),
}

/// Failures of the external media tools (ffprobe / ffmpeg).
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    #[error("Source not reachable: {0}")]
    Unreachable(String),
}

/// Synchronous failures surfaced by the job manager.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Capacity exceeded: {active} of {max} concurrent jobs already running")]
    Capacity { active: usize, max: usize },

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No async runtime available to run the job")]
    RuntimeUnavailable,
}

pub type Result<T> = std::result::Result<T, PitchVideoError>;
