//! Error reporting sink shared by the job manager and the pipeline.

use std::error::Error;

use serde::Serialize;

use crate::pipeline::progress::Stage;

/// Correlation data attached to every reported error.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub job_id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
}

pub trait Diagnostics: Send + Sync {
    /// Records a failure. Must not block and must not fail.
    fn log_error(&self, error: &(dyn Error + 'static), context: &ErrorContext);

    /// Returns a fresh correlation id for a new job.
    fn generate_request_id(&self) -> String;
}

/// Reports errors as `tracing` events, with the full source chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn log_error(&self, error: &(dyn Error + 'static), context: &ErrorContext) {
        tracing::error!(
            job_id = %context.job_id,
            trace_id = %context.trace_id,
            stage = ?context.stage,
            "{}",
            error_chain(error)
        );
    }

    fn generate_request_id(&self) -> String {
        format!("req_{}", uuid::Uuid::new_v4().simple())
    }
}

/// Formats an error followed by each of its sources, `: `-separated.
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // thiserror messages often embed their source already.
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
