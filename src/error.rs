//! Error types for swe-mend operations.
//!
//! Defines error types for the pipeline stages:
//! - Task-source fetching
//! - Repository provisioning (clone/checkout)
//! - Verification harness calls
//! - LLM API interactions
//!
//! Agent-session and tool errors live next to their modules; everything here
//! crosses a stage boundary and is absorbed by the orchestrator into a
//! human-readable log record.

use thiserror::Error;

/// Errors that can occur while fetching a task descriptor.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Task source returned status {status}: {message}")]
    Unavailable { status: u16, message: String },

    #[error("Task source request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed task descriptor: {0}")]
    MalformedTask(String),
}

/// Errors that can occur while provisioning a local repository.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Invalid clone spec '{spec}': {reason}")]
    InvalidCloneSpec { spec: String, reason: String },

    #[error("git clone of '{url}' failed: {stderr}")]
    CloneFailed { url: String, stderr: String },

    #[error("git checkout of '{target}' failed: {stderr}")]
    CheckoutFailed { target: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while verifying a change set against the harness.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Harness returned status {status}: {message}")]
    Harness { status: u16, message: String },

    #[error("Harness request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse harness response: {0}")]
    ParseError(String),

    /// The harness payload decoded to an empty result. Distinct from a
    /// reachability failure: the harness answered but had nothing to evaluate
    /// (no evaluable diff, or the evaluation itself could not run).
    #[error("No data in harness output - possible evaluation error or empty change set")]
    EmptyEvaluation,
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: OPENAI_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
