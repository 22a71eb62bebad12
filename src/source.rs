//! Task source client.
//!
//! Fetches one task descriptor per index from the task-source REST service.
//! The wire format carries the two test groups as JSON-encoded strings
//! (`"[\"test_a\"]"`), which are decoded here so the rest of the pipeline
//! only ever sees typed lists.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::SourceError;

/// Request timeout for task-source calls in seconds.
const FETCH_TIMEOUT_SECS: u64 = 30;

/// Maximum retry attempts for transient fetch failures.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 500;

/// One fetched repair task. Immutable after fetch.
#[derive(Debug, Clone)]
pub struct TaskDescriptor {
    /// Positive integer identifying this repair attempt.
    pub index: u32,
    /// Free-text description of the bug to fix.
    pub problem_statement: String,
    /// Composite clone+checkout instruction string.
    pub clone_spec: String,
    /// Tests expected to flip from failing to passing.
    pub fail_to_pass: Vec<String>,
    /// Tests expected to keep passing.
    pub pass_to_pass: Vec<String>,
    /// Opaque stable identifier used as the verification correlation key.
    pub instance_id: String,
}

/// Raw wire shape of a task descriptor.
#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(rename = "Problem_statement")]
    problem_statement: Option<String>,
    git_clone: Option<String>,
    #[serde(rename = "FAIL_TO_PASS")]
    fail_to_pass: Option<String>,
    #[serde(rename = "PASS_TO_PASS")]
    pass_to_pass: Option<String>,
    instance_id: Option<String>,
}

/// Client for the task-source REST service.
pub struct TaskSourceClient {
    http_client: Client,
    base_url: String,
}

impl TaskSourceClient {
    /// Create a new client for the given base URL.
    ///
    /// The full fetch URL is `{base_url}/{index}`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            base_url: base_url.into(),
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the task descriptor for one index.
    ///
    /// Transport-level failures are retried with exponential backoff; a
    /// non-success HTTP status is a permanent rejection and aborts the task
    /// attempt immediately.
    pub async fn fetch(&self, index: u32) -> Result<TaskDescriptor, SourceError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), index);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = BASE_RETRY_DELAY_MS * (1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                tracing::debug!(index, attempt = attempt + 1, "Retrying task fetch");
            }

            match self.fetch_once(&url, index).await {
                Ok(task) => return Ok(task),
                Err(err @ SourceError::RequestFailed(_)) => {
                    tracing::warn!(index, error = %err, "Transient task fetch failure");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SourceError::RequestFailed("Max retries exceeded with no error captured".to_string())
        }))
    }

    /// Execute a single fetch (no retry logic).
    async fn fetch_once(&self, url: &str, index: u32) -> Result<TaskDescriptor, SourceError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(SourceError::Unavailable {
                status: status.as_u16(),
                message,
            });
        }

        let raw: RawTask = response
            .json()
            .await
            .map_err(|e| SourceError::MalformedTask(format!("invalid JSON body: {}", e)))?;

        decode_task(index, raw)
    }
}

/// Convert the raw wire shape into a typed descriptor.
fn decode_task(index: u32, raw: RawTask) -> Result<TaskDescriptor, SourceError> {
    let problem_statement = raw
        .problem_statement
        .ok_or_else(|| SourceError::MalformedTask("missing Problem_statement".to_string()))?;
    let clone_spec = raw
        .git_clone
        .ok_or_else(|| SourceError::MalformedTask("missing git_clone".to_string()))?;
    let instance_id = raw
        .instance_id
        .ok_or_else(|| SourceError::MalformedTask("missing instance_id".to_string()))?;

    let fail_to_pass = decode_test_list("FAIL_TO_PASS", raw.fail_to_pass)?;
    let pass_to_pass = decode_test_list("PASS_TO_PASS", raw.pass_to_pass)?;

    Ok(TaskDescriptor {
        index,
        problem_statement,
        clone_spec,
        fail_to_pass,
        pass_to_pass,
        instance_id,
    })
}

/// Decode a JSON-encoded array-of-string field. A missing field is an empty
/// list; an unparseable one is a malformed task.
fn decode_test_list(field: &str, value: Option<String>) -> Result<Vec<String>, SourceError> {
    match value {
        None => Ok(Vec::new()),
        Some(encoded) => serde_json::from_str(&encoded).map_err(|e| {
            SourceError::MalformedTask(format!("{} is not a valid JSON list: {}", field, e))
        }),
    }
}
