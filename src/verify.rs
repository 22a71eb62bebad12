//! Verification harness client.
//!
//! Submits a modified repository to the external test harness and decodes the
//! per-group pass/fail evaluation. The harness addresses repositories by its
//! own filesystem namespace, so `repo_dir` here is the harness-side path, not
//! the orchestrator's local one.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::VerifyError;

/// Timeout for harness calls. Test suites take a while; transport-level hangs
/// should still not block a task forever.
const HARNESS_TIMEOUT_SECS: u64 = 600;
/// Maximum retry attempts for transport failures.
const MAX_RETRIES: u32 = 3;
/// Base delay between retries in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Request body for a harness evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRequest {
    /// Benchmark instance identifier.
    pub instance_id: String,
    /// Repository directory as seen by the harness.
    #[serde(rename = "repoDir")]
    pub repo_dir: String,
    /// Tests expected to flip from failing to passing.
    #[serde(rename = "FAIL_TO_PASS")]
    pub fail_to_pass: Vec<String>,
    /// Tests expected to keep passing.
    #[serde(rename = "PASS_TO_PASS")]
    pub pass_to_pass: Vec<String>,
}

/// Outer harness response: the evaluation is double-encoded as a JSON string.
#[derive(Debug, Deserialize)]
struct HarnessEnvelope {
    #[serde(rename = "harnessOutput")]
    harness_output: String,
}

/// Per-instance evaluation payload inside the envelope.
#[derive(Debug, Deserialize)]
struct InstanceEvaluation {
    tests_status: TestsStatus,
}

#[derive(Debug, Deserialize)]
struct TestsStatus {
    #[serde(rename = "FAIL_TO_PASS")]
    fail_to_pass: GroupStatus,
    #[serde(rename = "PASS_TO_PASS")]
    pass_to_pass: GroupStatus,
}

#[derive(Debug, Deserialize)]
struct GroupStatus {
    success: Vec<String>,
    failure: Vec<String>,
}

/// Pass/fail partition of one named test group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestGroup {
    /// Identifiers of tests that passed.
    pub success: Vec<String>,
    /// Identifiers of tests that failed.
    pub failure: Vec<String>,
}

impl TestGroup {
    /// Number of passing tests.
    pub fn passed(&self) -> usize {
        self.success.len()
    }

    /// Total number of evaluated tests in this group.
    pub fn total(&self) -> usize {
        self.success.len() + self.failure.len()
    }
}

/// Decoded harness evaluation for one instance.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// Instance the evaluation belongs to.
    pub instance_id: String,
    /// FAIL_TO_PASS group partition.
    pub fail_to_pass: TestGroup,
    /// PASS_TO_PASS group partition.
    pub pass_to_pass: TestGroup,
}

impl VerificationResult {
    /// True when every FAIL_TO_PASS test passes and no PASS_TO_PASS test
    /// regressed.
    pub fn is_solved(&self) -> bool {
        self.fail_to_pass.failure.is_empty() && self.pass_to_pass.failure.is_empty()
    }
}

/// HTTP client for the verification harness.
pub struct VerificationClient {
    client: reqwest::Client,
    base_url: String,
}

impl VerificationClient {
    /// Create a client for the given harness base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(HARNESS_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Submit a repository for evaluation and decode the result.
    ///
    /// Transport failures are retried with exponential backoff; harness
    /// rejections (non-2xx) and malformed payloads are permanent.
    pub async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationResult, VerifyError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(BASE_RETRY_DELAY_MS * (1 << (attempt - 1)));
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying harness request"
                );
                tokio::time::sleep(delay).await;
            }

            match self.execute(request).await {
                Ok(result) => return Ok(result),
                Err(e @ VerifyError::RequestFailed(_)) => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| VerifyError::RequestFailed("exhausted retries".to_string())))
    }

    /// One harness round-trip without retry handling.
    async fn execute(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationResult, VerifyError> {
        let url = format!("{}/test", self.base_url);
        info!(
            instance_id = %request.instance_id,
            repo_dir = %request.repo_dir,
            "Submitting repository for verification"
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| VerifyError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VerifyError::Harness {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: HarnessEnvelope = response
            .json()
            .await
            .map_err(|e| VerifyError::ParseError(e.to_string()))?;

        decode_evaluation(&envelope.harness_output, &request.instance_id)
    }
}

/// Decode the double-encoded harness payload for one instance.
fn decode_evaluation(
    harness_output: &str,
    instance_id: &str,
) -> Result<VerificationResult, VerifyError> {
    if harness_output.trim().is_empty() {
        return Err(VerifyError::EmptyEvaluation);
    }

    let by_instance: std::collections::HashMap<String, InstanceEvaluation> =
        serde_json::from_str(harness_output)
            .map_err(|e| VerifyError::ParseError(e.to_string()))?;

    if by_instance.is_empty() {
        return Err(VerifyError::EmptyEvaluation);
    }

    let evaluation = by_instance.get(instance_id).ok_or_else(|| {
        let mut keys: Vec<&str> = by_instance.keys().map(String::as_str).collect();
        keys.sort_unstable();
        VerifyError::ParseError(format!(
            "harness output has no entry for instance '{}' (got: {})",
            instance_id,
            keys.join(", ")
        ))
    })?;

    debug!(
        instance_id,
        fail_to_pass_passed = evaluation.tests_status.fail_to_pass.success.len(),
        pass_to_pass_passed = evaluation.tests_status.pass_to_pass.success.len(),
        "Decoded harness evaluation"
    );

    Ok(VerificationResult {
        instance_id: instance_id.to_string(),
        fail_to_pass: TestGroup {
            success: evaluation.tests_status.fail_to_pass.success.clone(),
            failure: evaluation.tests_status.fail_to_pass.failure.clone(),
        },
        pass_to_pass: TestGroup {
            success: evaluation.tests_status.pass_to_pass.success.clone(),
            failure: evaluation.tests_status.pass_to_pass.failure.clone(),
        },
    })
}
