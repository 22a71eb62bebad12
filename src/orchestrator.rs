//! Task pipeline orchestrator.
//!
//! Drives the five-stage pipeline for a range of task indices: fetch the
//! descriptor, provision the working repository, run the bounded agent
//! session, submit to the verification harness, append the result record.
//! Stages are strictly sequential within one task; a failure at any stage is
//! absorbed into an error record and the next index is still attempted.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::agent::prompts::{build_task_prompt, REPAIR_INSTRUCTIONS};
use crate::agent::{RepoContext, SessionConfig, SessionRunner};
use crate::llm::LlmProvider;
use crate::repo::{CloneSpec, RepoProvisioner};
use crate::report::{ResultLogger, ResultRecord, TaskOutcome};
use crate::source::TaskSourceClient;
use crate::verify::{VerificationClient, VerificationRequest};

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Base URL of the task source (fetch URL is `{base}/{index}`).
    pub source_base: String,
    /// Base URL of the verification harness.
    pub harness_base: String,
    /// Local directory where working repositories are provisioned.
    pub repos_dir: PathBuf,
    /// Repository root as seen by the harness's filesystem namespace.
    pub harness_repo_root: String,
    /// Path of the append-only result log.
    pub log_file: PathBuf,
    /// Model identifier for the agent backend.
    pub model: String,
    /// Turn budget per agent session.
    pub max_turns: usize,
}

impl OrchestratorConfig {
    /// Local provisioning destination for one task index.
    pub fn local_repo_dir(&self, index: u32) -> PathBuf {
        self.repos_dir.join(format!("repo_{}", index))
    }

    /// Harness-side repository directory for one task index.
    pub fn harness_repo_dir(&self, index: u32) -> String {
        format!(
            "{}/repo_{}",
            self.harness_repo_root.trim_end_matches('/'),
            index
        )
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Number of task indices attempted.
    pub attempted: usize,
    /// Attempts that solved their task (all groups clean).
    pub solved: usize,
    /// Attempts that failed or regressed.
    pub failed: usize,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Fold one task outcome into the summary.
    fn record(&mut self, outcome: &TaskOutcome) {
        self.attempted += 1;
        if outcome.is_solved() {
            self.solved += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Composes the pipeline clients and drives task attempts.
pub struct TaskOrchestrator {
    config: OrchestratorConfig,
    source: TaskSourceClient,
    provisioner: RepoProvisioner,
    runner: SessionRunner,
    verifier: VerificationClient,
    logger: ResultLogger,
}

impl TaskOrchestrator {
    /// Create an orchestrator backed by the given LLM provider.
    pub fn new(config: OrchestratorConfig, llm: Arc<dyn LlmProvider>) -> Self {
        let session_config = SessionConfig::new()
            .with_model(config.model.clone())
            .with_max_turns(config.max_turns);

        Self {
            source: TaskSourceClient::new(config.source_base.clone()),
            provisioner: RepoProvisioner::new(),
            runner: SessionRunner::new(llm, session_config),
            verifier: VerificationClient::new(config.harness_base.clone()),
            logger: ResultLogger::new(config.log_file.clone()),
            config,
        }
    }

    /// Run the pipeline for an inclusive range of task indices.
    ///
    /// Individual task failures never abort the batch; every index in the
    /// range gets a result record.
    pub async fn run_range(&self, from: u32, to: u32) -> std::io::Result<RunSummary> {
        let mut summary = RunSummary::default();

        for index in from..=to {
            info!(index, "Starting task attempt");
            let outcome = self.attempt(index).await;

            match &outcome {
                TaskOutcome::Evaluated {
                    fail_pass_passed,
                    fail_pass_total,
                    pass_pass_passed,
                    pass_pass_total,
                    ..
                } => info!(
                    index,
                    fail_to_pass = %format!("{}/{}", fail_pass_passed, fail_pass_total),
                    pass_to_pass = %format!("{}/{}", pass_pass_passed, pass_pass_total),
                    "Task evaluated"
                ),
                TaskOutcome::Failed { message } => {
                    error!(index, message = %message, "Task attempt failed")
                }
            }

            summary.record(&outcome);
            self.logger.append(&ResultRecord { index, outcome }).await?;
        }

        summary.finished_at = Some(Utc::now());
        info!(
            attempted = summary.attempted,
            solved = summary.solved,
            failed = summary.failed,
            "Run complete"
        );
        Ok(summary)
    }

    /// Run the full pipeline for one task index.
    ///
    /// Every stage error is absorbed into a `Failed` outcome so the caller
    /// can keep iterating over indices.
    async fn attempt(&self, index: u32) -> TaskOutcome {
        let task = match self.source.fetch(index).await {
            Ok(task) => task,
            Err(e) => return TaskOutcome::Failed { message: e.to_string() },
        };

        let spec = match CloneSpec::parse(&task.clone_spec) {
            Ok(spec) => spec,
            Err(e) => return TaskOutcome::Failed { message: e.to_string() },
        };

        let destination = self.config.local_repo_dir(index);
        let repo = match self.provisioner.provision(&spec, &destination).await {
            Ok(repo) => repo,
            Err(e) => return TaskOutcome::Failed { message: e.to_string() },
        };

        let ctx = RepoContext::new(&repo.path);
        let prompt = build_task_prompt(
            index,
            &repo.path.display().to_string(),
            &task.problem_statement,
        );
        let session = match self.runner.run(REPAIR_INSTRUCTIONS, &prompt, &ctx).await {
            Ok(session) => session,
            Err(e) => return TaskOutcome::Failed { message: e.to_string() },
        };

        if session.turn_limit_hit {
            // Still worth verifying: partial edits occasionally pass, and the
            // record carries the flag either way.
            warn!(
                index,
                turns = session.turns_taken,
                "Session hit the turn budget before declaring completion"
            );
        }

        let request = VerificationRequest {
            instance_id: task.instance_id.clone(),
            repo_dir: self.config.harness_repo_dir(index),
            fail_to_pass: task.fail_to_pass.clone(),
            pass_to_pass: task.pass_to_pass.clone(),
        };
        let verification = match self.verifier.verify(&request).await {
            Ok(result) => result,
            Err(e) => return TaskOutcome::Failed { message: e.to_string() },
        };

        TaskOutcome::Evaluated {
            fail_pass_passed: verification.fail_to_pass.passed(),
            fail_pass_total: verification.fail_to_pass.total(),
            pass_pass_passed: verification.pass_to_pass.passed(),
            pass_pass_total: verification.pass_to_pass.total(),
            tokens_used: session.tokens_used,
            turn_limit_hit: session.turn_limit_hit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{GenerationRequest, GenerationResponse};
    use async_trait::async_trait;

    /// Provider that must never be reached (the pipeline fails earlier).
    struct UnreachableProvider;

    #[async_trait]
    impl LlmProvider for UnreachableProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            panic!("agent backend must not be called when fetch fails");
        }
    }

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            source_base: "http://localhost:8081/task/index".to_string(),
            harness_base: "http://localhost:8082".to_string(),
            repos_dir: PathBuf::from("/tmp/repos"),
            harness_repo_root: "/repos".to_string(),
            log_file: PathBuf::from("results.log"),
            model: "gpt-4o-mini".to_string(),
            max_turns: 30,
        }
    }

    #[test]
    fn test_repo_dir_layout() {
        let config = config();
        assert_eq!(config.local_repo_dir(7), PathBuf::from("/tmp/repos/repo_7"));
        assert_eq!(config.harness_repo_dir(7), "/repos/repo_7");
    }

    #[test]
    fn test_harness_repo_dir_trims_trailing_slash() {
        let mut config = config();
        config.harness_repo_root = "/repos/".to_string();
        assert_eq!(config.harness_repo_dir(1), "/repos/repo_1");
    }

    #[tokio::test]
    async fn test_fetch_failure_is_logged_and_batch_continues() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = OrchestratorConfig {
            // Nothing listens here; every fetch fails at the transport level.
            source_base: "http://localhost:1/task/index".to_string(),
            harness_base: "http://localhost:1".to_string(),
            repos_dir: dir.path().join("repos"),
            harness_repo_root: "/repos".to_string(),
            log_file: dir.path().join("results.log"),
            model: "gpt-4o-mini".to_string(),
            max_turns: 30,
        };
        let log_file = config.log_file.clone();

        let orchestrator = TaskOrchestrator::new(config, Arc::new(UnreachableProvider));
        let summary = orchestrator.run_range(1, 2).await.expect("run completes");

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.solved, 0);
        assert_eq!(summary.failed, 2);
        assert!(summary.finished_at.is_some());

        let content = std::fs::read_to_string(&log_file).expect("log exists");
        assert!(content.contains("--- TESTCASE 1 ---"));
        assert!(content.contains("--- TESTCASE 2 ---"));
        assert_eq!(content.matches("Error:").count(), 2);
        assert!(!content.contains("passed:"));
        // No repository was ever provisioned.
        assert!(!dir.path().join("repos").exists());
    }

    #[test]
    fn test_summary_accounting() {
        let mut summary = RunSummary::default();
        summary.record(&TaskOutcome::Evaluated {
            fail_pass_passed: 2,
            fail_pass_total: 2,
            pass_pass_passed: 5,
            pass_pass_total: 5,
            tokens_used: 100,
            turn_limit_hit: false,
        });
        summary.record(&TaskOutcome::Evaluated {
            fail_pass_passed: 1,
            fail_pass_total: 2,
            pass_pass_passed: 5,
            pass_pass_total: 5,
            tokens_used: 100,
            turn_limit_hit: true,
        });
        summary.record(&TaskOutcome::Failed {
            message: "clone failed".to_string(),
        });

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.solved, 1);
        assert_eq!(summary.failed, 2);
    }
}
