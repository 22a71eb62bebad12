//! Append-only result log.
//!
//! Each task attempt appends exactly one record to a UTF-8 text file: a
//! `--- TESTCASE {index} ---` header followed by either the per-group pass
//! counts plus the token total, or a single `Error:` line. Records are never
//! rewritten; the file is the run's durable history.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Outcome of one task attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// The attempt reached verification and produced per-group counts.
    Evaluated {
        /// FAIL_TO_PASS tests that passed.
        fail_pass_passed: usize,
        /// FAIL_TO_PASS tests submitted.
        fail_pass_total: usize,
        /// PASS_TO_PASS tests that passed.
        pass_pass_passed: usize,
        /// PASS_TO_PASS tests submitted.
        pass_pass_total: usize,
        /// Tokens consumed by the agent session.
        tokens_used: u64,
        /// True when the session was cut off by the turn budget.
        turn_limit_hit: bool,
    },
    /// The attempt failed before producing an evaluation.
    Failed {
        /// Human-readable description of the failing stage.
        message: String,
    },
}

impl TaskOutcome {
    /// True when every FAIL_TO_PASS test passed and nothing regressed.
    pub fn is_solved(&self) -> bool {
        match self {
            TaskOutcome::Evaluated {
                fail_pass_passed,
                fail_pass_total,
                pass_pass_passed,
                pass_pass_total,
                ..
            } => {
                *fail_pass_total > 0
                    && fail_pass_passed == fail_pass_total
                    && pass_pass_passed == pass_pass_total
            }
            TaskOutcome::Failed { .. } => false,
        }
    }
}

/// One record in the result log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Task index the record belongs to.
    pub index: u32,
    /// What happened.
    pub outcome: TaskOutcome,
}

impl ResultRecord {
    /// Render the record in the log's text format.
    pub fn render(&self) -> String {
        let mut out = format!("\n--- TESTCASE {} ---\n", self.index);
        match &self.outcome {
            TaskOutcome::Evaluated {
                fail_pass_passed,
                fail_pass_total,
                pass_pass_passed,
                pass_pass_total,
                tokens_used,
                ..
            } => {
                out.push_str(&format!(
                    "FAIL_TO_PASS passed: {}/{}\n",
                    fail_pass_passed, fail_pass_total
                ));
                out.push_str(&format!(
                    "PASS_TO_PASS passed: {}/{}\n",
                    pass_pass_passed, pass_pass_total
                ));
                out.push_str(&format!("Total Tokens used: {}\n", tokens_used));
            }
            TaskOutcome::Failed { message } => {
                out.push_str(&format!("Error: {}\n", message));
            }
        }
        out
    }
}

/// Appends result records to the log file.
pub struct ResultLogger {
    path: PathBuf,
}

impl ResultLogger {
    /// Create a logger writing to the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Creates the file on first write.
    pub async fn append(&self, record: &ResultRecord) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.render().as_bytes()).await?;
        file.flush().await?;

        info!(index = record.index, path = %self.path.display(), "Appended result record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_evaluated() {
        let record = ResultRecord {
            index: 3,
            outcome: TaskOutcome::Evaluated {
                fail_pass_passed: 2,
                fail_pass_total: 3,
                pass_pass_passed: 10,
                pass_pass_total: 10,
                tokens_used: 4521,
                turn_limit_hit: false,
            },
        };
        let text = record.render();
        assert!(text.contains("--- TESTCASE 3 ---"));
        assert!(text.contains("FAIL_TO_PASS passed: 2/3"));
        assert!(text.contains("PASS_TO_PASS passed: 10/10"));
        assert!(text.contains("Total Tokens used: 4521"));
        assert!(!text.contains("Error:"));
    }

    #[test]
    fn test_render_failed() {
        let record = ResultRecord {
            index: 7,
            outcome: TaskOutcome::Failed {
                message: "Task source returned status 500: boom".to_string(),
            },
        };
        let text = record.render();
        assert!(text.contains("--- TESTCASE 7 ---"));
        assert!(text.contains("Error: Task source returned status 500: boom"));
        assert!(!text.contains("passed:"));
    }

    #[test]
    fn test_is_solved() {
        let solved = TaskOutcome::Evaluated {
            fail_pass_passed: 3,
            fail_pass_total: 3,
            pass_pass_passed: 5,
            pass_pass_total: 5,
            tokens_used: 0,
            turn_limit_hit: false,
        };
        assert!(solved.is_solved());

        let regressed = TaskOutcome::Evaluated {
            fail_pass_passed: 3,
            fail_pass_total: 3,
            pass_pass_passed: 4,
            pass_pass_total: 5,
            tokens_used: 0,
            turn_limit_hit: false,
        };
        assert!(!regressed.is_solved());

        let errored = TaskOutcome::Failed {
            message: "x".to_string(),
        };
        assert!(!errored.is_solved());
    }

    #[tokio::test]
    async fn test_append_is_append_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.log");
        let logger = ResultLogger::new(&path);

        logger
            .append(&ResultRecord {
                index: 1,
                outcome: TaskOutcome::Failed {
                    message: "first".to_string(),
                },
            })
            .await
            .expect("append");
        logger
            .append(&ResultRecord {
                index: 2,
                outcome: TaskOutcome::Evaluated {
                    fail_pass_passed: 1,
                    fail_pass_total: 1,
                    pass_pass_passed: 0,
                    pass_pass_total: 0,
                    tokens_used: 12,
                    turn_limit_hit: true,
                },
            })
            .await
            .expect("append");

        let content = std::fs::read_to_string(&path).expect("read log");
        let first = content.find("--- TESTCASE 1 ---").expect("record 1");
        let second = content.find("--- TESTCASE 2 ---").expect("record 2");
        assert!(first < second, "records appear in append order");
        assert!(content.contains("Error: first"));
        assert!(content.contains("Total Tokens used: 12"));
    }

    #[tokio::test]
    async fn test_append_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/logs/results.log");
        let logger = ResultLogger::new(&path);

        logger
            .append(&ResultRecord {
                index: 1,
                outcome: TaskOutcome::Failed {
                    message: "x".to_string(),
                },
            })
            .await
            .expect("append");
        assert!(path.exists());
    }
}
