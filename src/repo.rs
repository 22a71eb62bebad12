//! Repository provisioner.
//!
//! Turns a clone-spec string into a ready local working copy. Clones run as
//! async git subprocesses with interactive credential prompting disabled so a
//! private repository fails fast instead of hanging on a prompt.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::info;

use crate::error::ProvisionError;

/// Parsed form of a composite clone+checkout instruction.
///
/// The wire syntax is `git clone <url> [...] && git checkout <ref>`: the URL
/// is the third whitespace token of the first `&&` segment, the ref the last
/// token of the final segment when more than one segment is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneSpec {
    /// Remote repository URL.
    pub url: String,
    /// Optional commit/branch to check out after cloning.
    pub checkout_ref: Option<String>,
}

impl CloneSpec {
    /// Parse a clone-spec string.
    pub fn parse(spec: &str) -> Result<Self, ProvisionError> {
        let segments: Vec<&str> = spec.split("&&").map(str::trim).collect();

        let clone_segment = segments.first().copied().unwrap_or_default();
        let url = clone_segment
            .split_whitespace()
            .nth(2)
            .map(String::from)
            .ok_or_else(|| ProvisionError::InvalidCloneSpec {
                spec: spec.to_string(),
                reason: "clone segment has no URL token".to_string(),
            })?;

        let checkout_ref = if segments.len() > 1 {
            let checkout_segment = segments[segments.len() - 1];
            Some(
                checkout_segment
                    .split_whitespace()
                    .last()
                    .map(String::from)
                    .ok_or_else(|| ProvisionError::InvalidCloneSpec {
                        spec: spec.to_string(),
                        reason: "checkout segment is empty".to_string(),
                    })?,
            )
        } else {
            None
        };

        Ok(Self { url, checkout_ref })
    }
}

/// A provisioned local working copy, owned by exactly one task attempt.
#[derive(Debug, Clone)]
pub struct WorkingRepository {
    /// Absolute path of the local clone.
    pub path: PathBuf,
    /// The ref that was checked out, if the spec named one.
    pub checked_out: Option<String>,
}

/// Provisions local working copies from clone specs.
#[derive(Debug, Default)]
pub struct RepoProvisioner;

impl RepoProvisioner {
    /// Create a new provisioner.
    pub fn new() -> Self {
        Self
    }

    /// Materialize the repository described by `spec` at `destination`.
    ///
    /// Re-running against an already-populated destination (a `.git`
    /// directory exists) is a no-op success, so re-attempting the same task
    /// index never re-clones.
    pub async fn provision(
        &self,
        spec: &CloneSpec,
        destination: &Path,
    ) -> Result<WorkingRepository, ProvisionError> {
        if destination.join(".git").exists() {
            info!(path = %destination.display(), "Repository already provisioned, skipping clone");
            return Ok(WorkingRepository {
                path: destination.to_path_buf(),
                checked_out: spec.checkout_ref.clone(),
            });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(url = %spec.url, path = %destination.display(), "Cloning repository");
        let output = Command::new("git")
            .arg("clone")
            .arg(&spec.url)
            .arg(destination)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProvisionError::CloneFailed {
                url: spec.url.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if let Some(ref target) = spec.checkout_ref {
            info!(target = %target, "Checking out ref");
            let output = Command::new("git")
                .arg("checkout")
                .arg(target)
                .current_dir(destination)
                .output()
                .await?;

            if !output.status.success() {
                return Err(ProvisionError::CheckoutFailed {
                    target: target.clone(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }

        Ok(WorkingRepository {
            path: destination.to_path_buf(),
            checked_out: spec.checkout_ref.clone(),
        })
    }
}
