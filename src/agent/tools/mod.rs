//! Tool definitions and registry for the agent session.
//!
//! Defines the `Tool` trait and the registry of capabilities handed to the
//! LLM agent. The set is deliberately narrow: whole-file reads and writes,
//! directory creation, and the auxiliary notes-log path. No shell, no
//! network.

pub mod file;

pub use file::{CreateDirectoryTool, ReadFileTool, ReportWorkingDirectoryTool, WriteFileTool};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// Expected filesystem misses (file not found, parent directory missing) are
/// NOT errors at this level; they are reported in-band as failed
/// [`ToolResult`]s so the agent can react to them. This enum covers only the
/// cases the session loop itself must handle.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Invalid parameters provided to the tool.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Tool is not available in the current session.
    #[error("Tool not available: {0}")]
    NotAvailable(String),
}

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool execution was successful.
    pub success: bool,
    /// Output from the tool execution.
    pub output: String,
    /// Error message if execution failed.
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result.
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// Create a failed tool result.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// The text fed back to the agent: output on success, the error
    /// description otherwise.
    pub fn message(&self) -> &str {
        if self.success {
            &self.output
        } else {
            self.error.as_deref().unwrap_or("Unknown error")
        }
    }
}

/// Per-task context for tool execution.
///
/// Replaces any reliance on process-wide working-directory state: every path
/// the tools touch is derived from this object, so two task attempts can
/// never leak directory state into each other.
#[derive(Debug, Clone)]
pub struct RepoContext {
    /// Absolute path of the task's working repository.
    pub repo_dir: PathBuf,
    /// Task-scoped auxiliary notes-log path reported to the agent.
    pub notes_log: PathBuf,
}

impl RepoContext {
    /// Create a context rooted at the given repository directory.
    ///
    /// The notes log lives next to the repository, named `solutions.log`.
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        let repo_dir = repo_dir.into();
        let notes_log = repo_dir.join("solutions.log");
        Self { repo_dir, notes_log }
    }

    /// Resolve a tool-supplied path: absolute paths pass through, relative
    /// paths are anchored at the repository directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.repo_dir.join(candidate)
        }
    }
}

/// Trait for capabilities the agent can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of the tool.
    fn name(&self) -> &str;

    /// Returns a description of what the tool does.
    fn description(&self) -> &str;

    /// Returns the JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments and context.
    async fn execute(&self, args: Value, ctx: &RepoContext) -> Result<ToolResult, ToolError>;
}

/// Registry for managing available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with the repair-session tool set.
    pub fn with_repair_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ReadFileTool::new()));
        registry.register(Arc::new(WriteFileTool::new()));
        registry.register(Arc::new(CreateDirectoryTool::new()));
        registry.register(Arc::new(ReportWorkingDirectoryTool::new()));
        registry
    }

    /// Register a new tool in the registry.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names.
    pub fn list_tools(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Generate a JSON schema for all registered tools, suitable for LLM
    /// function calling.
    pub fn to_json_schema(&self) -> Value {
        let tools: Vec<Value> = self
            .tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema()
                    }
                })
            })
            .collect();

        Value::Array(tools)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
