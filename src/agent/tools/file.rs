//! Filesystem tools exposed to the agent.
//!
//! Four capabilities, each a narrow, total function over the local
//! filesystem:
//! - `read_file`: full textual content of one file
//! - `write_file`: whole-file overwrite (the only mutation primitive)
//! - `create_directory`: idempotent directory creation
//! - `report_working_directory`: the task's auxiliary notes-log path
//!
//! Filesystem misses come back as failed `ToolResult`s, not `Err`, because
//! the caller is the agent and must be able to react in-band.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{RepoContext, Tool, ToolError, ToolResult};

/// Parameters for the read_file tool.
#[derive(Debug, Deserialize)]
struct ReadFileParams {
    /// Path to the file to read.
    file_path: String,
}

/// Tool for reading the full content of a file.
#[derive(Debug, Default)]
pub struct ReadFileTool;

impl ReadFileTool {
    /// Create a new ReadFileTool instance.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the full content of a file. Relative paths are resolved against the repository directory."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to read"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &RepoContext) -> Result<ToolResult, ToolError> {
        let params: ReadFileParams = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        let path = ctx.resolve(&params.file_path);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                debug!(path = %path.display(), bytes = content.len(), "Read file");
                Ok(ToolResult::success(content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ToolResult::failure(
                format!("Error: File not found at {}", params.file_path),
            )),
            Err(e) => Ok(ToolResult::failure(format!(
                "Error reading file {}: {}",
                params.file_path, e
            ))),
        }
    }
}

/// Parameters for the write_file tool.
#[derive(Debug, Deserialize)]
struct WriteFileParams {
    /// Path to the file to write.
    file_path: String,
    /// Complete new content of the file.
    content: String,
}

/// Tool for overwriting a file's entire content.
///
/// There is no partial-write mode: preserving untouched regions is the
/// responsibility of whoever composes `content`.
#[derive(Debug, Default)]
pub struct WriteFileTool;

impl WriteFileTool {
    /// Create a new WriteFileTool instance.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Overwrite a file with the supplied content. The whole file is replaced, so the content must include every line that should survive, not just the edited region."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Complete new content of the file"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, args: Value, ctx: &RepoContext) -> Result<ToolResult, ToolError> {
        let params: WriteFileParams = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        let path = ctx.resolve(&params.file_path);
        match tokio::fs::write(&path, &params.content).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = params.content.len(), "Wrote file");
                Ok(ToolResult::success(format!(
                    "Content successfully written to {}",
                    params.file_path
                )))
            }
            Err(e) => Ok(ToolResult::failure(format!(
                "Error writing to file {}: {}",
                params.file_path, e
            ))),
        }
    }
}

/// Parameters for the create_directory tool.
#[derive(Debug, Deserialize)]
struct CreateDirectoryParams {
    /// Path of the directory to create.
    directory_path: String,
}

/// Tool for creating a directory. Creating an already-existing directory is
/// success, not error.
#[derive(Debug, Default)]
pub struct CreateDirectoryTool;

impl CreateDirectoryTool {
    /// Create a new CreateDirectoryTool instance.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a directory (and any missing parents) if it does not already exist."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory_path": {
                    "type": "string",
                    "description": "Path of the directory to create"
                }
            },
            "required": ["directory_path"]
        })
    }

    async fn execute(&self, args: Value, ctx: &RepoContext) -> Result<ToolResult, ToolError> {
        let params: CreateDirectoryParams = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        let path = ctx.resolve(&params.directory_path);
        match tokio::fs::create_dir_all(&path).await {
            Ok(()) => Ok(ToolResult::success(format!(
                "Directory successfully created or already exists: {}",
                params.directory_path
            ))),
            Err(e) => Ok(ToolResult::failure(format!(
                "Error creating directory {}: {}",
                params.directory_path, e
            ))),
        }
    }
}

/// Tool reporting the task-scoped notes-log path.
///
/// Not a generic cwd query: the agent uses the returned path to route
/// supplementary notes, and the path is fixed per task.
#[derive(Debug, Default)]
pub struct ReportWorkingDirectoryTool;

impl ReportWorkingDirectoryTool {
    /// Create a new ReportWorkingDirectoryTool instance.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ReportWorkingDirectoryTool {
    fn name(&self) -> &str {
        "report_working_directory"
    }

    fn description(&self) -> &str {
        "Report the path of the auxiliary notes log for this task."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _args: Value, ctx: &RepoContext) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::success(ctx.notes_log.display().to_string()))
    }
}
