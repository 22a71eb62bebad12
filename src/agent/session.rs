//! Bounded-turn agent session runner.
//!
//! Drives one tool-using repair session: render the prompts, send the tool
//! schema, then loop (agent reasoning -> tool call -> tool result) until the
//! agent declares completion or the turn budget runs out. The turn ceiling is
//! the session's only resource bound and the core runaway-loop protection;
//! both termination modes yield a `SessionOutcome`, with the forced one
//! flagged so the orchestrator can record it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::prompts::build_tool_prompt;
use super::tools::{RepoContext, ToolError, ToolRegistry, ToolResult};
use crate::llm::{GenerationRequest, LlmProvider, Message};

/// Errors that can occur during an agent session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] crate::error::LlmError),

    /// Failed to interpret the LLM response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Configuration for the session runner.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum number of turns before forced termination.
    pub max_turns: usize,
    /// Model to use for LLM requests. Empty selects the provider default.
    pub model: String,
    /// Temperature for LLM sampling.
    pub temperature: f64,
    /// Maximum tokens per LLM response.
    pub max_tokens: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_turns: 30,
            model: String::new(),
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

impl SessionConfig {
    /// Create a new session configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the turn budget.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the per-response token ceiling.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A tool call extracted from the LLM response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to call.
    pub name: String,
    /// Arguments for the tool.
    pub arguments: Value,
}

/// Record of a single session turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Turn number (0-indexed).
    pub turn: usize,
    /// The LLM's response text.
    pub response: String,
    /// Tool call if one was made.
    pub tool_call: Option<ToolCall>,
    /// Result of tool execution if a tool was called.
    pub tool_result: Option<ToolResult>,
}

/// Result of a completed session.
///
/// Produced for both natural completion and forced turn-limit termination;
/// `turn_limit_hit` distinguishes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    /// Whether the agent declared completion before the budget ran out.
    pub completed_naturally: bool,
    /// True when the turn ceiling forced termination.
    pub turn_limit_hit: bool,
    /// Number of turns taken.
    pub turns_taken: usize,
    /// Every turn, in order.
    pub transcript: Vec<TurnRecord>,
    /// The agent's final natural-language message.
    pub final_message: String,
    /// Total tokens consumed across all generations in the session.
    pub tokens_used: u64,
}

/// Trait for parsing tool calls out of LLM response text.
pub trait ToolCallParser: Send + Sync {
    /// Parse a tool call from an LLM response, if one is present.
    fn parse(&self, response: &str) -> Option<ToolCall>;
}

/// Default parser: accepts inline JSON objects and fenced ```json blocks
/// with `tool`/`arguments` (or `name`/`parameters`) keys.
#[derive(Debug, Default)]
pub struct JsonToolCallParser;

impl ToolCallParser for JsonToolCallParser {
    fn parse(&self, response: &str) -> Option<ToolCall> {
        if let Some(call) = self.parse_json_format(response) {
            return Some(call);
        }
        self.parse_code_block_format(response)
    }
}

impl JsonToolCallParser {
    /// Scan for balanced JSON objects and try each as a tool call.
    ///
    /// Braces inside string literals don't count toward nesting, so file
    /// content carrying a stray `{` or `}` still parses.
    fn parse_json_format(&self, response: &str) -> Option<ToolCall> {
        let mut depth = 0usize;
        let mut start = None;
        let mut in_string = false;
        let mut escaped = false;

        for (i, c) in response.char_indices() {
            if depth > 0 && in_string {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    in_string = false;
                }
                continue;
            }

            match c {
                '"' if depth > 0 => in_string = true,
                '{' => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if let Some(s) = start {
                            if let Ok(value) =
                                serde_json::from_str::<Value>(&response[s..=i])
                            {
                                if let Some(call) = tool_call_from_value(&value) {
                                    return Some(call);
                                }
                            }
                        }
                        start = None;
                    }
                }
                _ => {}
            }
        }

        None
    }

    /// Parse tool calls out of fenced ```json blocks.
    fn parse_code_block_format(&self, response: &str) -> Option<ToolCall> {
        let start = response.find("```json")?;
        let content = &response[start + "```json".len()..];
        let end = content.find("```")?;
        let value = serde_json::from_str::<Value>(content[..end].trim()).ok()?;
        tool_call_from_value(&value)
    }
}

/// Interpret a JSON value as a tool call if it carries the expected keys.
fn tool_call_from_value(value: &Value) -> Option<ToolCall> {
    if let Some(name) = value.get("tool").and_then(|v| v.as_str()) {
        let arguments = value
            .get("arguments")
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()));
        return Some(ToolCall {
            name: name.to_string(),
            arguments,
        });
    }
    if let Some(name) = value.get("name").and_then(|v| v.as_str()) {
        let arguments = value
            .get("parameters")
            .or_else(|| value.get("args"))
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()));
        return Some(ToolCall {
            name: name.to_string(),
            arguments,
        });
    }
    None
}

/// Runs bounded tool-using sessions against an opaque LLM backend.
pub struct SessionRunner {
    /// LLM provider for generating responses.
    llm: Arc<dyn LlmProvider>,
    /// Tool registry with the session's capabilities.
    tools: ToolRegistry,
    /// Tool call parser.
    parser: Box<dyn ToolCallParser>,
    /// Session configuration.
    config: SessionConfig,
}

impl SessionRunner {
    /// Create a runner with the repair tool set.
    pub fn new(llm: Arc<dyn LlmProvider>, config: SessionConfig) -> Self {
        Self {
            llm,
            tools: ToolRegistry::with_repair_tools(),
            parser: Box::new(JsonToolCallParser),
            config,
        }
    }

    /// Create a runner with a custom tool registry.
    pub fn with_tools(
        llm: Arc<dyn LlmProvider>,
        config: SessionConfig,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            llm,
            tools,
            parser: Box::new(JsonToolCallParser),
            config,
        }
    }

    /// Set a custom tool call parser.
    pub fn with_parser(mut self, parser: Box<dyn ToolCallParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Run one bounded session.
    ///
    /// # Arguments
    ///
    /// * `instructions` - Instruction profile (role + workflow)
    /// * `prompt` - Rendered task prompt
    /// * `ctx` - Per-task repository context for tool execution
    pub async fn run(
        &self,
        instructions: &str,
        prompt: &str,
        ctx: &RepoContext,
    ) -> Result<SessionOutcome, SessionError> {
        let mut conversation = vec![Message::system(instructions)];
        let mut transcript = Vec::new();
        let mut tokens_used: u64 = 0;

        // Tool schema goes in as a user/assistant exchange so plain chat
        // models can call tools without native function-calling support.
        conversation.push(Message::user(build_tool_prompt(
            &self.tools.to_json_schema(),
        )));
        conversation.push(Message::assistant(
            "I understand. I will use these tools to complete the task by responding with JSON tool calls when needed.",
        ));
        conversation.push(Message::user(prompt));

        let mut turn = 0;
        let mut completed = false;
        let mut final_message = String::new();

        while turn < self.config.max_turns && !completed {
            let request =
                GenerationRequest::new(self.config.model.clone(), conversation.clone())
                    .with_temperature(self.config.temperature)
                    .with_max_tokens(self.config.max_tokens);

            let response = self.llm.generate(request).await?;
            tokens_used += u64::from(response.usage.total_tokens);
            let text = response
                .first_content()
                .ok_or_else(|| SessionError::Parse("Empty LLM response".to_string()))?
                .to_string();

            conversation.push(Message::assistant(&text));

            let tool_call = self.parser.parse(&text);
            let tool_result = if let Some(ref call) = tool_call {
                debug!(turn, tool = %call.name, "Executing tool call");
                let result = self.execute_tool(call, ctx).await;
                let feedback = match &result {
                    Ok(r) if r.success => {
                        format!("Tool '{}' succeeded:\n{}", call.name, r.output)
                    }
                    Ok(r) => format!("Tool '{}' failed:\n{}", call.name, r.message()),
                    Err(e) => format!("Tool '{}' error: {}", call.name, e),
                };
                conversation.push(Message::user(&feedback));
                Some(result.unwrap_or_else(|e| ToolResult::failure(e.to_string())))
            } else {
                completed = indicates_completion(&text);
                if completed {
                    final_message = text.clone();
                }
                None
            };

            transcript.push(TurnRecord {
                turn,
                response: text,
                tool_call,
                tool_result,
            });

            turn += 1;
        }

        let turn_limit_hit = !completed;
        if turn_limit_hit {
            warn!(
                max_turns = self.config.max_turns,
                "Session terminated by turn budget"
            );
            final_message = transcript
                .last()
                .map(|t| t.response.clone())
                .unwrap_or_default();
        } else {
            info!(turns = turn, "Agent declared completion");
        }

        Ok(SessionOutcome {
            completed_naturally: completed,
            turn_limit_hit,
            turns_taken: turn,
            transcript,
            final_message,
            tokens_used,
        })
    }

    /// Execute a single tool call through the registry.
    async fn execute_tool(
        &self,
        call: &ToolCall,
        ctx: &RepoContext,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotAvailable(format!("Tool '{}' not found", call.name)))?;
        tool.execute(call.arguments.clone(), ctx).await
    }
}

/// Check whether a tool-free response declares the task finished.
fn indicates_completion(response: &str) -> bool {
    let completion_phrases = [
        "task is complete",
        "task has been completed",
        "task completed",
        "successfully completed",
        "finished the task",
        "fix is complete",
        "the fix has been applied",
    ];

    let lower = response.to_lowercase();
    completion_phrases.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{Choice, GenerationResponse, Usage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock provider that replays a fixed script of responses, repeating the
    /// last one forever.
    struct ScriptedProvider {
        script: Vec<String>,
        calls: AtomicUsize,
        tokens_per_call: u32,
    }

    impl ScriptedProvider {
        fn new(script: Vec<&str>) -> Self {
            Self {
                script: script.into_iter().map(String::from).collect(),
                calls: AtomicUsize::new(0),
                tokens_per_call: 10,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let content = self
                .script
                .get(n)
                .or_else(|| self.script.last())
                .cloned()
                .unwrap_or_default();
            Ok(GenerationResponse {
                id: format!("resp-{}", n),
                model: "mock".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage {
                    prompt_tokens: 0,
                    completion_tokens: self.tokens_per_call,
                    total_tokens: self.tokens_per_call,
                },
            })
        }
    }

    fn test_ctx() -> (tempfile::TempDir, RepoContext) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = RepoContext::new(dir.path());
        (dir, ctx)
    }

    #[test]
    fn test_parser_inline_json() {
        let parser = JsonToolCallParser;
        let call = parser
            .parse(r#"Reading it now: {"tool": "read_file", "arguments": {"file_path": "a.rs"}}"#)
            .expect("should parse");
        assert_eq!(call.name, "read_file");
        assert_eq!(call.arguments["file_path"], "a.rs");
    }

    #[test]
    fn test_parser_name_parameters_alias() {
        let parser = JsonToolCallParser;
        let call = parser
            .parse(r#"{"name": "create_directory", "parameters": {"directory_path": "x"}}"#)
            .expect("should parse");
        assert_eq!(call.name, "create_directory");
        assert_eq!(call.arguments["directory_path"], "x");
    }

    #[test]
    fn test_parser_braces_inside_string_content() {
        let parser = JsonToolCallParser;
        let response = r#"Writing the file now: {"tool": "write_file", "arguments": {"file_path": "a.rs", "content": "// stray brace } in a comment"}}"#;
        let call = parser
            .parse(response)
            .expect("brace inside a string literal must not break the scan");
        assert_eq!(call.name, "write_file");
        assert_eq!(call.arguments["content"], "// stray brace } in a comment");
    }

    #[test]
    fn test_parser_escaped_quotes_inside_string_content() {
        let parser = JsonToolCallParser;
        let response = r#"{"tool": "write_file", "arguments": {"file_path": "a.rs", "content": "println!(\"}\");"}}"#;
        let call = parser.parse(response).expect("escaped quotes must not end the string");
        assert_eq!(call.name, "write_file");
        assert_eq!(call.arguments["content"], "println!(\"}\");");
    }

    #[test]
    fn test_parser_code_block() {
        let parser = JsonToolCallParser;
        let response = "I'll write the file:\n```json\n{\"tool\": \"write_file\", \"arguments\": {\"file_path\": \"a.rs\", \"content\": \"x\"}}\n```";
        let call = parser.parse(response).expect("should parse");
        assert_eq!(call.name, "write_file");
    }

    #[test]
    fn test_parser_plain_text_is_none()  {
        let parser = JsonToolCallParser;
        assert!(parser.parse("Let me think about the fix first.").is_none());
    }

    #[tokio::test]
    async fn test_turn_budget_is_a_hard_ceiling() {
        // Agent that always calls a tool and never declares completion.
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "report_working_directory", "arguments": {}}"#,
        ]));
        let calls_handle = provider.clone();
        let (_dir, ctx) = test_ctx();

        let runner = SessionRunner::new(
            provider,
            SessionConfig::new().with_max_turns(5),
        );
        let outcome = runner.run("instructions", "prompt", &ctx).await.expect("runs");

        assert_eq!(outcome.turns_taken, 5);
        assert_eq!(calls_handle.calls(), 5, "no generation beyond the budget");
        assert!(outcome.turn_limit_hit);
        assert!(!outcome.completed_naturally);
        assert_eq!(outcome.transcript.len(), 5);
    }

    #[tokio::test]
    async fn test_natural_completion_stops_early() {
        let (_dir, ctx) = test_ctx();
        std::fs::write(ctx.repo_dir.join("lib.rs"), "old").expect("fixture");

        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "read_file", "arguments": {"file_path": "lib.rs"}}"#,
            r#"{"tool": "write_file", "arguments": {"file_path": "lib.rs", "content": "new"}}"#,
            "The task is complete: the file now contains the fix.",
        ]));

        let runner = SessionRunner::new(provider, SessionConfig::new().with_max_turns(30));
        let outcome = runner.run("instructions", "prompt", &ctx).await.expect("runs");

        assert!(outcome.completed_naturally);
        assert!(!outcome.turn_limit_hit);
        assert_eq!(outcome.turns_taken, 3);
        assert!(outcome.final_message.contains("task is complete"));
        // The write went through the tool set.
        let content = std::fs::read_to_string(ctx.repo_dir.join("lib.rs")).expect("read");
        assert_eq!(content, "new");
    }

    #[tokio::test]
    async fn test_token_usage_is_accumulated() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "report_working_directory", "arguments": {}}"#,
            "Task completed.",
        ]));
        let (_dir, ctx) = test_ctx();

        let runner = SessionRunner::new(provider, SessionConfig::new().with_max_turns(10));
        let outcome = runner.run("instructions", "prompt", &ctx).await.expect("runs");

        assert_eq!(outcome.turns_taken, 2);
        assert_eq!(outcome.tokens_used, 20);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_fed_back_in_band() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "launch_missiles", "arguments": {}}"#,
            "Task completed.",
        ]));
        let (_dir, ctx) = test_ctx();

        let runner = SessionRunner::new(provider, SessionConfig::new().with_max_turns(10));
        let outcome = runner.run("instructions", "prompt", &ctx).await.expect("runs");

        let first = &outcome.transcript[0];
        let result = first.tool_result.as_ref().expect("result recorded");
        assert!(!result.success);
        assert!(result.message().contains("not found"));
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_fed_back_in_band() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"tool": "read_file", "arguments": {"wrong_key": 1}}"#,
            "Task completed.",
        ]));
        let (_dir, ctx) = test_ctx();

        let runner = SessionRunner::new(provider, SessionConfig::new().with_max_turns(10));
        let outcome = runner.run("instructions", "prompt", &ctx).await.expect("runs");

        // The session must survive and hand the problem back to the agent.
        assert!(outcome.completed_naturally);
        let result = outcome.transcript[0]
            .tool_result
            .as_ref()
            .expect("result recorded");
        assert!(!result.success);
        assert!(result.message().contains("Invalid parameters"));
    }
}
