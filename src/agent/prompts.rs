//! Prompt rendering for the repair agent session.
//!
//! Two pieces of text drive a session: the instruction profile (role plus a
//! fixed workflow ordering) and the task prompt (problem statement, repository
//! location, and the behavioral constraints the whole-file write contract
//! depends on).

/// Instruction profile for the bug-fixing agent.
///
/// The workflow ordering exists because `write_file` replaces entire files:
/// the agent must merge its edit into the full content before writing, and
/// must not deliberate indefinitely before executing the change.
pub const REPAIR_INSTRUCTIONS: &str = r#"You are a bug-fixing specialist. Follow this workflow:

1. Search for the file and its path in the repository that needs to be edited or created.
2. Analyze the file's content using the read_file tool.
3. Identify which part of the file needs to be edited.
4. Integrate the adapted code part into the whole code file in order to only change a small portion of the content.
5. If a directory that needs to be created does not exist, only then use the create_directory tool to create it.
6. Update the file's content using the write_file tool. Only overwrite the content that needs to be edited and supply the rest of the code unchanged.
7. Execute the code change at most after two iterations of thinking about it.

IMPORTANT: Make sure that you only update the code parts that are required and keep all other code.
"#;

/// Render the task prompt for one repair attempt.
///
/// # Arguments
///
/// * `index` - Task index, used for the task-scoped repository alias
/// * `repo_path` - Absolute path of the local working repository
/// * `problem_statement` - Free-text description of the bug
pub fn build_task_prompt(index: u32, repo_path: &str, problem_statement: &str) -> String {
    format!(
        r#"You are a team of agents with the following roles:
- Planner: breaks down the problem into coding tasks
- Coder: makes actual changes to the code files in the Git repository

Work in the directory: repo_{index}. This is a Git repository.
The absolute path to the Git repository is {repo_path}.
Your goal is to fix the problem described below.
All code changes must be saved to the files, so they appear in `git diff`.
Problem description:
{problem_statement}

IMPORTANT: Make sure the fix is minimal and only touches what's necessary without removing any other functionality from the code.
You must keep all content of the file that might still be working.
If you propose to change a few lines within a code file, you must keep all other code and incorporate it into your file content response.
"#
    )
}

/// Describe the available tools so a plain chat model can call them.
///
/// # Arguments
///
/// * `tools_json` - JSON array of tool definitions from the registry
pub fn build_tool_prompt(tools_json: &serde_json::Value) -> String {
    format!(
        "You have access to the following tools. To use a tool, respond with a JSON object containing 'tool' and 'arguments' keys.\n\nTools:\n{}",
        serde_json::to_string_pretty(tools_json).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repair_instructions_enforce_workflow() {
        assert!(REPAIR_INSTRUCTIONS.contains("read_file"));
        assert!(REPAIR_INSTRUCTIONS.contains("write_file"));
        assert!(REPAIR_INSTRUCTIONS.contains("create_directory"));
        assert!(REPAIR_INSTRUCTIONS.contains("only then use the create_directory tool"));
        assert!(REPAIR_INSTRUCTIONS.contains("at most after two iterations"));
    }

    #[test]
    fn test_build_task_prompt() {
        let prompt = build_task_prompt(7, "/repos/repo_7", "fix off-by-one in pager");
        assert!(prompt.contains("repo_7"));
        assert!(prompt.contains("/repos/repo_7"));
        assert!(prompt.contains("fix off-by-one in pager"));
        assert!(prompt.contains("fix is minimal"));
        assert!(prompt.contains("keep all other code"));
    }

    #[test]
    fn test_build_tool_prompt() {
        let tools = serde_json::json!([
            {
                "type": "function",
                "function": {
                    "name": "read_file",
                    "description": "Read a file",
                    "parameters": {"type": "object"}
                }
            }
        ]);
        let prompt = build_tool_prompt(&tools);
        assert!(prompt.contains("read_file"));
        assert!(prompt.contains("'tool' and 'arguments'"));
    }
}
