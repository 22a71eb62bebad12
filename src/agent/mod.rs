//! Tool-using repair agent: prompts, tool set, and the bounded session loop.

pub mod prompts;
pub mod session;
pub mod tools;

pub use session::{SessionConfig, SessionOutcome, SessionRunner};
pub use tools::{RepoContext, ToolRegistry};
