//! swe-mend: automated repair-and-verify pipeline for benchmark repair tasks.
//!
//! Given a range of task indices, the pipeline fetches each problem
//! descriptor from a task-source service, provisions a local git working
//! copy at the pinned revision, lets a bounded tool-using LLM agent edit the
//! code, submits the modified repository to an external verification
//! harness, and appends the per-task outcome to an append-only result log.
//!
//! # Architecture
//!
//! - [`source`]: task-source REST client and descriptor decoding
//! - [`repo`]: clone-spec parsing and repository provisioning
//! - [`agent`]: prompts, file tools, and the bounded session loop
//! - [`llm`]: provider abstraction and OpenAI-compatible chat client
//! - [`verify`]: verification-harness client and evaluation decoding
//! - [`report`]: append-only result log
//! - [`orchestrator`]: sequential five-stage pipeline over task indices
//! - [`cli`]: command-line entry points

pub mod agent;
pub mod cli;
pub mod error;
pub mod llm;
pub mod orchestrator;
pub mod repo;
pub mod report;
pub mod source;
pub mod verify;

pub use error::{LlmError, ProvisionError, SourceError, VerifyError};
pub use orchestrator::{OrchestratorConfig, RunSummary, TaskOrchestrator};
