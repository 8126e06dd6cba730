//! # Cadre Agents
//!
//! Concrete collaborators for the Cadre runtime:
//! - Reasoning clients (OpenAI-compatible HTTP, scripted mocks)
//! - Role workers: Planner, Researcher, Developer, Reviewer, Analyst,
//!   Executor
//! - The LLM-routed supervisor variant
//! - Built-in tools: search, list_directory, read_file, write_file

pub mod llm;
pub mod router;
pub mod tools;
pub mod workers;

pub use llm::{HttpReasoningClient, HttpReasoningConfig, MockReasoning, UnavailableReasoning};
pub use router::LlmRouter;
pub use tools::{builtin_registry, ListDirectoryTool, ReadFileTool, SearchTool, WriteFileTool};
pub use workers::{Executor, PlanMode, Planner, PlannerConfig, Specialist};
