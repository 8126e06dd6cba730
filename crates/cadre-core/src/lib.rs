//! # Cadre Core
//!
//! Core abstractions and deterministic logic for the Cadre
//! orchestration runtime.
//!
//! This crate contains:
//! - Goal DAG model and validation
//! - Shared state and per-field reducer semantics
//! - Supervisor routing (dependency-driven and pipeline strategies)
//! - Worker contract and registry
//! - Tool-invocation sub-protocol (directive grammar + dispatch)
//! - Collaborator traits: reasoning, tools, checkpoint store
//!
//! This crate does NOT care about:
//! - How a request reaches the engine (transport)
//! - Which language-model provider answers a reasoning call
//! - Where checkpoints are persisted

pub mod checkpoint;
pub mod dag;
pub mod directive;
pub mod event;
pub mod reasoning;
pub mod state;
pub mod supervisor;
pub mod worker;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::checkpoint::{Checkpoint, CheckpointStore, StoreError, ThreadId};
    pub use crate::dag::{DagError, GoalDag, Role, Task, TaskId, TaskStatus};
    pub use crate::directive::{
        apply_directive, parse_directive, usage_instructions, Directive, Tool, ToolError,
        ToolRegistry, DIRECTIVE_PREFIX,
    };
    pub use crate::event::StepEvent;
    pub use crate::reasoning::{Reasoning, ReasoningError, ReasoningRequest};
    pub use crate::state::{Message, MessageRole, SharedState, Speaker, StateUpdate};
    pub use crate::supervisor::{
        DependencyRouter, NextActor, PipelineRouter, RouteDecision, Router, SupervisorState,
    };
    pub use crate::worker::{Worker, WorkerError, WorkerRegistry};
}

// Re-export key types at crate root
pub use checkpoint::{Checkpoint, CheckpointStore, StoreError, ThreadId};
pub use dag::{DagError, GoalDag, Role, Task, TaskId, TaskStatus};
pub use directive::{apply_directive, Tool, ToolError, ToolRegistry};
pub use event::StepEvent;
pub use reasoning::{Reasoning, ReasoningError, ReasoningRequest};
pub use state::{Message, MessageRole, SharedState, Speaker, StateUpdate};
pub use supervisor::{DependencyRouter, NextActor, PipelineRouter, RouteDecision, Router};
pub use worker::{Worker, WorkerError, WorkerRegistry};
