//! # Cadre Runtime
//!
//! The orchestration engine: drives the supervisor/worker step loop,
//! applies reducer semantics after every step, persists a checkpoint
//! at each step boundary, and streams step events to the caller.
//! `bootstrap` assembles an engine from a `cadre.yaml` configuration.

pub mod bootstrap;
pub mod engine;

pub use bootstrap::{build_engine, init_tracing, reasoning_from_config};
pub use engine::{Engine, EngineConfig, EngineError, RunStream};

// Re-export the core surface callers need alongside the engine.
pub use cadre_core::checkpoint::{Checkpoint, CheckpointStore, StoreError, ThreadId};
pub use cadre_core::event::StepEvent;
pub use cadre_core::state::SharedState;
