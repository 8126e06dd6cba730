//! # Cadre Stores
//!
//! Minimal store implementations for the Cadre runtime.
//!
//! This crate provides:
//! - In-memory CheckpointStore
//! - File-backed CheckpointStore (one JSON file per thread)
//! - In-process StepEventBus for realtime fan-out

mod checkpoint_store;
mod event_bus;

pub use checkpoint_store::{FileCheckpointStore, InMemoryCheckpointStore};
pub use event_bus::{BroadcastStepEventBus, StepEventBus};

// Re-export core traits for convenience
pub use cadre_core::checkpoint::{Checkpoint, CheckpointStore, StoreError, ThreadId};
