//! Checkpoint model and store trait
//!
//! A checkpoint is an immutable snapshot of shared state keyed by
//! (thread, step sequence number). The engine owns snapshot content
//! and cadence; a store implementation owns durability.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::SharedState;

/// Strongly-typed thread ID - the durable conversation identity across
/// possibly many resumed runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generate a fresh random thread identity.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<ThreadId> for String {
    fn from(value: ThreadId) -> Self {
        value.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// An immutable snapshot of shared state at a step boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: ThreadId,
    pub step_seq: u64,
    pub state: SharedState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(thread_id: impl Into<ThreadId>, step_seq: u64, state: SharedState) -> Self {
        Self {
            thread_id: thread_id.into(),
            step_seq,
            state,
            created_at: Utc::now(),
        }
    }
}

/// Store error types
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// CheckpointStore trait - strict last-write durability per thread.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint. A later `step_seq` for the same thread
    /// supersedes earlier ones.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), StoreError>;

    /// Load the most recent checkpoint for a thread, if any.
    async fn load_latest(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, StoreError>;
}
