//! Reasoning collaborator trait
//!
//! Workers and the LLM-routed supervisor variant reach their language
//! model through this single-capability interface. Provider, model and
//! credentials are constructor-time values of the implementation; the
//! core never touches process-wide state.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::state::Message;

/// A single reasoning invocation: role framing plus conversation
/// context.
#[derive(Debug, Clone, Default)]
pub struct ReasoningRequest {
    /// System framing for the role making the request
    pub framing: String,
    /// Conversation context, oldest first
    pub context: Vec<Message>,
}

impl ReasoningRequest {
    pub fn new(framing: impl Into<String>) -> Self {
        Self {
            framing: framing.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: Vec<Message>) -> Self {
        self.context = context;
        self
    }

    /// Append a user-authored context entry.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.context.push(Message::user(content));
    }
}

/// Reasoning errors
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("http error: {0}")]
    Http(String),

    #[error("response error: {0}")]
    Response(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Reasoning trait - the injected language-model collaborator.
#[async_trait]
pub trait Reasoning: Send + Sync {
    /// Produce a completion for the request. Implementations carry
    /// their own deadline and fail rather than block indefinitely.
    async fn invoke(&self, request: ReasoningRequest) -> Result<String, ReasoningError>;
}

#[async_trait]
impl Reasoning for Arc<dyn Reasoning> {
    async fn invoke(&self, request: ReasoningRequest) -> Result<String, ReasoningError> {
        (**self).invoke(request).await
    }
}
