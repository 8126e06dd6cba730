//! Step events
//!
//! One event per engine step, streamed to the caller: who acted, what
//! was appended to the transcript, the current routing decision, and
//! the terminal/degraded flags.

use serde::{Deserialize, Serialize};

use crate::checkpoint::ThreadId;
use crate::state::{Message, Speaker};
use crate::supervisor::NextActor;

/// A single step of a run, as seen by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub thread_id: ThreadId,
    pub step_seq: u64,
    /// Who acted this step (the supervisor, for terminal decisions)
    pub actor: Speaker,
    /// Transcript entries appended this step
    pub messages: Vec<Message>,
    /// Routing decision after this step
    pub decision: NextActor,
    /// Last event of the run
    pub terminal: bool,
    /// Checkpoint persistence failed; the run continues in memory but
    /// is not resumable until the store recovers
    pub degraded: bool,
    /// Step failure description, when the step did not complete
    #[serde(default)]
    pub error: Option<String>,
}

impl StepEvent {
    pub fn new(
        thread_id: ThreadId,
        step_seq: u64,
        actor: Speaker,
        messages: Vec<Message>,
        decision: NextActor,
    ) -> Self {
        Self {
            thread_id,
            step_seq,
            actor,
            messages,
            decision,
            terminal: false,
            degraded: false,
            error: None,
        }
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
