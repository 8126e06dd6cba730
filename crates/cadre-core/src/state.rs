//! Shared state threaded through every step of a run
//!
//! One `SharedState` value accumulates the whole run: transcript, goal
//! DAG, knowledge base, audit logs, and the most recent routing
//! decision. Workers never mutate it directly; they return a
//! `StateUpdate` and the engine merges it with per-field reducer
//! semantics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dag::{GoalDag, Role, TaskId};
use crate::supervisor::NextActor;

/// Conversation role of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Typed author attribution for transcript entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Speaker {
    User,
    Supervisor,
    Role { role: Role },
}

impl Speaker {
    pub fn role(role: Role) -> Self {
        Self::Role { role }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Supervisor => "Supervisor",
            Speaker::Role { role } => role.as_str(),
        }
    }
}

/// A single transcript entry. Insertion order is the causal order of
/// the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub author: Option<Speaker>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>, author: Option<Speaker>) -> Self {
        Self {
            role,
            content: content.into(),
            author,
            timestamp: Utc::now(),
        }
    }

    /// A user request message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content, Some(Speaker::User))
    }

    /// A worker output message, attributed to its role.
    pub fn from_role(role: Role, content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content, Some(Speaker::role(role)))
    }

    /// A system/supervisor message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content, Some(Speaker::Supervisor))
    }
}

/// The accumulating record of a run. Fully serializable; this is the
/// checkpoint payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedState {
    /// Append-only conversation transcript
    pub transcript: Vec<Message>,
    /// The live task graph (whole-value replace semantics)
    #[serde(default)]
    pub goal_dag: GoalDag,
    /// Shared findings keyed by task id (key-wise overwrite)
    #[serde(default)]
    pub knowledge_base: HashMap<String, Value>,
    /// Append-only human-readable audit log
    #[serde(default)]
    pub execution_logs: Vec<String>,
    /// Most recent routing decision (whole-value replace)
    #[serde(default)]
    pub next_actor: NextActor,
}

impl SharedState {
    /// Initial state for a fresh run: the user request is the first
    /// transcript entry.
    pub fn new(initial_request: impl Into<String>) -> Self {
        Self {
            transcript: vec![Message::user(initial_request)],
            goal_dag: GoalDag::new(),
            knowledge_base: HashMap::new(),
            execution_logs: vec!["Run initiated by user.".to_string()],
            next_actor: NextActor::default(),
        }
    }

    /// The original user request, if the transcript has one.
    pub fn initial_request(&self) -> Option<&str> {
        self.transcript
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }

    /// The most recent transcript entry.
    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }

    /// Merge a worker's partial update with reducer semantics:
    /// transcript/logs append, knowledge base key-merges, goal DAG and
    /// routing decision replace whole-value. Completion requests are
    /// not applied here - the engine routes them through
    /// [`GoalDag::mark_completed`].
    pub fn apply(&mut self, update: StateUpdate) {
        self.transcript.extend(update.messages);
        if let Some(dag) = update.goal_dag {
            self.goal_dag = dag;
        }
        self.knowledge_base.extend(update.knowledge);
        self.execution_logs.extend(update.logs);
        if let Some(next) = update.next_actor {
            self.next_actor = next;
        }
    }
}

/// A worker's partial update, merged into [`SharedState`] by the
/// engine after the step.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    /// New transcript entries (appended)
    pub messages: Vec<Message>,
    /// Replacement goal DAG, if this step produced one
    pub goal_dag: Option<GoalDag>,
    /// Knowledge artifacts to merge (last writer wins per key)
    pub knowledge: HashMap<String, Value>,
    /// Audit log lines (appended)
    pub logs: Vec<String>,
    /// Tasks this step asks the engine to mark completed
    pub completed_tasks: Vec<TaskId>,
    /// Routing decision override (normally left to the supervisor)
    pub next_actor: Option<NextActor>,
}

impl StateUpdate {
    /// The minimal update: one transcript message.
    pub fn message(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Self::default()
        }
    }

    pub fn with_goal_dag(mut self, dag: GoalDag) -> Self {
        self.goal_dag = Some(dag);
        self
    }

    pub fn with_knowledge(mut self, key: impl Into<String>, value: Value) -> Self {
        self.knowledge.insert(key.into(), value);
        self
    }

    pub fn with_log(mut self, line: impl Into<String>) -> Self {
        self.logs.push(line.into());
        self
    }

    pub fn with_completed(mut self, id: TaskId) -> Self {
        self.completed_tasks.push(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{Task, TaskStatus};
    use serde_json::json;

    #[test]
    fn test_new_state_starts_with_user_request() {
        let state = SharedState::new("build a login page");
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript[0].author, Some(Speaker::User));
        assert_eq!(state.initial_request(), Some("build a login page"));
        assert!(state.goal_dag.is_empty());
    }

    #[test]
    fn test_apply_appends_transcript_and_logs() {
        let mut state = SharedState::new("request");
        let before = state.transcript.len();

        state.apply(
            StateUpdate::message(Message::from_role(Role::Researcher, "findings"))
                .with_log("Researcher completed task: Research"),
        );

        assert_eq!(state.transcript.len(), before + 1);
        assert_eq!(state.execution_logs.len(), 2);
        assert_eq!(
            state.last_message().unwrap().author,
            Some(Speaker::role(Role::Researcher))
        );
    }

    #[test]
    fn test_apply_replaces_goal_dag_whole_value() {
        let mut state = SharedState::new("request");
        let dag = GoalDag::from_tasks(vec![Task::new("T1", "A", "a", Role::Researcher)]);

        state.apply(StateUpdate::default().with_goal_dag(dag));

        assert_eq!(state.goal_dag.len(), 1);
        assert_eq!(state.goal_dag.tasks[0].status, TaskStatus::Pending);
    }

    #[test]
    fn test_apply_merges_knowledge_last_writer_wins() {
        let mut state = SharedState::new("request");
        state.apply(StateUpdate::default().with_knowledge("T1", json!("first")));
        state.apply(
            StateUpdate::default()
                .with_knowledge("T1", json!("second"))
                .with_knowledge("T2", json!("other")),
        );

        assert_eq!(state.knowledge_base.len(), 2);
        assert_eq!(state.knowledge_base["T1"], json!("second"));
    }

    #[test]
    fn test_transcript_length_is_monotonic_across_applies() {
        let mut state = SharedState::new("request");
        let mut last_len = state.transcript.len();
        for i in 0..4 {
            state.apply(StateUpdate::message(Message::from_role(
                Role::Developer,
                format!("step {i}"),
            )));
            assert!(state.transcript.len() > last_len);
            last_len = state.transcript.len();
        }
    }

    #[test]
    fn test_state_serde_round_trip_preserves_shape() {
        let mut state = SharedState::new("request");
        state.apply(
            StateUpdate::message(Message::from_role(Role::Researcher, "done"))
                .with_knowledge("T1", json!("artifact")),
        );

        let encoded = serde_json::to_string(&state).unwrap();
        let decoded: SharedState = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.transcript.len(), state.transcript.len());
        assert_eq!(decoded.knowledge_base, state.knowledge_base);
        assert_eq!(decoded.execution_logs, state.execution_logs);
    }
}
