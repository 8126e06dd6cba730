//! Supervisor routing
//!
//! The supervisor is a stateless routing state machine: evaluated
//! fresh from shared state every step, it decides which actor runs
//! next. It never mutates the DAG or transcript; a stall note it wants
//! recorded travels back to the engine inside the decision.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dag::Role;
use crate::state::{SharedState, Speaker};

/// Routing decision: a worker role, or run termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextActor {
    Role { role: Role },
    Finish,
}

impl NextActor {
    pub fn role(role: Role) -> Self {
        Self::Role { role }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, NextActor::Finish)
    }
}

impl Default for NextActor {
    fn default() -> Self {
        // A fresh run always begins with planning.
        NextActor::role(Role::Planner)
    }
}

impl fmt::Display for NextActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextActor::Role { role } => f.write_str(role.as_str()),
            NextActor::Finish => f.write_str("FINISH"),
        }
    }
}

/// Supervisor state, derived from the goal DAG every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// The DAG has zero tasks
    NoDag,
    /// At least one pending task has all dependencies completed
    HasReadyTask,
    /// Tasks remain pending but none are ready
    Blocked,
    /// Every task is completed
    AllComplete,
}

impl SupervisorState {
    /// Classify the current shared state.
    pub fn of(state: &SharedState) -> Self {
        let dag = &state.goal_dag;
        if dag.is_empty() {
            SupervisorState::NoDag
        } else if !dag.ready_tasks().is_empty() {
            SupervisorState::HasReadyTask
        } else if dag.has_pending() {
            SupervisorState::Blocked
        } else {
            SupervisorState::AllComplete
        }
    }
}

/// A routing decision plus an optional audit note the engine should
/// append to the execution logs.
#[derive(Debug, Clone)]
pub struct RouteDecision {
    pub next: NextActor,
    pub note: Option<String>,
}

impl RouteDecision {
    pub fn to(next: NextActor) -> Self {
        Self { next, note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Router trait - produces the next actor from shared state.
///
/// Implementations must be fail-safe: an unrecognized signal resolves
/// to a fixed default, never an error.
#[async_trait]
pub trait Router: Send + Sync {
    async fn route(&self, state: &SharedState) -> RouteDecision;
}

/// Primary strategy: deterministic dependency-driven routing over the
/// goal DAG.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyRouter;

#[async_trait]
impl Router for DependencyRouter {
    async fn route(&self, state: &SharedState) -> RouteDecision {
        match SupervisorState::of(state) {
            SupervisorState::NoDag => RouteDecision::to(NextActor::role(Role::Planner)),
            SupervisorState::HasReadyTask => {
                // Stable tie-break: first ready task in creation order.
                let task = state.goal_dag.ready_tasks()[0];
                RouteDecision::to(NextActor::role(task.assignee))
            }
            SupervisorState::Blocked => {
                let pending = state
                    .goal_dag
                    .tasks
                    .iter()
                    .filter(|t| !t.status.is_completed())
                    .count();
                RouteDecision::to(NextActor::Finish).with_note(format!(
                    "Supervisor stalled: {pending} task(s) pending but none ready; finishing run."
                ))
            }
            SupervisorState::AllComplete => RouteDecision::to(NextActor::Finish),
        }
    }
}

/// Secondary strategy: fixed three-stage pipeline for runs without a
/// goal DAG (User -> Planner -> Executor -> FINISH), advanced by the
/// author of the most recent transcript entry. Any unrecognized author
/// terminates the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineRouter;

#[async_trait]
impl Router for PipelineRouter {
    async fn route(&self, state: &SharedState) -> RouteDecision {
        let last_author = state.last_message().and_then(|m| m.author);
        let next = match last_author {
            None | Some(Speaker::User) => NextActor::role(Role::Planner),
            Some(Speaker::Role {
                role: Role::Planner,
            }) => NextActor::role(Role::Executor),
            _ => NextActor::Finish,
        };
        RouteDecision::to(next)
    }
}
