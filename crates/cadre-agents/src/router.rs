//! LLM-routed supervisor variant.
//!
//! Asks the reasoning collaborator to pick the next actor from a fixed
//! roster. The reply is checked against the closed option set; an
//! out-of-set signal is salvaged by substring match and otherwise
//! resolves to a fixed default - never an error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use cadre_core::dag::Role;
use cadre_core::reasoning::{Reasoning, ReasoningRequest};
use cadre_core::state::SharedState;
use cadre_core::supervisor::{NextActor, RouteDecision, Router};

/// LLM-routed supervisor over a fixed roster.
pub struct LlmRouter {
    reasoning: Arc<dyn Reasoning>,
    roster: Vec<Role>,
    history_limit: usize,
}

impl LlmRouter {
    pub fn new(reasoning: Arc<dyn Reasoning>) -> Self {
        Self {
            reasoning,
            roster: vec![Role::Researcher, Role::Developer, Role::Reviewer],
            history_limit: 50,
        }
    }

    pub fn with_roster(mut self, roster: Vec<Role>) -> Self {
        self.roster = roster;
        self
    }

    /// Cap the transcript entries forwarded as context (0 = all).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    fn framing(&self) -> String {
        let names = self
            .roster
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "You are a supervisor managing: {names}.\n\
             Your goal is to route the conversation to the right worker or FINISH.\n\
             Based on the conversation, who should act next?\n\
             Select one of: {names}, FINISH\n\
             Respond ONLY with the role name."
        )
    }

    /// Resolve a model reply against the allowed option set.
    fn resolve(&self, reply: &str) -> Option<NextActor> {
        let cleaned = reply.trim().trim_matches(|c| c == '\'' || c == '"');
        if cleaned.eq_ignore_ascii_case("FINISH") {
            return Some(NextActor::Finish);
        }
        if let Ok(role) = cleaned.parse::<Role>() {
            if self.roster.contains(&role) {
                return Some(NextActor::role(role));
            }
        }

        // Salvage pass: a verbose reply that still names one roster
        // member is accepted.
        let lower = cleaned.to_lowercase();
        self.roster
            .iter()
            .find(|role| lower.contains(&role.as_str().to_lowercase()))
            .map(|role| NextActor::role(*role))
    }

    /// Fixed fallback when the signal cannot be resolved: Planner while
    /// no DAG exists, FINISH otherwise.
    fn fallback(state: &SharedState) -> NextActor {
        if state.goal_dag.is_empty() {
            NextActor::role(Role::Planner)
        } else {
            NextActor::Finish
        }
    }
}

#[async_trait]
impl Router for LlmRouter {
    async fn route(&self, state: &SharedState) -> RouteDecision {
        let mut context = state.transcript.clone();
        if self.history_limit > 0 && context.len() > self.history_limit {
            context = context.split_off(context.len() - self.history_limit);
        }
        let request = ReasoningRequest::new(self.framing()).with_context(context);

        let reply = match self.reasoning.invoke(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "supervisor reasoning failed; using fallback route");
                let next = Self::fallback(state);
                return RouteDecision::to(next)
                    .with_note(format!("Supervisor reasoning failed ({e}); routed to {next}."));
            }
        };

        match self.resolve(&reply) {
            Some(next) => {
                debug!(reply = %reply.trim(), next = %next, "supervisor routed");
                RouteDecision::to(next)
            }
            None => {
                let next = NextActor::Finish;
                RouteDecision::to(next).with_note(format!(
                    "Supervisor reply '{}' not in option set; finishing run.",
                    reply.trim()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockReasoning, UnavailableReasoning};
    use cadre_core::dag::{GoalDag, Task};
    use cadre_core::state::StateUpdate;
    use tokio_test::block_on;

    fn router_with(reply: &str) -> LlmRouter {
        LlmRouter::new(Arc::new(MockReasoning::fixed(reply)))
    }

    #[test]
    fn test_exact_roster_reply_routes_to_role() {
        let state = SharedState::new("request");
        let decision = block_on(router_with("Researcher").route(&state));
        assert_eq!(decision.next, NextActor::role(Role::Researcher));
    }

    #[test]
    fn test_quoted_reply_is_cleaned() {
        let state = SharedState::new("request");
        let decision = block_on(router_with("'Developer'").route(&state));
        assert_eq!(decision.next, NextActor::role(Role::Developer));
    }

    #[test]
    fn test_verbose_reply_is_salvaged_by_substring() {
        let state = SharedState::new("request");
        let decision =
            block_on(router_with("I think the reviewer should act next.").route(&state));
        assert_eq!(decision.next, NextActor::role(Role::Reviewer));
    }

    #[test]
    fn test_unrecognized_reply_finishes_with_note() {
        let state = SharedState::new("request");
        let decision = block_on(router_with("Astronaut").route(&state));
        assert_eq!(decision.next, NextActor::Finish);
        assert!(decision.note.unwrap().contains("not in option set"));
    }

    #[test]
    fn test_finish_reply_terminates() {
        let state = SharedState::new("request");
        let decision = block_on(router_with("FINISH").route(&state));
        assert!(decision.next.is_finish());
    }

    #[test]
    fn test_reasoning_failure_falls_back_to_planner_without_dag() {
        let router = LlmRouter::new(Arc::new(UnavailableReasoning));
        let state = SharedState::new("request");

        let decision = block_on(router.route(&state));
        assert_eq!(decision.next, NextActor::role(Role::Planner));
    }

    #[test]
    fn test_reasoning_failure_falls_back_to_finish_with_dag() {
        let router = LlmRouter::new(Arc::new(UnavailableReasoning));
        let mut state = SharedState::new("request");
        state.apply(StateUpdate::default().with_goal_dag(GoalDag::from_tasks(vec![Task::new(
            "T1",
            "A",
            "a",
            Role::Researcher,
        )])));

        let decision = block_on(router.route(&state));
        assert!(decision.next.is_finish());
    }
}
