//! Worker contract
//!
//! Every specialist implements one capability: consume a read-only
//! view of shared state, produce a partial update. Concrete variants
//! live in the agents crate; this module holds the trait, the error
//! taxonomy, and the role-keyed registry the engine dispatches
//! through.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::dag::{DagError, Role};
use crate::state::{SharedState, StateUpdate};

/// Worker errors
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The reasoning collaborator failed or timed out. The step fails
    /// without advancing any task status.
    #[error("reasoning collaborator unavailable: {0}")]
    ReasoningUnavailable(String),

    /// Planner output failed goal-DAG validation. A hard step failure;
    /// the prior DAG stays in place.
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] DagError),

    /// Planner output could not be parsed into a task breakdown.
    #[error("malformed plan output: {0}")]
    MalformedPlan(String),
}

/// Worker trait - a role-specific actor.
#[async_trait]
pub trait Worker: Send + Sync {
    /// The role this worker acts as.
    fn role(&self) -> Role;

    /// Perform one step of work against a read-only view of shared
    /// state and return the partial update to merge.
    async fn act(&self, state: &SharedState) -> Result<StateUpdate, WorkerError>;
}

/// Registry of workers keyed by role.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<Role, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker under its own role. The latest registration
    /// for a role wins.
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.workers.insert(worker.role(), worker);
    }

    pub fn get(&self, role: Role) -> Option<Arc<dyn Worker>> {
        self.workers.get(&role).cloned()
    }

    /// Roles with a registered worker.
    pub fn roles(&self) -> Vec<Role> {
        self.workers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Message;

    struct EchoWorker(Role);

    #[async_trait]
    impl Worker for EchoWorker {
        fn role(&self) -> Role {
            self.0
        }

        async fn act(&self, _state: &SharedState) -> Result<StateUpdate, WorkerError> {
            Ok(StateUpdate::message(Message::from_role(self.0, "ok")))
        }
    }

    #[test]
    fn test_registry_lookup_by_role() {
        let mut registry = WorkerRegistry::new();
        registry.register(Arc::new(EchoWorker(Role::Researcher)));
        registry.register(Arc::new(EchoWorker(Role::Developer)));

        assert!(registry.get(Role::Researcher).is_some());
        assert!(registry.get(Role::Reviewer).is_none());
        assert_eq!(registry.roles().len(), 2);
    }

    #[test]
    fn test_registry_latest_registration_wins() {
        let mut registry = WorkerRegistry::new();
        registry.register(Arc::new(EchoWorker(Role::Researcher)));
        registry.register(Arc::new(EchoWorker(Role::Researcher)));

        assert_eq!(registry.roles(), vec![Role::Researcher]);
    }
}
