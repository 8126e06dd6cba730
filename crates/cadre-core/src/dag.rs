//! Goal DAG definitions
//!
//! The goal DAG is the dependency graph of tasks a run works through.
//! It is produced once per run by the Planner, validated before it
//! enters shared state, and mutated only by flipping task status to
//! completed.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strongly-typed task ID, unique within a goal DAG.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<TaskId> for String {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for TaskId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Closed set of specialist roles a task can be assigned to.
///
/// Routing decisions are checked against this enumeration instead of
/// free-form strings, so an out-of-set signal is caught in O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Planner,
    Executor,
    Researcher,
    Developer,
    Reviewer,
    Analyst,
}

impl Role {
    /// All roles, in a stable order.
    pub const ALL: [Role; 6] = [
        Role::Planner,
        Role::Executor,
        Role::Researcher,
        Role::Developer,
        Role::Reviewer,
        Role::Analyst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Planner => "Planner",
            Role::Executor => "Executor",
            Role::Researcher => "Researcher",
            Role::Developer => "Developer",
            Role::Reviewer => "Reviewer",
            Role::Analyst => "Analyst",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Error for a role name outside the closed set.
#[derive(Debug, Clone, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Task status - pending until the assigned worker finishes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

/// A single unit of work in the goal DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within the DAG
    pub id: TaskId,
    /// Short human-readable title
    pub title: String,
    /// Full work description handed to the assigned worker
    pub description: String,
    /// Role responsible for this task
    pub assignee: Role,
    /// IDs of tasks that must complete before this one becomes ready
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    /// Current status
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    /// Create a new pending task.
    pub fn new(
        id: impl Into<TaskId>,
        title: impl Into<String>,
        description: impl Into<String>,
        assignee: Role,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            assignee,
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
        }
    }

    /// Add dependencies.
    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Check whether every dependency appears in the completed set.
    pub fn dependencies_satisfied(&self, completed: &HashSet<&str>) -> bool {
        self.dependencies
            .iter()
            .all(|dep| completed.contains(dep.as_str()))
    }
}

/// Goal DAG errors
#[derive(Debug, Error)]
pub enum DagError {
    #[error("task '{task}' depends on undefined task '{dependency}'")]
    DependencyViolation { task: TaskId, dependency: TaskId },

    #[error("dependency cycle involving task '{0}'")]
    CycleDetected(TaskId),

    #[error("duplicate task id: {0}")]
    DuplicateTask(TaskId),

    #[error("unknown task: {0}")]
    UnknownTask(TaskId),
}

/// Goal DAG - ordered collection of tasks with derived ready/completed
/// views. Creation order is preserved and serves as the stable
/// tie-break when several tasks are ready at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalDag {
    pub tasks: Vec<Task>,
}

impl GoalDag {
    /// Create an empty DAG.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a DAG from a batch of tasks, preserving order.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when the DAG holds no tasks at all.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Look up a task by ID.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// IDs of all completed tasks.
    pub fn completed_ids(&self) -> HashSet<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status.is_completed())
            .map(|t| t.id.as_str())
            .collect()
    }

    /// Pending tasks whose every dependency is completed, in creation
    /// order. Deterministic; no side effects.
    pub fn ready_tasks(&self) -> Vec<&Task> {
        let completed = self.completed_ids();
        self.tasks
            .iter()
            .filter(|t| !t.status.is_completed() && t.dependencies_satisfied(&completed))
            .collect()
    }

    /// True when at least one task is still pending.
    pub fn has_pending(&self) -> bool {
        self.tasks.iter().any(|t| !t.status.is_completed())
    }

    /// True when every task is completed (vacuously false for an empty
    /// DAG, which is the distinct no-DAG state).
    pub fn all_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status.is_completed())
    }

    /// Validate structural invariants: unique IDs, every dependency
    /// present, dependency relation acyclic. Called once at
    /// construction time, before the DAG enters shared state.
    pub fn validate(&self) -> Result<(), DagError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(DagError::DuplicateTask(task.id.clone()));
            }
        }

        let ids: HashSet<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        for task in &self.tasks {
            for dep in &task.dependencies {
                if !ids.contains(dep.as_str()) {
                    return Err(DagError::DependencyViolation {
                        task: task.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        self.detect_cycles()
    }

    /// Flip a task to completed. Idempotent: completing an
    /// already-completed task is a no-op, not an error.
    pub fn mark_completed(&mut self, id: &TaskId) -> Result<(), DagError> {
        match self.tasks.iter_mut().find(|t| t.id == *id) {
            Some(task) => {
                task.status = TaskStatus::Completed;
                Ok(())
            }
            None => Err(DagError::UnknownTask(id.clone())),
        }
    }

    /// Cycle detection via DFS with a recursion stack.
    fn detect_cycles(&self) -> Result<(), DagError> {
        let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in &self.tasks {
            adj.entry(task.id.as_str()).or_default();
            for dep in &task.dependencies {
                adj.entry(dep.as_str()).or_default().push(task.id.as_str());
            }
        }

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        fn dfs<'a>(
            node: &'a str,
            adj: &HashMap<&'a str, Vec<&'a str>>,
            visited: &mut HashSet<&'a str>,
            rec_stack: &mut HashSet<&'a str>,
        ) -> Option<&'a str> {
            visited.insert(node);
            rec_stack.insert(node);

            if let Some(neighbors) = adj.get(node) {
                for &neighbor in neighbors {
                    if !visited.contains(neighbor) {
                        if let Some(cycle_node) = dfs(neighbor, adj, visited, rec_stack) {
                            return Some(cycle_node);
                        }
                    } else if rec_stack.contains(neighbor) {
                        return Some(neighbor);
                    }
                }
            }

            rec_stack.remove(node);
            None
        }

        for task in &self.tasks {
            if !visited.contains(task.id.as_str()) {
                if let Some(node) = dfs(task.id.as_str(), &adj, &mut visited, &mut rec_stack) {
                    return Err(DagError::CycleDetected(TaskId::new(node)));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dag() -> GoalDag {
        GoalDag::from_tasks(vec![
            Task::new("T1", "Research", "Gather requirements", Role::Researcher),
            Task::new("T2", "Build", "Implement the page", Role::Developer)
                .with_dependencies(vec![TaskId::new("T1")]),
            Task::new("T3", "Review", "Review the result", Role::Reviewer)
                .with_dependencies(vec![TaskId::new("T2")]),
        ])
    }

    #[test]
    fn test_validate_accepts_well_formed_dag() {
        assert!(sample_dag().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_dependency() {
        let dag = GoalDag::from_tasks(vec![Task::new(
            "T1",
            "Build",
            "Implement",
            Role::Developer,
        )
        .with_dependencies(vec![TaskId::new("T9")])]);

        assert!(matches!(
            dag.validate(),
            Err(DagError::DependencyViolation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_cycle() {
        let dag = GoalDag::from_tasks(vec![
            Task::new("T1", "A", "a", Role::Researcher)
                .with_dependencies(vec![TaskId::new("T2")]),
            Task::new("T2", "B", "b", Role::Developer)
                .with_dependencies(vec![TaskId::new("T1")]),
        ]);

        assert!(matches!(dag.validate(), Err(DagError::CycleDetected(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let dag = GoalDag::from_tasks(vec![
            Task::new("T1", "A", "a", Role::Researcher),
            Task::new("T1", "B", "b", Role::Developer),
        ]);

        assert!(matches!(dag.validate(), Err(DagError::DuplicateTask(_))));
    }

    #[test]
    fn test_ready_tasks_respects_dependencies_and_creation_order() {
        let mut dag = sample_dag();
        let ready: Vec<&str> = dag.ready_tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ready, vec!["T1"]);

        dag.mark_completed(&TaskId::new("T1")).unwrap();
        let ready: Vec<&str> = dag.ready_tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ready, vec!["T2"]);
    }

    #[test]
    fn test_ready_tasks_stable_tie_break_is_creation_order() {
        let dag = GoalDag::from_tasks(vec![
            Task::new("T2", "B", "b", Role::Developer),
            Task::new("T1", "A", "a", Role::Researcher),
        ]);

        let ready: Vec<&str> = dag.ready_tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ready, vec!["T2", "T1"]);
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let mut dag = sample_dag();
        dag.mark_completed(&TaskId::new("T1")).unwrap();
        let snapshot = dag.clone();

        dag.mark_completed(&TaskId::new("T1")).unwrap();
        assert_eq!(
            snapshot.completed_ids(),
            dag.completed_ids(),
            "second completion must not change DAG state"
        );
    }

    #[test]
    fn test_mark_completed_unknown_task_fails() {
        let mut dag = sample_dag();
        assert!(matches!(
            dag.mark_completed(&TaskId::new("T9")),
            Err(DagError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_all_complete_and_has_pending() {
        let mut dag = sample_dag();
        assert!(dag.has_pending());
        assert!(!dag.all_complete());

        for id in ["T1", "T2", "T3"] {
            dag.mark_completed(&TaskId::new(id)).unwrap();
        }
        assert!(!dag.has_pending());
        assert!(dag.all_complete());
        assert!(!GoalDag::new().all_complete());
    }

    #[test]
    fn test_role_parses_case_insensitively() {
        assert_eq!("researcher".parse::<Role>().unwrap(), Role::Researcher);
        assert_eq!(" Developer ".parse::<Role>().unwrap(), Role::Developer);
        assert!("Magician".parse::<Role>().is_err());
    }
}
