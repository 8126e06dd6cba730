//! Role workers.
//!
//! Every specialist follows the same contract: read shared state,
//! invoke the reasoning collaborator with role framing, return a
//! partial update. Task-bound specialists additionally pick their unit
//! of work off the goal DAG and request its completion.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use cadre_core::dag::{GoalDag, Role, Task, TaskId};
use cadre_core::reasoning::{Reasoning, ReasoningRequest};
use cadre_core::state::{Message, SharedState, StateUpdate};
use cadre_core::worker::{Worker, WorkerError};

const LANGUAGE_NOTE: &str =
    "CRITICAL: Respond in the language of the user's request, not your default language.";

/// How the planner renders its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanMode {
    /// Structured decomposition into a validated goal DAG (primary)
    #[default]
    Decompose,
    /// Prose plan for the linear pipeline variant
    Narrative,
}

/// Planner configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub mode: PlanMode,
    /// Roles tasks may be assigned to in decompose mode.
    pub roster: Vec<Role>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            mode: PlanMode::Decompose,
            roster: vec![
                Role::Researcher,
                Role::Developer,
                Role::Reviewer,
                Role::Analyst,
            ],
        }
    }
}

/// The DAG-producing specialist. In decompose mode it asks for a
/// strict-JSON task breakdown, validates it, and requests a goal-DAG
/// replacement; validation failure is a hard step failure and the
/// prior DAG stays in place.
pub struct Planner {
    reasoning: Arc<dyn Reasoning>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(reasoning: Arc<dyn Reasoning>) -> Self {
        Self::with_config(reasoning, PlannerConfig::default())
    }

    pub fn with_config(reasoning: Arc<dyn Reasoning>, config: PlannerConfig) -> Self {
        Self { reasoning, config }
    }

    fn decompose_framing(&self) -> String {
        let roster = self
            .config
            .roster
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "You are the planning specialist for a team of: {roster}.\n\
             Decompose the user's request into a small set of tasks.\n\
             Return ONLY one valid JSON object with shape:\n\
             {{\"tasks\":[{{\"task_id\":\"T1\",\"title\":\"...\",\"description\":\"...\",\
             \"assignee\":\"Researcher\",\"dependencies\":[]}}]}}\n\
             Rules:\n\
             1) task_id values must be unique.\n\
             2) dependencies may only reference task_id values in the same list.\n\
             3) assignee must be exactly one of: {roster}.\n\
             4) The dependency relation must not contain cycles."
        )
    }

    fn narrative_framing(&self) -> String {
        format!(
            "You are a helpful AI planner. Your goal is to create a concise plan \
             for the user's task.\n{LANGUAGE_NOTE}"
        )
    }

    fn parse_breakdown(&self, output: &str) -> Result<GoalDag, WorkerError> {
        let json = extract_json(output).ok_or_else(|| {
            WorkerError::MalformedPlan("planner output did not contain JSON".to_string())
        })?;
        let breakdown: TaskBreakdown = serde_json::from_str(&json)
            .map_err(|e| WorkerError::MalformedPlan(format!("invalid breakdown JSON: {e}")))?;

        let tasks = breakdown
            .tasks
            .into_iter()
            .map(|draft| {
                Task::new(draft.task_id, draft.title, draft.description, draft.assignee)
                    .with_dependencies(draft.dependencies.into_iter().map(TaskId::from).collect())
            })
            .collect();

        let dag = GoalDag::from_tasks(tasks);
        dag.validate()?;
        Ok(dag)
    }
}

#[derive(Debug, Deserialize)]
struct TaskBreakdown {
    tasks: Vec<TaskDraft>,
}

#[derive(Debug, Deserialize)]
struct TaskDraft {
    task_id: String,
    title: String,
    #[serde(default)]
    description: String,
    assignee: Role,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[async_trait]
impl Worker for Planner {
    fn role(&self) -> Role {
        Role::Planner
    }

    async fn act(&self, state: &SharedState) -> Result<StateUpdate, WorkerError> {
        let request_text = state.initial_request().unwrap_or_default().to_string();

        let framing = match self.config.mode {
            PlanMode::Decompose => self.decompose_framing(),
            PlanMode::Narrative => self.narrative_framing(),
        };
        let mut request = ReasoningRequest::new(framing);
        request.push_user(request_text);

        let output = self
            .reasoning
            .invoke(request)
            .await
            .map_err(|e| WorkerError::ReasoningUnavailable(e.to_string()))?;

        match self.config.mode {
            PlanMode::Narrative => Ok(StateUpdate::message(Message::from_role(
                Role::Planner,
                output,
            ))),
            PlanMode::Decompose => {
                let dag = self.parse_breakdown(&output)?;
                info!(task_count = dag.len(), "planner produced goal DAG");
                Ok(
                    StateUpdate::message(Message::from_role(Role::Planner, output))
                        .with_goal_dag(dag)
                        .with_log("Planner decomposed the request into a goal DAG."),
                )
            }
        }
    }
}

/// A task-bound specialist (Researcher, Developer, Reviewer, Analyst).
/// Variants differ only in role and framing text; the selection
/// predicate is shared: first pending task assigned to the role.
pub struct Specialist {
    role: Role,
    framing: String,
    reasoning: Arc<dyn Reasoning>,
}

impl Specialist {
    pub fn new(role: Role, framing: impl Into<String>, reasoning: Arc<dyn Reasoning>) -> Self {
        Self {
            role,
            framing: framing.into(),
            reasoning,
        }
    }

    pub fn researcher(reasoning: Arc<dyn Reasoning>) -> Self {
        Self::new(
            Role::Researcher,
            format!(
                "You are the Researcher specialist. Your goal is to gather information \
                 and provide findings. Use your professional knowledge to address the \
                 task.\n{LANGUAGE_NOTE}"
            ),
            reasoning,
        )
    }

    pub fn developer(reasoning: Arc<dyn Reasoning>) -> Self {
        Self::new(
            Role::Developer,
            format!(
                "You are the Developer specialist. Your goal is to write code, design \
                 systems, and build tools. Provide robust implementations and technical \
                 solutions.\n{LANGUAGE_NOTE}"
            ),
            reasoning,
        )
    }

    pub fn reviewer(reasoning: Arc<dyn Reasoning>) -> Self {
        Self::new(
            Role::Reviewer,
            format!(
                "You are the Reviewer specialist. Review the work produced so far for \
                 correctness and completeness. If acceptable, say 'Approved'.\n\
                 {LANGUAGE_NOTE}"
            ),
            reasoning,
        )
    }

    pub fn analyst(reasoning: Arc<dyn Reasoning>) -> Self {
        Self::new(
            Role::Analyst,
            format!(
                "You are the Analyst specialist. Interpret the findings gathered so \
                 far and draw actionable conclusions.\n{LANGUAGE_NOTE}"
            ),
            reasoning,
        )
    }

    /// Append tool-usage instructions (built by the runtime from its
    /// tool registry) to the role framing.
    pub fn with_tool_instructions(mut self, instructions: &str) -> Self {
        if !instructions.is_empty() {
            self.framing.push_str("\n\n");
            self.framing.push_str(instructions);
        }
        self
    }
}

#[async_trait]
impl Worker for Specialist {
    fn role(&self) -> Role {
        self.role
    }

    async fn act(&self, state: &SharedState) -> Result<StateUpdate, WorkerError> {
        let Some(task) = state
            .goal_dag
            .tasks
            .iter()
            .find(|t| t.assignee == self.role && !t.status.is_completed())
        else {
            debug!(role = %self.role, "no pending task for role");
            return Ok(StateUpdate::message(Message::from_role(
                self.role,
                format!(
                    "No pending {} tasks found.",
                    self.role.as_str().to_lowercase()
                ),
            )));
        };

        let project = state.initial_request().unwrap_or_default();
        let mut request = ReasoningRequest::new(self.framing.clone());
        request.push_user(format!(
            "Project: {project}\nTask: {}",
            task.description
        ));

        let output = self
            .reasoning
            .invoke(request)
            .await
            .map_err(|e| WorkerError::ReasoningUnavailable(e.to_string()))?;

        Ok(
            StateUpdate::message(Message::from_role(self.role, output.clone()))
                .with_knowledge(task.id.as_str(), Value::String(output))
                .with_log(format!("{} completed task: {}", self.role, task.title))
                .with_completed(task.id.clone()),
        )
    }
}

/// Linear-pipeline execution step: simulates carrying out the plan in
/// the most recent transcript entry and reports on it.
pub struct Executor {
    reasoning: Arc<dyn Reasoning>,
}

impl Executor {
    pub fn new(reasoning: Arc<dyn Reasoning>) -> Self {
        Self { reasoning }
    }
}

#[async_trait]
impl Worker for Executor {
    fn role(&self) -> Role {
        Role::Executor
    }

    async fn act(&self, state: &SharedState) -> Result<StateUpdate, WorkerError> {
        let plan = state
            .last_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let mut request = ReasoningRequest::new(format!(
            "You are an executor agent. Your job is to simulate the execution of \
             the plan provided and report the outcome.\n{LANGUAGE_NOTE}"
        ));
        request.push_user(format!("Execute this plan: {plan}"));

        let output = self
            .reasoning
            .invoke(request)
            .await
            .map_err(|e| WorkerError::ReasoningUnavailable(e.to_string()))?;

        Ok(StateUpdate::message(Message::from_role(
            Role::Executor,
            output,
        )))
    }
}

/// Extract the outermost JSON object from free-form model output.
fn extract_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].to_string())
}
