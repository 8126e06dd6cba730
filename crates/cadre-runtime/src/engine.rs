//! Orchestration engine.
//!
//! Drives the step loop: supervisor -> worker -> supervisor -> ... ->
//! FINISH. After each worker invocation the engine dispatches any tool
//! directive, applies the reducers, persists a checkpoint, and emits a
//! step event to the caller. The model is single-threaded and
//! cooperative at step granularity: one actor at a time, suspension
//! only at step boundaries, and at most one live run per thread.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures_util::Stream;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use cadre_core::checkpoint::{Checkpoint, CheckpointStore, StoreError, ThreadId};
use cadre_core::dag::Role;
use cadre_core::directive::{apply_directive, ToolRegistry};
use cadre_core::event::StepEvent;
use cadre_core::state::{Message, SharedState, Speaker, StateUpdate};
use cadre_core::supervisor::{NextActor, Router};
use cadre_core::worker::{Worker, WorkerError, WorkerRegistry};

/// Engine limits.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Hard step budget per run; reaching it terminates the run with a
    /// logged terminal event instead of spinning on a stuck planner.
    pub max_steps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_steps: 32 }
    }
}

/// Engine errors surfaced at run start; everything inside a run
/// travels through the step-event stream.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a run is already active for thread '{0}'")]
    ThreadBusy(ThreadId),

    #[error("no checkpoint found for thread '{0}'")]
    NoCheckpoint(ThreadId),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// The stream of step events for one run.
pub struct RunStream {
    events: mpsc::UnboundedReceiver<StepEvent>,
}

impl RunStream {
    /// Receive the next step event, or `None` once the run is over.
    pub async fn next_event(&mut self) -> Option<StepEvent> {
        self.events.recv().await
    }

    /// Drain the run to completion and return every event.
    pub async fn collect(mut self) -> Vec<StepEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }
}

impl Stream for RunStream {
    type Item = StepEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StepEvent>> {
        self.events.poll_recv(cx)
    }
}

/// The orchestration engine. All collaborators are injected and
/// cheap to clone; one engine serves many threads, one run per thread
/// at a time.
#[derive(Clone)]
pub struct Engine {
    router: Arc<dyn Router>,
    workers: Arc<WorkerRegistry>,
    tools: Arc<ToolRegistry>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: EngineConfig,
    active: Arc<Mutex<HashSet<ThreadId>>>,
}

impl Engine {
    pub fn new(
        router: Arc<dyn Router>,
        workers: WorkerRegistry,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            router,
            workers: Arc::new(workers),
            tools: Arc::new(ToolRegistry::new()),
            checkpoints,
            config: EngineConfig::default(),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Attach the tool registry workers' directives dispatch against.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a run for a thread. A previously used thread identifier
    /// resumes from its latest checkpoint with the new request
    /// appended to the transcript; otherwise the run starts from an
    /// empty shared state seeded with the request.
    pub async fn start_run(
        &self,
        thread_id: impl Into<ThreadId>,
        initial_request: impl Into<String>,
    ) -> Result<RunStream, EngineError> {
        let thread_id = thread_id.into();
        let (state, step_seq) = match self.checkpoints.load_latest(&thread_id).await? {
            Some(checkpoint) => {
                info!(
                    %thread_id,
                    step_seq = checkpoint.step_seq,
                    "thread has history; resuming from latest checkpoint"
                );
                let mut state = checkpoint.state;
                state.apply(
                    StateUpdate::message(Message::user(initial_request))
                        .with_log("Run resumed with a new user request."),
                );
                (state, checkpoint.step_seq)
            }
            None => (SharedState::new(initial_request), 0),
        };
        self.launch(thread_id, state, step_seq)
    }

    /// Resume a suspended run exactly where it left off. Fails when
    /// the thread has no checkpoint.
    pub async fn resume_run(
        &self,
        thread_id: impl Into<ThreadId>,
    ) -> Result<RunStream, EngineError> {
        let thread_id = thread_id.into();
        let checkpoint = self
            .checkpoints
            .load_latest(&thread_id)
            .await?
            .ok_or_else(|| EngineError::NoCheckpoint(thread_id.clone()))?;
        self.launch(thread_id, checkpoint.state, checkpoint.step_seq)
    }

    fn launch(
        &self,
        thread_id: ThreadId,
        state: SharedState,
        step_seq: u64,
    ) -> Result<RunStream, EngineError> {
        {
            let mut active = self
                .active
                .lock()
                .map_err(|e| EngineError::Internal(e.to_string()))?;
            if !active.insert(thread_id.clone()) {
                return Err(EngineError::ThreadBusy(thread_id));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let engine = self.clone();
        let run_thread = thread_id.clone();
        tokio::spawn(async move {
            // Keep a sender alive across the release of the thread
            // slot so the stream only closes once the thread is free
            // for the next run.
            let guard = tx.clone();
            engine.drive(run_thread.clone(), state, step_seq, tx).await;
            if let Ok(mut active) = engine.active.lock() {
                active.remove(&run_thread);
            }
            drop(guard);
        });

        Ok(RunStream { events: rx })
    }

    /// The step loop. Sequential by construction: one actor at a time,
    /// strictly ordered steps, checkpoint at every boundary.
    async fn drive(
        &self,
        thread_id: ThreadId,
        mut state: SharedState,
        mut step_seq: u64,
        tx: mpsc::UnboundedSender<StepEvent>,
    ) {
        let budget_start = step_seq;

        loop {
            if step_seq - budget_start >= self.config.max_steps {
                let line = format!(
                    "Step budget of {} exhausted; finishing run.",
                    self.config.max_steps
                );
                warn!(%thread_id, %line);
                state.execution_logs.push(line.clone());
                state.next_actor = NextActor::Finish;
                step_seq += 1;
                let degraded = self.persist(&thread_id, step_seq, &state).await;
                let _ = tx.send(
                    StepEvent::new(
                        thread_id.clone(),
                        step_seq,
                        Speaker::Supervisor,
                        Vec::new(),
                        NextActor::Finish,
                    )
                    .terminal()
                    .degraded(degraded)
                    .with_error(line),
                );
                return;
            }

            let decision = self.router.route(&state).await;
            if let Some(note) = decision.note {
                warn!(%thread_id, %note, "supervisor note");
                state.execution_logs.push(note);
            }
            state.next_actor = decision.next;

            let NextActor::Role { role } = decision.next else {
                step_seq += 1;
                let degraded = self.persist(&thread_id, step_seq, &state).await;
                info!(%thread_id, step_seq, "run finished");
                let _ = tx.send(
                    StepEvent::new(
                        thread_id.clone(),
                        step_seq,
                        Speaker::Supervisor,
                        Vec::new(),
                        NextActor::Finish,
                    )
                    .terminal()
                    .degraded(degraded),
                );
                return;
            };

            let Some((role, worker)) = self.resolve_worker(role, &mut state) else {
                state.next_actor = NextActor::Finish;
                step_seq += 1;
                let degraded = self.persist(&thread_id, step_seq, &state).await;
                let _ = tx.send(
                    StepEvent::new(
                        thread_id.clone(),
                        step_seq,
                        Speaker::Supervisor,
                        Vec::new(),
                        NextActor::Finish,
                    )
                    .terminal()
                    .degraded(degraded),
                );
                return;
            };

            debug!(%thread_id, %role, step_seq, "invoking worker");
            match worker.act(&state).await {
                Ok(mut update) => {
                    for message in &mut update.messages {
                        message.content = apply_directive(&message.content, &self.tools).await;
                    }
                    let new_messages = update.messages.clone();
                    let completed = std::mem::take(&mut update.completed_tasks);
                    state.apply(update);
                    for id in &completed {
                        if let Err(e) = state.goal_dag.mark_completed(id) {
                            // Invariant violation inside the step; the
                            // DAG is left unchanged and the run goes on.
                            error!(%thread_id, task = %id, error = %e, "completion request rejected");
                            state
                                .execution_logs
                                .push(format!("Completion request rejected: {e}"));
                        }
                    }

                    step_seq += 1;
                    let degraded = self.persist(&thread_id, step_seq, &state).await;
                    let event = StepEvent::new(
                        thread_id.clone(),
                        step_seq,
                        Speaker::role(role),
                        new_messages,
                        state.next_actor,
                    )
                    .degraded(degraded);
                    if tx.send(event).is_err() {
                        // Caller abandoned the stream; the last
                        // persisted checkpoint is the durable truth.
                        debug!(%thread_id, "event receiver dropped; stopping run");
                        return;
                    }
                }
                Err(err @ WorkerError::ReasoningUnavailable(_)) => {
                    // No checkpoint: no task status advanced, so
                    // resuming the thread retries this same step.
                    let line = format!("{role} step failed: {err}");
                    error!(%thread_id, %role, error = %err, "step failed; run reported as failed");
                    state.execution_logs.push(line.clone());
                    let _ = tx.send(
                        StepEvent::new(
                            thread_id.clone(),
                            step_seq,
                            Speaker::role(role),
                            Vec::new(),
                            state.next_actor,
                        )
                        .terminal()
                        .with_error(line),
                    );
                    return;
                }
                Err(err) => {
                    // Malformed or invalid planner output: the step
                    // failed but the run stays live with the prior DAG;
                    // the supervisor re-evaluates next step.
                    let line = format!("{role} step failed: {err}");
                    warn!(%thread_id, %role, error = %err, "step failed; supervisor will re-evaluate");
                    state.execution_logs.push(line.clone());
                    step_seq += 1;
                    let degraded = self.persist(&thread_id, step_seq, &state).await;
                    let event = StepEvent::new(
                        thread_id.clone(),
                        step_seq,
                        Speaker::role(role),
                        Vec::new(),
                        state.next_actor,
                    )
                    .degraded(degraded)
                    .with_error(line);
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Look up the routed worker, recovering an out-of-registry signal
    /// with the fixed defaults: Planner while no DAG exists, FINISH
    /// (None) otherwise.
    fn resolve_worker(
        &self,
        role: Role,
        state: &mut SharedState,
    ) -> Option<(Role, Arc<dyn Worker>)> {
        if let Some(worker) = self.workers.get(role) {
            return Some((role, worker));
        }

        state
            .execution_logs
            .push(format!("No worker registered for role {role}."));
        if state.goal_dag.is_empty() && role != Role::Planner {
            if let Some(planner) = self.workers.get(Role::Planner) {
                state
                    .execution_logs
                    .push("Falling back to Planner.".to_string());
                return Some((Role::Planner, planner));
            }
        }
        None
    }

    async fn persist(&self, thread_id: &ThreadId, step_seq: u64, state: &SharedState) -> bool {
        let checkpoint = Checkpoint::new(thread_id.clone(), step_seq, state.clone());
        match self.checkpoints.save(checkpoint).await {
            Ok(()) => false,
            Err(e) => {
                error!(
                    %thread_id,
                    step_seq,
                    error = %e,
                    "checkpoint save failed; run degraded to non-resumable"
                );
                true
            }
        }
    }
}
