//! CheckpointStore implementations.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;

use cadre_core::checkpoint::{Checkpoint, CheckpointStore, StoreError, ThreadId};

const DEFAULT_HISTORY_PER_THREAD: usize = 50;

/// In-memory implementation for development and testing. Keeps a
/// bounded history of checkpoints per thread; `load_latest` returns
/// the one with the highest step sequence number.
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<ThreadId, Vec<Checkpoint>>>,
    max_history: usize,
}

impl InMemoryCheckpointStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_HISTORY_PER_THREAD)
    }

    /// Create a store with a hard per-thread history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            checkpoints: RwLock::new(HashMap::new()),
            max_history: max_history.max(1),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        let mut checkpoints = self
            .checkpoints
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let history = checkpoints.entry(checkpoint.thread_id.clone()).or_default();
        history.push(checkpoint);
        history.sort_by_key(|c| c.step_seq);
        while history.len() > self.max_history {
            history.remove(0);
        }
        Ok(())
    }

    async fn load_latest(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, StoreError> {
        let checkpoints = self
            .checkpoints
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(checkpoints
            .get(thread_id)
            .and_then(|history| history.last().cloned()))
    }
}

/// File-backed implementation: one JSON document per thread under a
/// directory, holding that thread's latest checkpoint. Writes go
/// through a temp file and rename, so a crashed write leaves the
/// previous snapshot intact.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn thread_path(&self, thread_id: &ThreadId) -> PathBuf {
        // Thread ids are caller-supplied; keep only filename-safe chars.
        let safe: String = thread_id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        // Last-write-wins per thread: only persist a newer step_seq.
        if let Some(existing) = self.load_latest(&checkpoint.thread_id).await? {
            if existing.step_seq > checkpoint.step_seq {
                return Ok(());
            }
        }

        let path = self.thread_path(&checkpoint.thread_id);
        let payload = serde_json::to_vec_pretty(&checkpoint)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &payload)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Io(e.to_string()))?;

        tracing::debug!(
            thread_id = %checkpoint.thread_id,
            step_seq = checkpoint.step_seq,
            path = %path.display(),
            "checkpoint persisted"
        );
        Ok(())
    }

    async fn load_latest(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>, StoreError> {
        let path = self.thread_path(thread_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e.to_string())),
        };
        let checkpoint = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(checkpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_core::dag::{GoalDag, Role, Task, TaskId};
    use cadre_core::state::{SharedState, StateUpdate};
    use serde_json::json;
    use tokio_test::block_on;

    fn sample_state() -> SharedState {
        let mut state = SharedState::new("build a login page");
        state.apply(
            StateUpdate::default()
                .with_goal_dag(GoalDag::from_tasks(vec![
                    Task::new("T1", "Research", "prior art", Role::Researcher),
                    Task::new("T2", "Build", "implement", Role::Developer)
                        .with_dependencies(vec![TaskId::new("T1")]),
                ]))
                .with_knowledge("T1", json!("findings")),
        );
        state.goal_dag.mark_completed(&TaskId::new("T1")).unwrap();
        state
    }

    fn assert_states_equal(a: &SharedState, b: &SharedState) {
        assert_eq!(a.transcript.len(), b.transcript.len());
        assert_eq!(a.goal_dag.completed_ids(), b.goal_dag.completed_ids());
        assert_eq!(a.knowledge_base, b.knowledge_base);
    }

    #[test]
    fn test_in_memory_round_trip_reproduces_state() {
        block_on(async {
            let store = InMemoryCheckpointStore::new();
            let state = sample_state();
            store
                .save(Checkpoint::new("thread-1", 3, state.clone()))
                .await
                .unwrap();

            let loaded = store
                .load_latest(&ThreadId::new("thread-1"))
                .await
                .unwrap()
                .expect("checkpoint");
            assert_eq!(loaded.step_seq, 3);
            assert_states_equal(&state, &loaded.state);
        });
    }

    #[test]
    fn test_in_memory_latest_wins() {
        block_on(async {
            let store = InMemoryCheckpointStore::new();
            store
                .save(Checkpoint::new("thread-1", 1, SharedState::new("a")))
                .await
                .unwrap();
            store
                .save(Checkpoint::new("thread-1", 2, sample_state()))
                .await
                .unwrap();

            let loaded = store
                .load_latest(&ThreadId::new("thread-1"))
                .await
                .unwrap()
                .expect("checkpoint");
            assert_eq!(loaded.step_seq, 2);
        });
    }

    #[test]
    fn test_in_memory_unknown_thread_is_absent() {
        block_on(async {
            let store = InMemoryCheckpointStore::new();
            assert!(store
                .load_latest(&ThreadId::new("missing"))
                .await
                .unwrap()
                .is_none());
        });
    }

    #[test]
    fn test_file_store_round_trip() {
        block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let store = FileCheckpointStore::new(dir.path());
            let state = sample_state();

            store
                .save(Checkpoint::new("thread/1", 5, state.clone()))
                .await
                .unwrap();

            let loaded = store
                .load_latest(&ThreadId::new("thread/1"))
                .await
                .unwrap()
                .expect("checkpoint");
            assert_eq!(loaded.step_seq, 5);
            assert_states_equal(&state, &loaded.state);
        });
    }

    #[test]
    fn test_file_store_ignores_stale_write() {
        block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let store = FileCheckpointStore::new(dir.path());

            store
                .save(Checkpoint::new("t", 7, sample_state()))
                .await
                .unwrap();
            store
                .save(Checkpoint::new("t", 3, SharedState::new("stale")))
                .await
                .unwrap();

            let loaded = store
                .load_latest(&ThreadId::new("t"))
                .await
                .unwrap()
                .expect("checkpoint");
            assert_eq!(loaded.step_seq, 7);
        });
    }
}
