//! In-memory task repository backing the devstore.
//!
//! Records are kept in insertion order behind a [`RwLock`]. Identifiers are
//! 24-digit hex strings, the same shape the hosted API hands out.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tokio::sync::RwLock;

use taskorbit_proto::{NewTask, Task, TaskId, TaskPatch};

/// Errors returned by [`TaskRepository`] writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepoError {
    /// No task has this id.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// An injected fault.
    #[error("store temporarily unavailable")]
    Unavailable,
}

/// Thread-safe task collection.
#[derive(Debug, Default)]
pub struct TaskRepository {
    tasks: RwLock<Vec<Task>>,
    next_id: AtomicU64,
    failures: AtomicU32,
}

impl TaskRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding `tasks`.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let seeded = u64::try_from(tasks.len()).unwrap_or(u64::MAX);
        Self {
            tasks: RwLock::new(tasks),
            next_id: AtomicU64::new(seeded),
            failures: AtomicU32::new(0),
        }
    }

    /// Makes the next `count` writes fail with [`RepoError::Unavailable`].
    pub fn inject_failures(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn take_failure(&self) -> Result<(), RepoError> {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_or(Ok(()), |_| Err(RepoError::Unavailable))
    }

    /// All tasks owned by `email`, oldest first.
    pub async fn list_by_owner(&self, email: &str) -> Vec<Task> {
        self.tasks
            .read()
            .await
            .iter()
            .filter(|t| t.owner == email)
            .cloned()
            .collect()
    }

    /// The task with `id`.
    pub async fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.read().await.iter().find(|t| t.id == *id).cloned()
    }

    /// Number of stored tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Stores `task` under a fresh id.
    ///
    /// # Errors
    ///
    /// [`RepoError::Unavailable`] when a fault is injected.
    pub async fn insert(&self, task: NewTask) -> Result<TaskId, RepoError> {
        self.take_failure()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = TaskId::new(format!("{n:024x}"));
        self.tasks.write().await.push(task.into_task(id.clone()));
        tracing::debug!(task_id = %id, "task inserted");
        Ok(id)
    }

    /// Applies `patch` to the task with `id`.
    ///
    /// # Errors
    ///
    /// [`RepoError::NotFound`] or an injected [`RepoError::Unavailable`].
    pub async fn update(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), RepoError> {
        self.take_failure()?;
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;
        patch.apply_to(task);
        tracing::debug!(task_id = %id, "task updated");
        Ok(())
    }

    /// Deletes the task with `id`.
    ///
    /// # Errors
    ///
    /// [`RepoError::NotFound`] or an injected [`RepoError::Unavailable`].
    pub async fn remove(&self, id: &TaskId) -> Result<(), RepoError> {
        self.take_failure()?;
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| t.id != *id);
        if tasks.len() == before {
            return Err(RepoError::NotFound(id.clone()));
        }
        tracing::debug!(task_id = %id, "task deleted");
        Ok(())
    }
}
