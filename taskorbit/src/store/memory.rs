//! In-process task store for testing.
//!
//! Keeps records in a `Vec` guarded by a [`parking_lot::Mutex`], records
//! every call it receives, and can be told to fail upcoming calls or to
//! delay writes so tests can observe in-flight behavior.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

use taskorbit_proto::{NewTask, Task, TaskId, TaskPatch};

use super::{StoreError, TaskStore};

/// A call received by an [`InMemoryTaskStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    /// `fetch_by_owner(owner)`.
    Fetch(String),
    /// `create(task)`.
    Create(NewTask),
    /// `patch(id, patch)`.
    Patch(TaskId, TaskPatch),
    /// `delete(id)`.
    Delete(TaskId),
}

/// In-memory [`TaskStore`] with call recording and fault injection.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<Vec<Task>>,
    calls: Mutex<Vec<StoreCall>>,
    failures: Mutex<VecDeque<StoreError>>,
    latency: Mutex<Option<Duration>>,
    next_id: Mutex<u64>,
}

impl InMemoryTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `tasks`.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::new();
        *store.tasks.lock() = tasks;
        store
    }

    /// Makes the next call (of any kind) fail with `error`.
    ///
    /// Calls stack: injecting twice fails the next two calls in order.
    pub fn fail_next(&self, error: StoreError) {
        self.failures.lock().push_back(error);
    }

    /// Delays every write (create/patch/delete) by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Returns the stored records in insertion order.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().clone()
    }

    /// Returns the stored record with `id`, if any.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.tasks.lock().iter().find(|t| t.id == *id).cloned()
    }

    /// Returns every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of write calls (create/patch/delete) received.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| !matches!(c, StoreCall::Fetch(_)))
            .count()
    }

    /// Records the call and pops an injected failure, if any.
    fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        self.calls.lock().push(call);
        self.failures.lock().pop_front().map_or(Ok(()), Err)
    }

    async fn write_delay(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn assign_id(&self) -> TaskId {
        let mut next = self.next_id.lock();
        *next += 1;
        TaskId::new(format!("{:024x}", *next))
    }
}

impl TaskStore for InMemoryTaskStore {
    async fn fetch_by_owner(&self, owner: &str) -> Result<Vec<Task>, StoreError> {
        self.record(StoreCall::Fetch(owner.to_string()))?;
        Ok(self
            .tasks
            .lock()
            .iter()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect())
    }

    async fn create(&self, task: &NewTask) -> Result<TaskId, StoreError> {
        self.write_delay().await;
        self.record(StoreCall::Create(task.clone()))?;
        let id = self.assign_id();
        self.tasks.lock().push(task.clone().into_task(id.clone()));
        Ok(id)
    }

    async fn patch(&self, id: &TaskId, patch: &TaskPatch) -> Result<(), StoreError> {
        self.write_delay().await;
        self.record(StoreCall::Patch(id.clone(), patch.clone()))?;
        let mut tasks = self.tasks.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == *id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        patch.apply_to(task);
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        self.write_delay().await;
        self.record(StoreCall::Delete(id.clone()))?;
        let mut tasks = self.tasks.lock();
        let before = tasks.len();
        tasks.retain(|t| t.id != *id);
        if tasks.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }
}
