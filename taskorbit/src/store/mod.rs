//! Remote task store abstraction.
//!
//! Defines the [`TaskStore`] trait that every backend must satisfy.
//! Concrete implementations:
//! - [`http::HttpTaskStore`]: REST/JSON client for the hosted task API
//! - [`memory::InMemoryTaskStore`]: in-process store with fault injection for testing

pub mod http;
pub mod memory;

use taskorbit_proto::{NewTask, Task, TaskId, TaskPatch};

/// Errors that can occur while talking to a task store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The request never produced a response (DNS, connect, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within the client timeout.
    #[error("request timed out")]
    Timeout,

    /// The store answered with a non-success status.
    #[error("store returned HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The store rejected the caller's credentials (401/403).
    #[error("request unauthorized")]
    Unauthorized,

    /// The addressed task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The store is misconfigured (bad base URL, TLS setup).
    #[error("store configuration error: {0}")]
    Config(String),

    /// The store is temporarily unavailable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Async interface to the remote task store.
///
/// Mirrors the four endpoints of the task API. Implementations never
/// touch the local cache; reconciliation is the dispatcher's job.
pub trait TaskStore: Send + Sync {
    /// Fetch every task owned by `owner` (the session user's email).
    fn fetch_by_owner(
        &self,
        owner: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, StoreError>> + Send;

    /// Insert a new task and return the identifier the store assigned.
    fn create(
        &self,
        task: &NewTask,
    ) -> impl std::future::Future<Output = Result<TaskId, StoreError>> + Send;

    /// Apply a partial update to an existing task.
    fn patch(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Permanently delete a task.
    fn delete(&self, id: &TaskId)
    -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
