//! Optimistic synchronization between the local cache and the task store.
//!
//! Every local change is expressed as a [`Mutation`], applied to the cache
//! at once and then written to the store by the [`MutationDispatcher`].
//! Outcomes come back through a per-mutation [`MutationTicket`] and the
//! dispatcher's [`SyncEvent`] channel.

pub mod dispatcher;
pub mod mutation;

use std::time::Duration;

use tokio::sync::oneshot;

use taskorbit_proto::{TaskId, ValidationError};

use crate::store::StoreError;

pub use dispatcher::MutationDispatcher;
pub use mutation::{Mutation, MutationKind, RemoteWrite, WriteOutcome};

/// A remote write failed and its optimistic effect was rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The store answered with an error or was unreachable.
    #[error("store rejected the change: {0}")]
    Remote(StoreError),

    /// The store did not answer within the write timeout.
    #[error("no answer from the store within {0:?}")]
    Timeout(Duration),

    /// The store rejected the session's credentials.
    #[error("session is no longer authorized")]
    Unauthorized,

    /// The dispatcher went away before the write settled.
    #[error("write abandoned before it settled")]
    Abandoned,
}

impl SyncError {
    /// Returns `true` if the user must sign in again before retrying.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unauthorized => Self::Unauthorized,
            other => Self::Remote(other),
        }
    }
}

/// Loading the owner's tasks failed; the cache is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The store rejected the session's credentials.
    #[error("session is no longer authorized")]
    Unauthorized,

    /// The store did not answer within the timeout.
    #[error("no answer from the store within {0:?}")]
    Timeout(Duration),

    /// Any other store failure.
    #[error("could not load tasks: {0}")]
    Store(StoreError),
}

impl From<StoreError> for FetchError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unauthorized => Self::Unauthorized,
            other => Self::Store(other),
        }
    }
}

/// A mutation was refused before touching the cache or the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Field rules failed.
    #[error("invalid change: {0}")]
    Invalid(#[from] ValidationError),

    /// The mutation targets a task the cache does not know.
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// A create reused an identifier that is already taken.
    #[error("task already exists: {0}")]
    DuplicateTask(TaskId),
}

/// Emitted by the dispatcher whenever a mutation settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The store accepted the write.
    Committed {
        /// Task the mutation targeted (the store-assigned id for creates).
        task_id: TaskId,
        /// What kind of change it was.
        kind: MutationKind,
    },
    /// The store refused the write; the optimistic effect was undone.
    RolledBack {
        /// Task the mutation targeted.
        task_id: TaskId,
        /// What kind of change it was.
        kind: MutationKind,
        /// Why it failed.
        error: SyncError,
    },
}

/// Handle to the outcome of one dispatched mutation.
///
/// Dropping the ticket does not cancel the write.
#[derive(Debug)]
pub struct MutationTicket {
    task_id: TaskId,
    rx: oneshot::Receiver<Result<TaskId, SyncError>>,
    companions: Vec<oneshot::Receiver<Result<TaskId, SyncError>>>,
}

impl MutationTicket {
    /// The task the mutation was queued under.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub(crate) const fn new(
        task_id: TaskId,
        rx: oneshot::Receiver<Result<TaskId, SyncError>>,
    ) -> Self {
        Self {
            task_id,
            rx,
            companions: Vec::new(),
        }
    }

    /// Folds `others` into this ticket so that [`outcome`](Self::outcome)
    /// also waits for them.
    #[must_use]
    pub fn join(mut self, others: Vec<Self>) -> Self {
        for other in others {
            self.companions.push(other.rx);
            self.companions.extend(other.companions);
        }
        self
    }

    /// Waits for the write, and any joined writes, to settle.
    ///
    /// Resolves to the task's current id (store-assigned for creates).
    ///
    /// # Errors
    ///
    /// Returns the [`SyncError`] that caused the rollback. This ticket's own
    /// failure takes precedence over a joined one.
    pub async fn outcome(self) -> Result<TaskId, SyncError> {
        let own = self.rx.await.unwrap_or(Err(SyncError::Abandoned));
        let mut joined = Ok(());
        for rx in self.companions {
            if let Err(e) = rx.await.unwrap_or(Err(SyncError::Abandoned))
                && joined.is_ok()
            {
                joined = Err(e);
            }
        }
        let id = own?;
        joined.map(|()| id)
    }
}
