//! Local changes and the remote writes they translate to.

use std::fmt;

use taskorbit_proto::{Category, NewTask, Task, TaskId, TaskPatch, ValidationError};

use crate::board::cache::TaskCache;
use crate::board::drag::Transition;
use crate::store::{StoreError, TaskStore};

/// Coarse classification of a [`Mutation`], for events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// A new task.
    Create,
    /// A column change.
    PatchCategory,
    /// A title/description edit.
    PatchFields,
    /// A move within a column.
    Reorder,
    /// A new order key for a task that stays in place.
    Rekey,
    /// A permanent removal.
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::PatchCategory => "patch-category",
            Self::PatchFields => "patch-fields",
            Self::Reorder => "reorder",
            Self::Rekey => "rekey",
            Self::Delete => "delete",
        })
    }
}

/// One local change to the task collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Add `task` (carrying a client-generated id) to the board.
    Create {
        /// The full record; its id is replaced by the store's on commit.
        task: Task,
    },
    /// Move a task to another column.
    PatchCategory {
        /// Target task.
        task_id: TaskId,
        /// Destination column.
        category: Category,
        /// New order key, if the move carries one.
        position: Option<f64>,
        /// Task the moved task now precedes.
        anchor: Option<TaskId>,
    },
    /// Edit title and/or description.
    PatchFields {
        /// Target task.
        task_id: TaskId,
        /// New title.
        title: Option<String>,
        /// New description.
        description: Option<String>,
    },
    /// Move a task within its column.
    Reorder {
        /// Target task.
        task_id: TaskId,
        /// New order key.
        position: f64,
        /// Task the moved task now precedes.
        anchor: Option<TaskId>,
    },
    /// Give a task a new order key without moving it.
    Rekey {
        /// Target task.
        task_id: TaskId,
        /// New order key.
        position: f64,
    },
    /// Delete a task.
    Delete {
        /// Target task.
        task_id: TaskId,
    },
}

impl Mutation {
    /// Builds the mutation for a drag transition.
    #[must_use]
    pub fn from_transition(transition: &Transition) -> Self {
        match transition.category_change() {
            Some((_, category)) => Self::PatchCategory {
                task_id: transition.task_id.clone(),
                category,
                position: Some(transition.position),
                anchor: transition.anchor.clone(),
            },
            None => Self::Reorder {
                task_id: transition.task_id.clone(),
                position: transition.position,
                anchor: transition.anchor.clone(),
            },
        }
    }

    /// The key writes that go with a drag transition, one per renumbered
    /// task of the destination column.
    #[must_use]
    pub fn rekeys(transition: &Transition) -> Vec<Self> {
        transition
            .rekeyed
            .iter()
            .map(|(task_id, position)| Self::Rekey {
                task_id: task_id.clone(),
                position: *position,
            })
            .collect()
    }

    /// The task this mutation targets.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        match self {
            Self::Create { task } => &task.id,
            Self::PatchCategory { task_id, .. }
            | Self::PatchFields { task_id, .. }
            | Self::Reorder { task_id, .. }
            | Self::Rekey { task_id, .. }
            | Self::Delete { task_id } => task_id,
        }
    }

    /// The mutation's kind.
    #[must_use]
    pub const fn kind(&self) -> MutationKind {
        match self {
            Self::Create { .. } => MutationKind::Create,
            Self::PatchCategory { .. } => MutationKind::PatchCategory,
            Self::PatchFields { .. } => MutationKind::PatchFields,
            Self::Reorder { .. } => MutationKind::Reorder,
            Self::Rekey { .. } => MutationKind::Rekey,
            Self::Delete { .. } => MutationKind::Delete,
        }
    }

    /// Checks field rules before anything is applied.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`ValidationError`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Create { task } => task.validate(),
            Self::PatchFields {
                title, description, ..
            } => TaskPatch {
                title: title.clone(),
                description: description.clone(),
                ..TaskPatch::default()
            }
            .validate(),
            Self::PatchCategory { .. }
            | Self::Reorder { .. }
            | Self::Rekey { .. }
            | Self::Delete { .. } => Ok(()),
        }
    }

    /// Points the mutation at `id`. Used when the store assigns a new id to
    /// a task created locally.
    pub fn retarget(&mut self, id: &TaskId) {
        match self {
            Self::Create { task } => task.id = id.clone(),
            Self::PatchCategory { task_id, .. }
            | Self::PatchFields { task_id, .. }
            | Self::Reorder { task_id, .. }
            | Self::Rekey { task_id, .. }
            | Self::Delete { task_id } => *task_id = id.clone(),
        }
    }

    /// Replaces an anchor that still names `from` with `to`.
    pub fn retarget_anchor(&mut self, from: &TaskId, to: &TaskId) {
        if let Self::PatchCategory {
            anchor: Some(anchor),
            ..
        }
        | Self::Reorder {
            anchor: Some(anchor),
            ..
        } = self
            && anchor == from
        {
            *anchor = to.clone();
        }
    }

    /// Applies the optimistic effect to `cache`.
    ///
    /// Mutations on a task the cache no longer holds have no effect.
    pub fn apply(&self, cache: &mut TaskCache) {
        match self {
            Self::Create { task } => {
                cache.upsert(task.clone());
            }
            Self::PatchCategory {
                task_id,
                category,
                position,
                anchor,
            } => {
                if let Some(mut task) = cache.get(task_id).cloned() {
                    task.category = *category;
                    if position.is_some() {
                        task.position = *position;
                    }
                    cache.place_before(task, anchor.as_ref());
                }
            }
            Self::PatchFields {
                task_id,
                title,
                description,
            } => {
                if let Some(mut task) = cache.get(task_id).cloned() {
                    if let Some(title) = title {
                        task.title.clone_from(title);
                    }
                    if let Some(description) = description {
                        task.description.clone_from(description);
                    }
                    cache.upsert(task);
                }
            }
            Self::Reorder {
                task_id,
                position,
                anchor,
            } => {
                if let Some(mut task) = cache.get(task_id).cloned() {
                    task.position = Some(*position);
                    cache.place_before(task, anchor.as_ref());
                }
            }
            Self::Rekey { task_id, position } => {
                if let Some(mut task) = cache.get(task_id).cloned() {
                    task.position = Some(*position);
                    cache.upsert(task);
                }
            }
            Self::Delete { task_id } => {
                cache.remove(task_id);
            }
        }
    }

    /// The single store call that makes this change durable.
    #[must_use]
    pub fn remote_write(&self) -> RemoteWrite {
        match self {
            Self::Create { task } => RemoteWrite::Create(task.to_new_task()),
            Self::PatchCategory {
                task_id,
                category,
                position,
                ..
            } => RemoteWrite::Patch(
                task_id.clone(),
                TaskPatch {
                    category: Some(*category),
                    position: *position,
                    ..TaskPatch::default()
                },
            ),
            Self::PatchFields {
                task_id,
                title,
                description,
            } => RemoteWrite::Patch(
                task_id.clone(),
                TaskPatch {
                    title: title.clone(),
                    description: description.clone(),
                    ..TaskPatch::default()
                },
            ),
            Self::Reorder {
                task_id, position, ..
            }
            | Self::Rekey { task_id, position } => RemoteWrite::Patch(
                task_id.clone(),
                TaskPatch {
                    position: Some(*position),
                    ..TaskPatch::default()
                },
            ),
            Self::Delete { task_id } => RemoteWrite::Delete(task_id.clone()),
        }
    }
}

/// A request against the task store.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteWrite {
    /// `POST /tasks`.
    Create(NewTask),
    /// `PATCH /tasks/{id}`.
    Patch(TaskId, TaskPatch),
    /// `DELETE /tasks/{id}`.
    Delete(TaskId),
}

/// What a successful [`RemoteWrite`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The store assigned this id to the new task.
    Created(TaskId),
    /// The patch or delete was applied.
    Applied,
}

impl RemoteWrite {
    /// Sends the request through `store`.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`StoreError`].
    pub async fn send<S: TaskStore>(&self, store: &S) -> Result<WriteOutcome, StoreError> {
        match self {
            Self::Create(task) => store.create(task).await.map(WriteOutcome::Created),
            Self::Patch(id, patch) => store.patch(id, patch).await.map(|()| WriteOutcome::Applied),
            Self::Delete(id) => store.delete(id).await.map(|()| WriteOutcome::Applied),
        }
    }
}
