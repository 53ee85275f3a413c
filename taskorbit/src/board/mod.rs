//! The task board: cache, columns and drag gestures for the session user.
//!
//! [`Board`] ties the pieces together. It reads the owner from the
//! injected [`Session`], lets the [`DragController`] turn gestures into
//! transitions, and hands every change to the [`MutationDispatcher`].

pub mod cache;
pub mod drag;
pub mod partition;

use chrono::Utc;

use taskorbit_proto::{Category, INITIAL_STATUS, Task, TaskId};

use crate::session::{AuthError, Session};
use crate::store::TaskStore;
use crate::sync::{DispatchError, FetchError, Mutation, MutationDispatcher, MutationTicket};

pub use cache::TaskCache;
pub use drag::{DragController, DragOutcome, DragState, DropTarget, Placement, Transition};
pub use partition::{Columns, partition};

/// User input for a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    /// Title, 1–50 characters after trimming.
    pub title: String,
    /// Description, up to 200 characters.
    pub description: String,
    /// Starting column.
    pub category: Category,
}

/// Errors surfaced by [`Board`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// No usable session.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Loading the board failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The change was refused before it was applied.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl BoardError {
    /// Returns `true` if the user must sign in again.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// The session user's board.
pub struct Board<S: TaskStore + 'static> {
    session: Session,
    dispatcher: MutationDispatcher<S>,
    drag: DragController,
}

impl<S: TaskStore + 'static> Board<S> {
    /// Creates a board over `dispatcher` for whoever `session` reports.
    #[must_use]
    pub fn new(session: Session, dispatcher: MutationDispatcher<S>) -> Self {
        Self {
            session,
            dispatcher,
            drag: DragController::new(),
        }
    }

    /// The session this board follows.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The dispatcher behind this board.
    #[must_use]
    pub const fn dispatcher(&self) -> &MutationDispatcher<S> {
        &self.dispatcher
    }

    /// Loads the session user's tasks and returns the columns.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotSignedIn`] without a user.
    /// - [`AuthError::SessionExpired`] if the store refuses the session.
    /// - [`FetchError`] for other store failures; the board keeps its
    ///   previous contents.
    pub async fn load(&self) -> Result<Columns, BoardError> {
        let user = self.session.require_user()?;
        match self.dispatcher.load(&user.email).await {
            Ok(tasks) => Ok(partition(&tasks)),
            Err(FetchError::Unauthorized) => Err(AuthError::SessionExpired.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// The current columns.
    #[must_use]
    pub fn columns(&self) -> Columns {
        self.dispatcher.columns()
    }

    /// The cached task with `id`.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.dispatcher.get(id)
    }

    /// Adds a task to the bottom of `draft.category`, owned by the session
    /// user.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotSignedIn`] without a user, or
    /// [`DispatchError::Invalid`] if the draft breaks a field rule (nothing
    /// is sent).
    pub fn add_task(&self, draft: TaskDraft) -> Result<MutationTicket, BoardError> {
        let user = self.session.require_user()?;
        let columns = self.columns();
        let column = columns.column(draft.category);
        // Legacy columns without order keys keep server order for new tasks.
        let position = match column.last() {
            None => Some(drag::position_between(None, None)),
            Some(last) => last.position.map(|p| drag::position_between(Some(p), None)),
        };
        let task = Task {
            id: TaskId::generate(),
            title: draft.title.trim().to_string(),
            description: draft.description,
            category: draft.category,
            owner: user.email,
            author: user.display_name,
            timestamp: Utc::now(),
            status: INITIAL_STATUS.to_string(),
            position,
        };
        tracing::debug!(task_id = %task.id, category = %task.category, "adding task");
        Ok(self.dispatcher.dispatch(Mutation::Create { task })?)
    }

    /// Current drag state.
    #[must_use]
    pub const fn drag_state(&self) -> &DragState {
        self.drag.state()
    }

    /// Starts dragging `id`. See [`DragController::begin_drag`].
    pub fn begin_drag(&mut self, id: &TaskId) -> bool {
        let columns = self.columns();
        self.drag.begin_drag(id, &columns)
    }

    /// Reports the current hover target.
    pub fn update_drag_target(&mut self, target: DropTarget) -> bool {
        self.drag.update_drag_target(target)
    }

    /// Ends the gesture and dispatches the resulting move, if any.
    ///
    /// When the destination column had to be renumbered, the new keys of
    /// its other tasks are written first and the returned ticket waits for
    /// them too. Returns `None` when the drop changed nothing or was
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the move could not be queued.
    pub fn end_drag(
        &mut self,
        target: Option<DropTarget>,
    ) -> Result<Option<MutationTicket>, BoardError> {
        let columns = self.columns();
        let DragOutcome::Moved(transition) = self.drag.end_drag(target, &columns) else {
            return Ok(None);
        };
        if !transition.rekeyed.is_empty() {
            tracing::debug!(
                category = %transition.to.category,
                count = transition.rekeyed.len(),
                "renumbering column"
            );
        }
        let rekeys = Mutation::rekeys(&transition)
            .into_iter()
            .map(|m| self.dispatcher.dispatch(m))
            .collect::<Result<Vec<_>, _>>()?;
        let ticket = self
            .dispatcher
            .dispatch(Mutation::from_transition(&transition))?;
        Ok(Some(ticket.join(rekeys)))
    }

    /// Moves `id` onto `target` as one complete gesture.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownTask`] if `id` is not on the board.
    pub fn move_task(
        &mut self,
        id: &TaskId,
        target: DropTarget,
    ) -> Result<Option<MutationTicket>, BoardError> {
        self.drag.reset();
        if !self.begin_drag(id) {
            return Err(DispatchError::UnknownTask(id.clone()).into());
        }
        self.update_drag_target(target.clone());
        let ticket = self.end_drag(Some(target));
        self.drag.reset();
        ticket
    }

    /// Changes the title and/or description of `id`.
    ///
    /// # Errors
    ///
    /// [`DispatchError`] if the edit is empty, invalid or targets an
    /// unknown task.
    pub fn edit_task(
        &self,
        id: &TaskId,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<MutationTicket, BoardError> {
        Ok(self.dispatcher.dispatch(Mutation::PatchFields {
            task_id: id.clone(),
            title: title.map(|t| t.trim().to_string()),
            description,
        })?)
    }

    /// Deletes `id` permanently.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnknownTask`] if `id` is not on the board.
    pub fn delete_task(&self, id: &TaskId) -> Result<MutationTicket, BoardError> {
        Ok(self.dispatcher.dispatch(Mutation::Delete {
            task_id: id.clone(),
        })?)
    }
}
