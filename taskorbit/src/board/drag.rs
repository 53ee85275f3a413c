//! Drag/reorder state machine.
//!
//! ```text
//! Idle ──begin_drag──▶ Dragging ──end_drag(target)──▶ Dropped ─┐
//!                         │                                     ├─▶ Idle
//!                         └────end_drag(None)────▶ Cancelled ──┘
//! ```
//!
//! The controller only computes where a dragged task should land. It
//! returns a [`Transition`] value and never touches the cache or the
//! remote store; the dispatcher acts on the transition.

use taskorbit_proto::{Category, Task, TaskId};

use super::partition::Columns;

/// Gap between consecutive order keys when appending or prepending.
pub const POSITION_STEP: f64 = 1024.0;

/// Smallest gap kept between neighbouring order keys. A column whose keys
/// are closer than this, or missing, is renumbered on the next drop into it.
pub const MIN_POSITION_GAP: f64 = 1e-6;

/// Computes an order key strictly between two neighbours.
///
/// Missing neighbours mean the edge of the column.
#[must_use]
pub fn position_between(prev: Option<f64>, next: Option<f64>) -> f64 {
    match (prev, next) {
        (Some(p), Some(n)) => (n - p).mul_add(0.5, p),
        (Some(p), None) => p + POSITION_STEP,
        (None, Some(n)) => n - POSITION_STEP,
        (None, None) => 0.0,
    }
}

/// What the pointer is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Another task card.
    Task(TaskId),
    /// A column's empty area or header.
    Column(Category),
}

/// A task's column and index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Column.
    pub category: Category,
    /// Zero-based index within the column.
    pub index: usize,
}

/// Controller state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A task is being dragged.
    Dragging {
        /// The dragged task.
        task_id: TaskId,
        /// Where it was picked up.
        origin: Placement,
        /// Last reported hover target.
        hover: Option<DropTarget>,
    },
    /// The last gesture ended on a valid target.
    Dropped,
    /// The last gesture ended without a valid target.
    Cancelled,
}

/// The placement change produced by a drop.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The moved task.
    pub task_id: TaskId,
    /// Placement before the move.
    pub from: Placement,
    /// Placement after the move.
    pub to: Placement,
    /// New order key for the moved task.
    pub position: f64,
    /// The task that follows the moved task in its new column, if any.
    pub anchor: Option<TaskId>,
    /// Other tasks of the destination column that need a new order key,
    /// in column order.
    pub rekeyed: Vec<(TaskId, f64)>,
}

impl Transition {
    /// Returns `(old, new)` categories for a cross-column move.
    #[must_use]
    pub fn category_change(&self) -> Option<(Category, Category)> {
        (self.from.category != self.to.category).then_some((self.from.category, self.to.category))
    }
}

/// Result of [`DragController::end_drag`].
#[derive(Debug, Clone, PartialEq)]
pub enum DragOutcome {
    /// The task moves; hand the transition to the dispatcher.
    Moved(Transition),
    /// Dropped where it already was.
    Unchanged,
    /// No valid drop target.
    Cancelled,
    /// `end_drag` called without a drag in progress.
    NotDragging,
}

enum Resolution {
    Move(Placement),
    Unchanged,
    Invalid,
}

/// Tracks one drag gesture at a time.
#[derive(Debug, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &DragState {
        &self.state
    }

    /// Last hover target of the gesture in progress.
    #[must_use]
    pub const fn hover(&self) -> Option<&DropTarget> {
        match &self.state {
            DragState::Dragging { hover, .. } => hover.as_ref(),
            _ => None,
        }
    }

    /// Returns to `Idle`, abandoning any gesture in progress.
    pub fn reset(&mut self) {
        self.state = DragState::Idle;
    }

    /// Starts dragging `task_id`, recording its current placement.
    ///
    /// Returns `false` (and changes nothing) if a drag is already in
    /// progress or the task is not on the board.
    pub fn begin_drag(&mut self, task_id: &TaskId, columns: &Columns) -> bool {
        if matches!(self.state, DragState::Dragging { .. }) {
            tracing::debug!(%task_id, "begin_drag ignored: drag already in progress");
            return false;
        }
        let Some((category, index)) = columns.locate(task_id) else {
            tracing::debug!(%task_id, "begin_drag ignored: task not on board");
            return false;
        };
        self.state = DragState::Dragging {
            task_id: task_id.clone(),
            origin: Placement { category, index },
            hover: None,
        };
        true
    }

    /// Records the current hover target. Returns `false` when not dragging.
    pub fn update_drag_target(&mut self, target: DropTarget) -> bool {
        match &mut self.state {
            DragState::Dragging { hover, .. } => {
                *hover = Some(target);
                true
            }
            _ => false,
        }
    }

    /// Ends the gesture on `target` and computes the resulting transition.
    ///
    /// Same column: the task moves to the hovered task's index, others
    /// shift by one. Other column: the task is inserted before the hovered
    /// task, or appended when the column itself is the target. Dropping on
    /// the origin column's own area moves the task to the bottom.
    pub fn end_drag(&mut self, target: Option<DropTarget>, columns: &Columns) -> DragOutcome {
        let DragState::Dragging { task_id, .. } = std::mem::take(&mut self.state) else {
            return DragOutcome::NotDragging;
        };
        let Some(target) = target else {
            self.state = DragState::Cancelled;
            return DragOutcome::Cancelled;
        };
        // Re-read the origin: the board may have changed during the drag.
        let Some((category, index)) = columns.locate(&task_id) else {
            self.state = DragState::Cancelled;
            return DragOutcome::Cancelled;
        };
        let from = Placement { category, index };

        match resolve(&task_id, from, &target, columns) {
            Resolution::Invalid => {
                self.state = DragState::Cancelled;
                DragOutcome::Cancelled
            }
            Resolution::Unchanged => {
                self.state = DragState::Dropped;
                DragOutcome::Unchanged
            }
            Resolution::Move(to) => {
                self.state = DragState::Dropped;
                let transition = build_transition(task_id, from, to, columns);
                tracing::debug!(
                    task_id = %transition.task_id,
                    from = %from.category,
                    to = %to.category,
                    index = to.index,
                    "drag resolved"
                );
                DragOutcome::Moved(transition)
            }
        }
    }
}

fn resolve(task_id: &TaskId, from: Placement, target: &DropTarget, columns: &Columns) -> Resolution {
    match target {
        DropTarget::Task(over) if over == task_id => Resolution::Unchanged,
        DropTarget::Task(over) => match columns.locate(over) {
            None => Resolution::Invalid,
            Some((category, index)) if category == from.category && index == from.index => {
                Resolution::Unchanged
            }
            Some((category, index)) => Resolution::Move(Placement { category, index }),
        },
        DropTarget::Column(category) if *category == from.category => {
            let last = columns.column(*category).len().saturating_sub(1);
            if from.index == last {
                Resolution::Unchanged
            } else {
                Resolution::Move(Placement {
                    category: *category,
                    index: last,
                })
            }
        }
        DropTarget::Column(category) => Resolution::Move(Placement {
            category: *category,
            index: columns.column(*category).len(),
        }),
    }
}

fn build_transition(task_id: TaskId, from: Placement, to: Placement, columns: &Columns) -> Transition {
    let destination: Vec<&Task> = columns
        .column(to.category)
        .iter()
        .filter(|t| t.id != task_id)
        .collect();
    let keys = column_keys(&destination);
    let rekeyed = destination
        .iter()
        .zip(&keys)
        .filter(|(task, key)| task.position.is_none_or(|p| p.to_bits() != key.to_bits()))
        .map(|(task, key)| (task.id.clone(), *key))
        .collect();
    let prev = to.index.checked_sub(1).and_then(|i| keys.get(i)).copied();
    let next = keys.get(to.index).copied();
    Transition {
        position: position_between(prev, next),
        anchor: destination.get(to.index).map(|t| t.id.clone()),
        rekeyed,
        task_id,
        from,
        to,
    }
}

/// Order keys for `tasks` in display order.
///
/// Existing keys are kept while every task has one and neighbours stay
/// at least [`MIN_POSITION_GAP`] apart. Otherwise the whole column is
/// renumbered in steps of [`POSITION_STEP`], so that keys written now
/// reproduce the displayed order on the next load.
fn column_keys(tasks: &[&Task]) -> Vec<f64> {
    let current: Option<Vec<f64>> = tasks.iter().map(|t| t.position).collect();
    if let Some(keys) = current
        && keys.windows(2).all(|w| w[1] - w[0] >= MIN_POSITION_GAP)
    {
        return keys;
    }
    (0..tasks.len())
        .map(|i| f64::from(u32::try_from(i).unwrap_or(u32::MAX)) * POSITION_STEP)
        .collect()
}
