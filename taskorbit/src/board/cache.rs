//! In-memory task collection for the signed-in user.
//!
//! The cache is the source of truth for rendering. It holds at most one
//! entry per [`TaskId`] and remembers a display sequence so that
//! [`snapshot`](TaskCache::snapshot) is deterministic. Column order is
//! derived from that sequence by the partitioner.

use std::collections::HashMap;

use taskorbit_proto::{Task, TaskId};

/// Where a task sits in the display sequence: the id of the task that
/// follows it, or `None` when it is last.
pub type Anchor = Option<TaskId>;

/// Keyed, ordered collection of tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCache {
    /// Task ID -> record.
    tasks: HashMap<TaskId, Task>,
    /// Display sequence; every id here has an entry in `tasks` and vice versa.
    order: Vec<TaskId>,
}

impl TaskCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection with `tasks`.
    ///
    /// Tasks carrying a `position` come first in ascending position order;
    /// tasks without one follow in the order given. Duplicate ids keep the
    /// first slot and the last record.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        let mut incoming: Vec<Task> = Vec::with_capacity(tasks.len());
        let mut seen: HashMap<TaskId, usize> = HashMap::with_capacity(tasks.len());
        for task in tasks {
            if let Some(&slot) = seen.get(&task.id) {
                incoming[slot] = task;
            } else {
                seen.insert(task.id.clone(), incoming.len());
                incoming.push(task);
            }
        }
        // Stable sort: unpositioned tasks keep their relative order.
        incoming.sort_by(|a, b| match (a.position, b.position) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        self.order = incoming.iter().map(|t| t.id.clone()).collect();
        self.tasks = incoming.into_iter().map(|t| (t.id.clone(), t)).collect();
    }

    /// Inserts or replaces a task by id.
    ///
    /// A replaced task keeps its display slot; a new task is appended.
    /// Returns the previous record, if any.
    pub fn upsert(&mut self, task: Task) -> Option<Task> {
        let id = task.id.clone();
        let previous = self.tasks.insert(id.clone(), task);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    /// Removes a task. Absent ids are a no-op.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let removed = self.tasks.remove(id)?;
        self.order.retain(|o| o != id);
        Some(removed)
    }

    /// Returns every task in display order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Task> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .cloned()
            .collect()
    }

    /// Returns the task with `id`.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Returns `true` if a task with `id` is present.
    #[must_use]
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the cache holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Inserts or moves `task` so that it sits immediately before `anchor`.
    ///
    /// A missing anchor (or one naming the task itself) appends the task at
    /// the end of the sequence.
    pub fn place_before(&mut self, task: Task, anchor: Option<&TaskId>) {
        let id = task.id.clone();
        self.order.retain(|o| *o != id);
        let slot = anchor
            .filter(|a| **a != id)
            .and_then(|a| self.order.iter().position(|o| o == a))
            .unwrap_or(self.order.len());
        self.order.insert(slot, id.clone());
        self.tasks.insert(id, task);
    }

    /// Returns the anchor following `id`, or `None` if `id` is absent.
    #[must_use]
    pub fn slot_of(&self, id: &TaskId) -> Option<Anchor> {
        let index = self.order.iter().position(|o| o == id)?;
        Some(self.order.get(index + 1).cloned())
    }

    /// Renames a task in place, keeping its slot.
    ///
    /// If `new` is already present (e.g. a fresh load already returned the
    /// stored record), the entry under `old` is dropped instead.
    /// Returns `false` if `old` is absent.
    pub fn rekey(&mut self, old: &TaskId, new: &TaskId) -> bool {
        if old == new {
            return self.contains(old);
        }
        let Some(mut task) = self.tasks.remove(old) else {
            return false;
        };
        if self.tasks.contains_key(new) {
            self.order.retain(|o| o != old);
            return true;
        }
        task.id = new.clone();
        self.tasks.insert(new.clone(), task);
        if let Some(slot) = self.order.iter_mut().find(|o| *o == old) {
            *slot = new.clone();
        }
        true
    }
}
