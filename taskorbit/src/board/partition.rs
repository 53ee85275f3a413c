//! Column partitioner.
//!
//! Splits the flat task sequence into the three board columns. The split
//! is stable: within a column, tasks keep their relative input order.

use taskorbit_proto::{Category, Task, TaskId};

/// The three board columns, each an ordered list of tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns {
    todo: Vec<Task>,
    in_progress: Vec<Task>,
    done: Vec<Task>,
}

impl Columns {
    /// Returns the tasks in `category`, top to bottom.
    #[must_use]
    pub fn column(&self, category: Category) -> &[Task] {
        match category {
            Category::ToDo => &self.todo,
            Category::InProgress => &self.in_progress,
            Category::Done => &self.done,
        }
    }

    fn column_mut(&mut self, category: Category) -> &mut Vec<Task> {
        match category {
            Category::ToDo => &mut self.todo,
            Category::InProgress => &mut self.in_progress,
            Category::Done => &mut self.done,
        }
    }

    /// Iterates columns in board order (To-Do, In Progress, Done).
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Task])> {
        Category::ALL.into_iter().map(|c| (c, self.column(c)))
    }

    /// Finds the column and index of the task with `id`.
    #[must_use]
    pub fn locate(&self, id: &TaskId) -> Option<(Category, usize)> {
        self.iter().find_map(|(category, tasks)| {
            tasks
                .iter()
                .position(|t| t.id == *id)
                .map(|index| (category, index))
        })
    }

    /// Total number of tasks across all columns.
    #[must_use]
    pub fn total(&self) -> usize {
        self.todo.len() + self.in_progress.len() + self.done.len()
    }

    /// Returns the ids in `category`, top to bottom.
    #[must_use]
    pub fn ids(&self, category: Category) -> Vec<TaskId> {
        self.column(category).iter().map(|t| t.id.clone()).collect()
    }
}

/// Groups `tasks` by category, preserving input order within each group.
///
/// Every task lands in exactly one column; none is duplicated or dropped.
#[must_use]
pub fn partition(tasks: &[Task]) -> Columns {
    let mut columns = Columns::default();
    for task in tasks {
        columns.column_mut(task.category).push(task.clone());
    }
    columns
}
