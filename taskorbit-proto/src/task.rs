//! Task records as exchanged with the remote task store.
//!
//! Field names follow the store's JSON schema: the identifier travels as
//! `_id`, the owner as `email`. A [`NewTask`] is the creation body (no id),
//! a [`TaskPatch`] the partial update body. Patches have no owner field, so
//! ownership cannot change after creation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validate::{ValidationError, validate_description, validate_title};

/// Status flag written on every newly created task.
pub const INITIAL_STATUS: &str = "pending";

/// Unique identifier for a task.
///
/// Either assigned by the store (`insertedId`) or generated locally as a
/// time-ordered UUID v7 until the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a new client-side identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wraps an identifier received from the store.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Board column a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Not started.
    #[serde(rename = "To-Do")]
    ToDo,
    /// Being worked on.
    #[serde(rename = "In Progress")]
    InProgress,
    /// Finished.
    #[serde(rename = "Done")]
    Done,
}

impl Category {
    /// All categories in board (left-to-right) order.
    pub const ALL: [Self; 3] = [Self::ToDo, Self::InProgress, Self::Done];

    /// Returns the wire/display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToDo => "To-Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    /// Position of this column on the board.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::ToDo => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    /// Accepts the wire names plus the lowercase shorthands `todo`,
    /// `inprogress`/`in-progress` and `done`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "To-Do" => Ok(Self::ToDo),
            "In Progress" => Ok(Self::InProgress),
            "Done" => Ok(Self::Done),
            other => match other.to_ascii_lowercase().as_str() {
                "todo" | "to-do" => Ok(Self::ToDo),
                "inprogress" | "in-progress" | "in progress" => Ok(Self::InProgress),
                "done" => Ok(Self::Done),
                _ => Err(ValidationError::UnknownCategory(s.to_string())),
            },
        }
    }
}

/// A task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    #[serde(rename = "_id")]
    pub id: TaskId,
    /// Title, 1–50 characters.
    pub title: String,
    /// Description, 0–200 characters.
    #[serde(default)]
    pub description: String,
    /// Board column.
    pub category: Category,
    /// Owner's stable identifier (email). Immutable after creation.
    #[serde(rename = "email")]
    pub owner: String,
    /// Author display name.
    #[serde(default)]
    pub author: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Free-form status flag.
    #[serde(default)]
    pub status: String,
    /// Fractional order key within the column. Older records have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

impl Task {
    /// Checks the title and description invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_description(&self.description)
    }

    /// Builds the creation body for this task (everything but the id).
    #[must_use]
    pub fn to_new_task(&self) -> NewTask {
        NewTask {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category,
            owner: self.owner.clone(),
            author: self.author.clone(),
            timestamp: self.timestamp,
            status: self.status.clone(),
            position: self.position,
        }
    }
}

/// Creation body for `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    /// Title, 1–50 characters.
    pub title: String,
    /// Description, 0–200 characters.
    #[serde(default)]
    pub description: String,
    /// Board column.
    pub category: Category,
    /// Owner email.
    #[serde(rename = "email")]
    pub owner: String,
    /// Author display name.
    #[serde(default)]
    pub author: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Free-form status flag.
    #[serde(default)]
    pub status: String,
    /// Fractional order key within the column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

impl NewTask {
    /// Checks the title and description invariants.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_description(&self.description)
    }

    /// Attaches an identifier, producing the stored record.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            category: self.category,
            owner: self.owner,
            author: self.author,
            timestamp: self.timestamp,
            status: self.status,
            position: self.position,
        }
    }
}

/// Response body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertedId {
    /// Identifier assigned by the store.
    #[serde(rename = "insertedId")]
    pub inserted_id: TaskId,
}

/// Partial update body for `PATCH /tasks/{id}`.
///
/// Absent fields are left untouched by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// New order key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
}

impl TaskPatch {
    /// Returns `true` if the patch carries no field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.position.is_none()
    }

    /// Checks every present field.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPatch`] for a patch with no fields,
    /// or the first failing field rule.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyPatch);
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }

    /// Writes the present fields onto `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            task.description.clone_from(description);
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(position) = self.position {
            task.position = Some(position);
        }
    }
}
