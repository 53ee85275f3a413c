//! Field validation shared by the client and the dev store.
//!
//! Lengths are counted in Unicode scalar values, not bytes.

use thiserror::Error;

/// Maximum allowed task title length in characters.
pub const MAX_TITLE_LENGTH: usize = 50;

/// Maximum allowed task description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 200;

/// A task field failed validation before any remote call was made.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is empty or whitespace-only.
    #[error("task title cannot be empty")]
    TitleEmpty,
    /// Title exceeds [`MAX_TITLE_LENGTH`].
    #[error("task title too long ({len} characters, max {MAX_TITLE_LENGTH})")]
    TitleTooLong {
        /// Actual length in characters.
        len: usize,
    },
    /// Description exceeds [`MAX_DESCRIPTION_LENGTH`].
    #[error("task description too long ({len} characters, max {MAX_DESCRIPTION_LENGTH})")]
    DescriptionTooLong {
        /// Actual length in characters.
        len: usize,
    },
    /// Category string is not one of the three board columns.
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    /// A patch that changes nothing.
    #[error("patch contains no fields")]
    EmptyPatch,
}

/// Checks a task title against the length rules.
///
/// # Errors
///
/// Returns [`ValidationError::TitleEmpty`] for empty or whitespace-only
/// titles and [`ValidationError::TitleTooLong`] past 50 characters.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LENGTH {
        return Err(ValidationError::TitleTooLong { len });
    }
    Ok(())
}

/// Checks a task description against the length rule. Empty is allowed.
///
/// # Errors
///
/// Returns [`ValidationError::DescriptionTooLong`] past 200 characters.
pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    let len = description.chars().count();
    if len > MAX_DESCRIPTION_LENGTH {
        return Err(ValidationError::DescriptionTooLong { len });
    }
    Ok(())
}
