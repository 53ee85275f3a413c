//! Shared task model and JSON wire format for `TaskOrbit`.

pub mod task;
pub mod validate;

pub use task::{Category, INITIAL_STATUS, InsertedId, NewTask, Task, TaskId, TaskPatch};
pub use validate::ValidationError;
