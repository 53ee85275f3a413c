//! `TaskOrbit`: kanban task board client with optimistic sync.
//!
//! The board keeps a local cache of the session user's tasks, splits it
//! into columns, turns drag gestures into moves, and writes every change
//! to the remote task store with rollback on failure.

pub mod board;
pub mod config;
pub mod session;
pub mod store;
pub mod sync;
