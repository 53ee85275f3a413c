//! `TaskOrbit` devstore library.
//!
//! An in-memory implementation of the task API (`/tasks`) for local
//! development and integration tests. Exposes the server so tests can run
//! it in-process on an OS-assigned port.

pub mod config;
pub mod server;
pub mod store;
