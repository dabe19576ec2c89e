//! Offline store - durable staging for unsynced edits
//!
//! This crate holds at most one pending edit per document plus a flat sync
//! queue across documents, on top of a pluggable string key-value backend.
//! Every backend failure is absorbed here: callers see "no data", never an
//! error.

mod backend;
mod config;
mod edit;
mod error;
mod file_backend;
mod queue;

pub use backend::*;
pub use config::*;
pub use edit::*;
pub use error::*;
pub use file_backend::*;
pub use queue::*;
