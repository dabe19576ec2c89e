//! Autosave - debounced, offline-tolerant saving of one document
//!
//! This crate provides:
//!
//! - `connection`: connectivity tracking with one-shot reconnection events
//! - `writer`: the `ContentWriter` collaborator that persists content remotely
//! - `controller`: the per-document `AutoSaveController` state machine
//! - `status`: `SaveStatus` values and display info
//! - `config`: timing and retry configuration
//!
//! Edits that cannot reach the writer land in an
//! [`offline_store::OfflineQueueStore`] and are synced when the connection
//! returns.
//!
//! # Example
//!
//! ```no_run
//! use autosave::{AutoSaveController, ConnectionMonitor, MemoryContentWriter};
//! use offline_store::OfflineQueueStore;
//!
//! # async fn demo() {
//! let monitor = ConnectionMonitor::new(Some(true));
//! let controller = AutoSaveController::builder("doc-1", MemoryContentWriter::new())
//!     .store(OfflineQueueStore::in_memory())
//!     .monitor(monitor.clone())
//!     .spawn();
//!
//! controller.set_content("first draft");
//! controller.force_save().await;
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod status;
pub mod writer;

pub use config::AutoSaveConfig;
pub use connection::{ConnectionMonitor, ConnectionStatus};
pub use controller::{AutoSaveBuilder, AutoSaveController, SaveCallbacks};
pub use error::{WriteError, WriteResult};
pub use status::{SaveStatus, SaveStatusInfo};
pub use writer::{ContentWriter, FileContentWriter, MemoryContentWriter, WriteAttempt};

pub use offline_store;
