//! Remote content writers.
//!
//! `ContentWriter` is the collaborator that actually persists a document's
//! content somewhere durable (an HTTP API, a database, a directory). Any
//! error counts as a failed save; the controller does not distinguish causes.

use crate::{WriteError, WriteResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Writes a full content snapshot for a document.
#[trait_variant::make(Send)]
pub trait ContentWriter: Send + Sync {
    /// Persist `content` as the current state of `document_id`.
    async fn write(&self, document_id: &str, content: &str) -> WriteResult<()>;
}

impl<W: ContentWriter> ContentWriter for Arc<W> {
    async fn write(&self, document_id: &str, content: &str) -> WriteResult<()> {
        (**self).write(document_id, content).await
    }
}

/// Writer that stores each document as a file in a directory.
///
/// File names are the URL-encoded document id with a `.txt` extension.
#[derive(Debug, Clone)]
pub struct FileContentWriter {
    root: PathBuf,
}

impl FileContentWriter {
    /// Create a writer rooted at `root`. The directory is created on first
    /// write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path of the file holding `document_id`.
    pub fn path_for(&self, document_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.txt", urlencoding::encode(document_id)))
    }

    /// Read back the stored content for `document_id`, if any.
    pub async fn read(&self, document_id: &str) -> WriteResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(document_id)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ContentWriter for FileContentWriter {
    async fn write(&self, document_id: &str, content: &str) -> WriteResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(document_id);
        let temp = path.with_extension("tmp");
        tokio::fs::write(&temp, content).await?;
        tokio::fs::rename(&temp, &path).await?;
        Ok(())
    }
}

/// One call made against a `MemoryContentWriter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAttempt {
    pub document_id: String,
    pub content: String,
    pub at: Instant,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct MemoryWriterState {
    documents: HashMap<String, String>,
    attempts: Vec<WriteAttempt>,
    fail_next: usize,
    fail_all: bool,
    latency: Duration,
}

/// In-memory writer with scriptable failures.
///
/// Intended for development and tests: it records every attempt, and can be
/// told to reject the next N writes or every write until further notice.
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentWriter {
    inner: Arc<Mutex<MemoryWriterState>>,
}

impl MemoryContentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` writes.
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Reject every write while `failing` is set.
    pub fn set_failing(&self, failing: bool) {
        self.lock().fail_all = failing;
    }

    /// Delay every write by `latency` before it completes.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Last successfully written content for `document_id`.
    pub fn document(&self, document_id: &str) -> Option<String> {
        self.lock().documents.get(document_id).cloned()
    }

    /// Every attempt so far, oldest first.
    pub fn attempts(&self) -> Vec<WriteAttempt> {
        self.lock().attempts.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.lock().attempts.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryWriterState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContentWriter for MemoryContentWriter {
    async fn write(&self, document_id: &str, content: &str) -> WriteResult<()> {
        let (fail, latency) = {
            let mut state = self.lock();
            let fail = state.fail_all || state.fail_next > 0;
            state.fail_next = state.fail_next.saturating_sub(1);
            state.attempts.push(WriteAttempt {
                document_id: document_id.to_string(),
                content: content.to_string(),
                at: Instant::now(),
                succeeded: !fail,
            });
            (fail, state.latency)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if fail {
            return Err(WriteError::Transport("remote unavailable".to_string()));
        }
        self.lock()
            .documents
            .insert(document_id.to_string(), content.to_string());
        Ok(())
    }
}
