//! Per-document autosave controller.
//!
//! The controller debounces content changes, writes online-first through a
//! `ContentWriter`, and falls back to the offline store when the connection
//! is down or the write fails. When the `ConnectionMonitor` reports a
//! reconnection it waits a settle delay and then syncs the queued edit,
//! retrying with linear backoff up to the configured cap.
//!
//! # Timers
//!
//! Every timer (debounce, status revert, sync/retry) is a spawned task whose
//! handle the controller owns; `shutdown` aborts them all. A timer that fires
//! hands the actual write to a detached task, so a write already in flight
//! runs to completion even after shutdown. Its outcome still reaches the
//! offline store, but no longer touches the status or callbacks.
//!
//! # Ordering
//!
//! Saves and syncs for one document share an in-flight flag. A debounced or
//! forced save that finds a write in flight is dropped; a sync that finds one
//! reschedules itself without counting an attempt.

use crate::{
    AutoSaveConfig, ConnectionMonitor, ConnectionStatus, ContentWriter, SaveStatus,
    SaveStatusInfo, WriteError,
};
use chrono::{DateTime, Utc};
use offline_store::OfflineQueueStore;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

type Hook = Box<dyn Fn() + Send + Sync>;
type ErrorHook = Box<dyn Fn(&WriteError) + Send + Sync>;

/// Optional lifecycle callbacks
#[derive(Default)]
pub struct SaveCallbacks {
    on_save_start: Option<Hook>,
    on_save_complete: Option<Hook>,
    on_save_error: Option<ErrorHook>,
}

impl fmt::Debug for SaveCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveCallbacks")
            .field("on_save_start", &self.on_save_start.is_some())
            .field("on_save_complete", &self.on_save_complete.is_some())
            .field("on_save_error", &self.on_save_error.is_some())
            .finish()
    }
}

impl SaveCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called right before a remote write starts
    pub fn on_save_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_save_start = Some(Box::new(f));
        self
    }

    /// Called after a remote write succeeds
    pub fn on_save_complete(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_save_complete = Some(Box::new(f));
        self
    }

    /// Called after a remote write fails
    pub fn on_save_error(mut self, f: impl Fn(&WriteError) + Send + Sync + 'static) -> Self {
        self.on_save_error = Some(Box::new(f));
        self
    }
}

/// Timers owned by the controller
#[derive(Default)]
struct Timers {
    debounce: Option<JoinHandle<()>>,
    revert: Option<JoinHandle<()>>,
    sync: Option<JoinHandle<()>>,
}

impl Timers {
    fn abort_all(&mut self) {
        for handle in [self.debounce.take(), self.revert.take(), self.sync.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

struct EditorState {
    /// Latest content handed to the controller
    content: String,
    /// Last content known to be persisted remotely
    last_saved: String,
    last_saved_at: Option<DateTime<Utc>>,
    enabled: bool,
    timers: Timers,
}

/// Clears the in-flight flag when dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Shared<W> {
    document_id: String,
    config: AutoSaveConfig,
    writer: W,
    store: OfflineQueueStore,
    monitor: ConnectionMonitor,
    callbacks: SaveCallbacks,
    state: Mutex<EditorState>,
    status: watch::Sender<SaveStatus>,
    in_flight: AtomicBool,
    closed: AtomicBool,
}

impl<W: ContentWriter + 'static> Shared<W> {
    fn state(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn set_status(self: &Arc<Self>, status: SaveStatus) {
        if !self.is_live() {
            return;
        }

        let revert_after = match status {
            SaveStatus::Saved => Some(self.config.saved_revert()),
            SaveStatus::Error => Some(self.config.error_revert()),
            _ => None,
        };

        let mut state = self.state();
        if let Some(previous) = state.timers.revert.take() {
            previous.abort();
        }
        self.status.send_replace(status);

        if let Some(delay) = revert_after {
            let shared = Arc::clone(self);
            let sleep = tokio::time::sleep(delay);
            state.timers.revert = Some(tokio::spawn(async move {
                sleep.await;
                shared.revert_to_idle(status);
            }));
        }
    }

    fn revert_to_idle(&self, expected: SaveStatus) {
        // Only revert if nothing newer replaced the status meanwhile
        self.status.send_if_modified(|current| {
            if *current == expected {
                *current = SaveStatus::Idle;
                true
            } else {
                false
            }
        });
    }

    fn arm_debounce(self: &Arc<Self>, state: &mut EditorState) {
        if let Some(previous) = state.timers.debounce.take() {
            previous.abort();
        }

        let shared = Arc::clone(self);
        let sleep = tokio::time::sleep(self.config.delay());
        state.timers.debounce = Some(tokio::spawn(async move {
            sleep.await;
            tokio::spawn(async move { shared.save().await });
        }));
        tracing::debug!(document_id = %self.document_id, "Debounce armed");
    }

    fn schedule_sync(self: &Arc<Self>, delay: Duration) {
        if !self.is_live() {
            return;
        }

        let shared = Arc::clone(self);
        let sleep = tokio::time::sleep(delay);
        let handle = tokio::spawn(async move {
            sleep.await;
            tokio::spawn(async move { shared.sync_pending(false).await });
        });

        if let Some(previous) = self.state().timers.sync.replace(handle) {
            previous.abort();
        }
    }

    fn cancel_sync(&self) {
        if let Some(handle) = self.state().timers.sync.take() {
            handle.abort();
        }
    }

    fn save_started(&self) {
        match &self.callbacks.on_save_start {
            Some(f) if self.is_live() => f(),
            _ => {}
        }
    }

    fn save_completed(&self) {
        match &self.callbacks.on_save_complete {
            Some(f) if self.is_live() => f(),
            _ => {}
        }
    }

    fn save_failed(&self, error: &WriteError) {
        match &self.callbacks.on_save_error {
            Some(f) if self.is_live() => f(error),
            _ => {}
        }
    }

    /// Record `content` as persisted remotely and pick the status to report
    ///
    /// Newer content that arrived while the write was in flight keeps the
    /// status at `Pending`.
    fn mark_persisted(&self, content: String) -> SaveStatus {
        let mut state = self.state();
        state.last_saved = content;
        state.last_saved_at = Some(Utc::now());
        if state.content == state.last_saved {
            SaveStatus::Saved
        } else {
            SaveStatus::Pending
        }
    }

    /// Save the latest content: remotely when online, offline otherwise
    async fn save(self: &Arc<Self>) {
        let (content, unchanged) = {
            let state = self.state();
            (state.content.clone(), state.content == state.last_saved)
        };

        // A queued edit that differs from the persisted snapshot would win on
        // the next sync, so it has to be superseded even by unchanged content
        let stale_edit = unchanged
            && self
                .store
                .get_edit(&self.document_id)
                .is_some_and(|edit| edit.content != content);

        if unchanged && !stale_edit {
            tracing::debug!(document_id = %self.document_id, "Content unchanged, skipping save");
            if *self.status.borrow() == SaveStatus::Pending {
                self.set_status(SaveStatus::Saved);
            }
            return;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::warn!(
                "Write in flight for {}, dropping save of newer content",
                self.document_id
            );
            return;
        };

        if !self.monitor.is_online() {
            self.store.save_edit(&self.document_id, &content);
            self.set_status(SaveStatus::Offline);
            tracing::info!("Offline, kept edit for {} locally", self.document_id);
            return;
        }

        self.set_status(SaveStatus::Saving);
        self.save_started();

        match self.writer.write(&self.document_id, &content).await {
            Ok(()) => {
                self.store.remove_edit(&self.document_id);
                let status = self.mark_persisted(content);
                self.set_status(status);
                self.save_completed();
            }
            Err(e) => {
                tracing::warn!("Save failed for {}, kept edit locally: {}", self.document_id, e);
                self.store.save_edit(&self.document_id, &content);
                self.set_status(SaveStatus::Error);
                self.save_failed(&e);
            }
        }
    }

    /// Push the queued offline edit through the writer
    ///
    /// `manual` attempts even an edit whose retries are exhausted.
    async fn sync_pending(self: &Arc<Self>, manual: bool) {
        let Some(edit) = self.store.get_edit(&self.document_id) else {
            tracing::debug!(document_id = %self.document_id, "No offline edit to sync");
            return;
        };

        let max_retries = self.config.max_retries;
        if !manual && edit.is_exhausted(max_retries) {
            tracing::debug!(
                document_id = %self.document_id,
                retry_count = edit.retry_count,
                "Offline edit abandoned, not retrying"
            );
            return;
        }

        if !self.monitor.is_online() {
            tracing::debug!(document_id = %self.document_id, "Still offline, sync deferred");
            return;
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            self.schedule_sync(self.config.retry_delay());
            return;
        };

        self.set_status(SaveStatus::Saving);
        self.save_started();

        match self.writer.write(&self.document_id, &edit.content).await {
            Ok(()) => {
                self.store.remove_edit(&self.document_id);
                tracing::info!(
                    "Synced offline edit {} after {} failed attempts",
                    edit.id,
                    edit.retry_count
                );
                let status = self.mark_persisted(edit.content);
                self.set_status(status);
                self.save_completed();
            }
            Err(e) => {
                let retry_count = self
                    .store
                    .record_failed_attempt(&self.document_id)
                    .map(|updated| updated.retry_count)
                    .unwrap_or(edit.retry_count.saturating_add(1));
                self.set_status(SaveStatus::Error);
                self.save_failed(&e);

                if retry_count < max_retries {
                    let delay = self.config.backoff(retry_count);
                    tracing::warn!(
                        "Sync attempt {} for {} failed, retrying in {:?}: {}",
                        retry_count,
                        self.document_id,
                        delay,
                        e
                    );
                    self.schedule_sync(delay);
                } else {
                    tracing::error!(
                        "Giving up on syncing {} after {} attempts, edit kept locally: {}",
                        self.document_id,
                        retry_count,
                        e
                    );
                }
            }
        }
    }

    fn handle_connectivity(self: &Arc<Self>, status: &ConnectionStatus, last_reconnect: &mut u64) {
        if !status.is_online {
            self.cancel_sync();
            return;
        }
        if status.reconnects == *last_reconnect {
            return;
        }
        *last_reconnect = status.reconnects;
        self.queue_sync_if_pending("Connection restored");
    }

    fn queue_sync_if_pending(self: &Arc<Self>, reason: &str) {
        match self.store.get_edit(&self.document_id) {
            Some(edit) if !edit.is_exhausted(self.config.max_retries) => {
                tracing::info!(
                    "{}, syncing offline edit for {} in {:?}",
                    reason,
                    self.document_id,
                    self.config.settle_delay()
                );
                self.schedule_sync(self.config.settle_delay());
            }
            Some(_) => {
                tracing::debug!(document_id = %self.document_id, "Offline edit abandoned, not syncing");
            }
            None => {}
        }
    }
}

/// Builder for [`AutoSaveController`]
pub struct AutoSaveBuilder<W> {
    document_id: String,
    writer: W,
    initial_content: String,
    store: Option<OfflineQueueStore>,
    monitor: Option<ConnectionMonitor>,
    config: AutoSaveConfig,
    callbacks: SaveCallbacks,
}

impl<W: ContentWriter + 'static> AutoSaveBuilder<W> {
    /// Content already persisted remotely; equal content never triggers a write
    ///
    /// A pending offline edit for the document still takes precedence as the
    /// editor's starting content.
    pub fn initial_content(mut self, content: impl Into<String>) -> Self {
        self.initial_content = content.into();
        self
    }

    /// Offline store for fallback edits (default: in-memory)
    pub fn store(mut self, store: OfflineQueueStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Connectivity source (default: a monitor that starts online)
    pub fn monitor(mut self, monitor: ConnectionMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn config(mut self, config: AutoSaveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn callbacks(mut self, callbacks: SaveCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Start the controller
    ///
    /// Must be called from within a tokio runtime: the connectivity listener
    /// and all timers are spawned tasks.
    pub fn spawn(self) -> AutoSaveController<W> {
        let monitor = self.monitor.unwrap_or_default();
        let store = self.store.unwrap_or_else(OfflineQueueStore::in_memory);
        let (status, _) = watch::channel(SaveStatus::Idle);

        // Unsynced work from an earlier session is the editor's latest content
        let content = match store.get_edit(&self.document_id) {
            Some(edit) if edit.content != self.initial_content => {
                tracing::info!("Resuming unsynced edit {} for {}", edit.id, self.document_id);
                edit.content
            }
            _ => self.initial_content.clone(),
        };

        let shared = Arc::new(Shared {
            document_id: self.document_id,
            state: Mutex::new(EditorState {
                content,
                last_saved: self.initial_content,
                last_saved_at: None,
                enabled: self.config.enabled,
                timers: Timers::default(),
            }),
            config: self.config,
            writer: self.writer,
            store,
            monitor: monitor.clone(),
            callbacks: self.callbacks,
            status,
            in_flight: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });

        let mut rx = monitor.subscribe();
        let mut last_reconnect = rx.borrow_and_update().reconnects;
        let listener_shared = Arc::clone(&shared);
        let listener = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let status = rx.borrow_and_update().clone();
                listener_shared.handle_connectivity(&status, &mut last_reconnect);
            }
        });

        if shared.config.sync_on_start && monitor.is_online() {
            shared.queue_sync_if_pending("Starting online");
        }

        AutoSaveController { shared, listener }
    }
}

/// Debounced, offline-tolerant autosave for one document
///
/// Dropping the controller shuts it down.
pub struct AutoSaveController<W: ContentWriter + 'static> {
    shared: Arc<Shared<W>>,
    listener: JoinHandle<()>,
}

impl<W: ContentWriter + 'static> fmt::Debug for AutoSaveController<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoSaveController")
            .field("document_id", &self.shared.document_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<W: ContentWriter + 'static> AutoSaveController<W> {
    /// Start building a controller for `document_id`
    pub fn builder(document_id: impl Into<String>, writer: W) -> AutoSaveBuilder<W> {
        AutoSaveBuilder {
            document_id: document_id.into(),
            writer,
            initial_content: String::new(),
            store: None,
            monitor: None,
            config: AutoSaveConfig::default(),
            callbacks: SaveCallbacks::default(),
        }
    }

    /// Create and start a controller without callbacks
    pub fn new(
        document_id: impl Into<String>,
        initial_content: impl Into<String>,
        writer: W,
        store: OfflineQueueStore,
        monitor: ConnectionMonitor,
        config: AutoSaveConfig,
    ) -> Self {
        Self::builder(document_id, writer)
            .initial_content(initial_content)
            .store(store)
            .monitor(monitor)
            .config(config)
            .spawn()
    }

    /// Get the document ID
    pub fn document_id(&self) -> &str {
        &self.shared.document_id
    }

    /// Get the configuration
    pub fn config(&self) -> &AutoSaveConfig {
        &self.shared.config
    }

    /// Current save status
    pub fn status(&self) -> SaveStatus {
        *self.shared.status.borrow()
    }

    /// Receive every status transition
    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.shared.status.subscribe()
    }

    /// Latest content handed to the controller
    pub fn content(&self) -> String {
        self.shared.state().content.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state().enabled
    }

    /// Record a content change and restart the debounce window
    pub fn set_content(&self, content: impl Into<String>) {
        let content = content.into();
        {
            let mut state = self.shared.state();
            if state.content == content {
                return;
            }
            state.content = content;
            if !state.enabled || !self.shared.is_live() {
                return;
            }
            self.shared.arm_debounce(&mut state);
        }
        self.shared.set_status(SaveStatus::Pending);
    }

    /// Turn debounced saving on or off
    ///
    /// Disabling cancels a pending debounce; enabling with unsaved content
    /// arms one.
    pub fn set_enabled(&self, enabled: bool) {
        let pending = {
            let mut state = self.shared.state();
            if state.enabled == enabled {
                return;
            }
            state.enabled = enabled;

            if enabled && state.content != state.last_saved && self.shared.is_live() {
                self.shared.arm_debounce(&mut state);
                Some(SaveStatus::Pending)
            } else if !enabled {
                if let Some(handle) = state.timers.debounce.take() {
                    handle.abort();
                }
                (*self.shared.status.borrow() == SaveStatus::Pending).then_some(SaveStatus::Idle)
            } else {
                None
            }
        };

        if let Some(status) = pending {
            self.shared.set_status(status);
        }
    }

    /// Cancel the debounce timer and save immediately
    pub async fn force_save(&self) {
        if let Some(handle) = self.shared.state().timers.debounce.take() {
            handle.abort();
        }
        self.shared.save().await;
    }

    /// Sync the queued offline edit now, even if its retries are exhausted
    pub async fn sync_now(&self) {
        self.shared.cancel_sync();
        self.shared.sync_pending(true).await;
    }

    /// Status bundled with offline-queue details for display
    pub fn status_info(&self) -> SaveStatusInfo {
        let edit = self.shared.store.get_edit(&self.shared.document_id);
        let last_saved_at = self.shared.state().last_saved_at;
        SaveStatusInfo::new(
            self.status(),
            self.shared.monitor.is_online(),
            edit.map(|edit| edit.retry_count),
            last_saved_at,
        )
    }

    /// Cancel every timer and stop reacting to connectivity changes
    ///
    /// A write already in flight is left to finish; its result is kept in the
    /// offline store but no longer reported.
    pub fn shutdown(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listener.abort();
        self.shared.state().timers.abort_all();
        tracing::debug!(document_id = %self.shared.document_id, "Autosave controller shut down");
    }
}

impl<W: ContentWriter + 'static> Drop for AutoSaveController<W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
