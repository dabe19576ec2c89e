//! Connectivity tracking.
//!
//! `ConnectionMonitor` mirrors the runtime's online/offline signal and
//! publishes every transition on a watch channel. It never fails: it only
//! reflects the signals it is given.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Latest known connectivity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Current connectivity
    pub is_online: bool,
    /// When the connection was last lost
    pub last_online: Option<DateTime<Utc>>,
    /// When the connection last came back; cleared when it drops again
    pub reconnected_at: Option<DateTime<Utc>>,
    /// Number of offline-to-online transitions so far
    ///
    /// Consumers compare this against the last value they acted on, so one
    /// reconnection triggers at most one reaction.
    pub reconnects: u64,
}

impl ConnectionStatus {
    fn initial(is_online: bool) -> Self {
        Self {
            is_online,
            last_online: None,
            reconnected_at: None,
            reconnects: 0,
        }
    }

    /// Get a short status string
    pub fn short_status(&self) -> &'static str {
        if self.is_online {
            "Online"
        } else {
            "Offline"
        }
    }
}

/// Connectivity monitor
///
/// Cloning yields another handle to the same monitor.
#[derive(Clone, Debug)]
pub struct ConnectionMonitor {
    tx: Arc<watch::Sender<ConnectionStatus>>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ConnectionMonitor {
    /// Create a monitor from the runtime's connectivity flag
    ///
    /// `None` (no flag available) starts online.
    pub fn new(runtime_flag: Option<bool>) -> Self {
        let (tx, _) = watch::channel(ConnectionStatus::initial(runtime_flag.unwrap_or(true)));
        Self { tx: Arc::new(tx) }
    }

    /// Get the latest known status
    pub fn current(&self) -> ConnectionStatus {
        self.tx.borrow().clone()
    }

    /// Check if currently online
    pub fn is_online(&self) -> bool {
        self.tx.borrow().is_online
    }

    /// Receive every future transition
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Handle the runtime's "became online" signal
    pub fn set_online(&self) {
        let changed = self.tx.send_if_modified(|status| {
            if status.is_online {
                return false;
            }
            status.is_online = true;
            status.reconnected_at = Some(Utc::now());
            status.reconnects += 1;
            true
        });

        if changed {
            tracing::info!("Connection restored");
        }
    }

    /// Handle the runtime's "became offline" signal
    pub fn set_offline(&self) {
        let changed = self.tx.send_if_modified(|status| {
            if !status.is_online {
                return false;
            }
            status.is_online = false;
            status.last_online = Some(Utc::now());
            status.reconnected_at = None;
            true
        });

        if changed {
            tracing::info!("Connection lost");
        }
    }

    /// Apply a raw connectivity flag
    pub fn set_connectivity(&self, online: bool) {
        if online {
            self.set_online();
        } else {
            self.set_offline();
        }
    }
}
