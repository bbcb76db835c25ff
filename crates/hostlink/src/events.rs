//! Notifications raised towards the graph runtime and UI
//!
//! These are the user-facing outcomes of lifecycle transitions and
//! reconciliation passes. Delivery is fire-and-forget: a sink that fails to
//! accept a notification is logged and otherwise ignored.

use serde::{Deserialize, Serialize};

use crate::types::{DocumentId, WorkspaceId};

/// Trait for delivering bridge notifications
///
/// This abstracts over the transport (UI dispatcher, channel, test buffer).
pub trait NotificationSink: Send + Sync {
    /// Send a notification
    ///
    /// Returns an error if the notification could not be delivered
    fn send(&self, notification: BridgeNotification) -> Result<(), NotifyError>;
}

/// Error when delivering a notification fails
#[derive(Debug, Clone)]
pub struct NotifyError {
    pub message: String,
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Notification error: {}", self.message)
    }
}

impl std::error::Error for NotifyError {}

impl NotifyError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Notifications emitted by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BridgeNotification {
    /// The bound document was replaced by another open document
    #[serde(rename_all = "camelCase")]
    DocumentChanged { document: DocumentId },

    /// The last open document closed
    DocumentLost,

    /// The activated view cannot host graph automation
    #[serde(rename_all = "camelCase")]
    ContextUnavailable { view: String },

    /// A view of a document other than the bound one was activated
    #[serde(rename_all = "camelCase")]
    InvalidDocumentActivated {
        view: String,
        document: DocumentId,
    },

    /// Orphaned elements were removed from the document
    #[serde(rename_all = "camelCase")]
    OrphansDeleted {
        workspace: Option<WorkspaceId>,
        count: usize,
    },

    /// A deletion batch was rejected by the host and dropped
    #[serde(rename_all = "camelCase")]
    DeletionAbandoned {
        workspace: Option<WorkspaceId>,
        reason: String,
    },

    /// Reconciliation could not read the current run and was dropped
    #[serde(rename_all = "camelCase")]
    ReconciliationAborted {
        workspace: WorkspaceId,
        reason: String,
    },

    /// The host refused to close
    #[serde(rename_all = "camelCase")]
    ShutdownRefused { reason: String },
}

/// Deliver a notification, logging delivery failures
pub fn notify(sink: &dyn NotificationSink, notification: BridgeNotification) {
    if let Err(e) = sink.send(notification) {
        log::warn!("Dropped notification: {}", e);
    }
}

/// A no-op sink that discards all notifications
pub struct NullSink;

impl NotificationSink for NullSink {
    fn send(&self, _notification: BridgeNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// A vector-based sink that collects notifications
///
/// Useful for testing and for the scenario simulator.
pub struct VecSink {
    notifications: parking_lot::Mutex<Vec<BridgeNotification>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self {
            notifications: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected notifications
    pub fn notifications(&self) -> Vec<BridgeNotification> {
        self.notifications.lock().clone()
    }

    /// Count collected notifications matching a predicate
    pub fn count(&self, predicate: impl Fn(&BridgeNotification) -> bool) -> usize {
        self.notifications.lock().iter().filter(|n| predicate(n)).count()
    }

    /// Clear all collected notifications
    pub fn clear(&self) {
        self.notifications.lock().clear();
    }
}

impl Default for VecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for VecSink {
    fn send(&self, notification: BridgeNotification) -> Result<(), NotifyError> {
        self.notifications.lock().push(notification);
        Ok(())
    }
}
