//! Host application collaborator interfaces
//!
//! The host owns documents, their element tables and the transaction
//! implementation. The bridge only ever talks to it through these traits,
//! always on the host's event thread.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{DocumentId, ElementRef, TransactionId, ViewInfo};

/// Severity of a failure raised by the host inside a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSeverity {
    /// Non-fatal; can be dismissed so the transaction proceeds
    Warning,
    /// Fatal to the transaction
    Error,
}

/// A failure the host attached to an open transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFailure {
    pub severity: FailureSeverity,
    pub message: String,
}

impl HostFailure {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: FailureSeverity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: FailureSeverity::Error,
            message: message.into(),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity == FailureSeverity::Warning
    }
}

/// An open host document with a transactional element table
pub trait HostDocument: Send + Sync {
    /// Identity of this document
    fn id(&self) -> DocumentId;

    /// Resolve an element reference to a live element
    fn try_resolve(&self, element: ElementRef) -> Option<ElementRef>;

    /// Start a named transaction
    fn begin_transaction(&self, name: &str) -> Result<TransactionId>;

    /// Request deletion of elements inside an open transaction
    fn delete_elements(&self, tx: TransactionId, elements: &[ElementRef]) -> Result<()>;

    /// Failures the host has raised against the transaction so far
    fn pending_failures(&self, tx: TransactionId) -> Vec<HostFailure>;

    /// Dismiss a warning so the transaction can proceed
    fn dismiss_failure(&self, tx: TransactionId, failure: &HostFailure);

    /// Commit the transaction; all-or-nothing
    fn commit(&self, tx: TransactionId) -> Result<()>;

    /// Discard the transaction
    fn rollback(&self, tx: TransactionId);
}

/// The host application: active document/view, idle signal, lifetime
pub trait HostApplication: Send + Sync {
    /// The document the host currently has active, if any
    fn active_document(&self) -> Option<Arc<dyn HostDocument>>;

    /// The view the host currently has active, if any
    fn active_view(&self) -> Option<ViewInfo>;

    /// Whether graph automation is permitted in perspective 3D views
    fn allows_perspective_automation(&self) -> bool;

    /// Start receiving `HostEvent::Idling`
    fn subscribe_idle(&self);

    /// Stop receiving `HostEvent::Idling`
    fn unsubscribe_idle(&self);

    /// Open a document file; only legal at idle time
    fn open_document(&self, path: &str) -> Result<()>;

    /// Ask the host to close itself; `Err` when a command is in progress
    fn request_close(&self) -> Result<()>;

    /// Show a blocking notice to the end user
    fn show_notice(&self, message: &str);
}

/// Events emitted by the host application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum HostEvent {
    DocumentOpened,
    DocumentClosing(DocumentId),
    DocumentClosed,
    ViewActivating(ViewInfo),
    ViewActivated(ViewInfo),
    /// Fires repeatedly while the host is idle and subscribed
    Idling,
}

/// Hook for re-initializing display materials after a document is bound
pub trait MaterialsHook: Send + Sync {
    fn reinitialize(&self, document: &DocumentId);
}

/// Materials hook that does nothing
pub struct NoMaterials;

impl MaterialsHook for NoMaterials {
    fn reinitialize(&self, _document: &DocumentId) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ViewKind;

    #[test]
    fn test_failure_constructors() {
        assert!(HostFailure::warning("overlapping walls").is_warning());
        assert!(!HostFailure::error("element locked").is_warning());
    }

    #[test]
    fn test_host_event_serde() {
        let event = HostEvent::ViewActivating(ViewInfo::new(
            "Level 1",
            DocumentId::new("doc1"),
            ViewKind::Plan,
        ));
        let json = serde_json::to_string(&event).unwrap();
        let back: HostEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);

        let closed: HostEvent =
            serde_json::from_value(serde_json::json!({"type": "documentClosed"})).unwrap();
        assert_eq!(closed, HostEvent::DocumentClosed);
    }
}
