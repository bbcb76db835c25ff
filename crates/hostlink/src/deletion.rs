//! Transactional removal of orphaned elements
//!
//! A batch of orphans is deleted inside one host transaction. Elements that
//! no longer resolve are skipped. If the host rejects the transaction, the
//! batch is dropped as a unit and never retried.
//!
//! In interactive sessions the host forbids document mutation outside of
//! user commands and idle time, so batches wait on the [`IdleQueue`].
//! Automated runs delete immediately.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{HostLinkError, Result};
use crate::events::{notify, BridgeNotification, NotificationSink};
use crate::host::{HostApplication, HostDocument};
use crate::idle::IdleQueue;
use crate::lifecycle::DocumentPointer;
use crate::transaction::run_in_transaction;
use crate::types::{ElementRef, ExecutionMode, WorkspaceId};

/// What happened to a deletion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// Deleted this many live elements
    Deleted(usize),
    /// Queued for the next host idle signal
    Deferred(usize),
}

/// Deletes orphan batches against the bound document
pub struct DeletionExecutor {
    mode: ExecutionMode,
    document: DocumentPointer,
    idle: Arc<IdleQueue>,
    notifications: Arc<dyn NotificationSink>,
    transaction_name: String,
}

impl DeletionExecutor {
    pub fn new(
        mode: ExecutionMode,
        document: DocumentPointer,
        idle: Arc<IdleQueue>,
        notifications: Arc<dyn NotificationSink>,
        transaction_name: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            document,
            idle,
            notifications,
            transaction_name: transaction_name.into(),
        }
    }

    /// Delete a batch of orphans, now or at the next idle signal
    ///
    /// In automated mode a rejected transaction is returned as
    /// `TransactionRejected`; in interactive mode failures of the deferred
    /// batch are logged when it runs. A deferred batch only runs against the
    /// document that was bound when it was queued.
    pub fn delete_orphans(
        &self,
        workspace: Option<WorkspaceId>,
        orphans: Vec<ElementRef>,
    ) -> Result<DeletionOutcome> {
        match self.mode {
            ExecutionMode::Automated => {
                let doc = self.document.get();
                delete_batch(
                    doc.as_deref(),
                    &self.transaction_name,
                    workspace,
                    &orphans,
                    self.notifications.as_ref(),
                )
                .map(DeletionOutcome::Deleted)
            }
            ExecutionMode::Interactive => {
                let count = orphans.len();
                let queued_for = self.document.id();
                let document = self.document.clone();
                let notifications = self.notifications.clone();
                let name = self.transaction_name.clone();
                self.idle.enqueue(move || {
                    let doc = document.get();
                    let bound = doc.as_ref().map(|doc| doc.id());
                    if bound != queued_for {
                        log::warn!(
                            "Bound document changed from {:?} to {:?}, dropping {} queued orphans",
                            queued_for,
                            bound,
                            orphans.len()
                        );
                        notify(
                            notifications.as_ref(),
                            BridgeNotification::DeletionAbandoned {
                                workspace,
                                reason: "bound document changed before idle".to_string(),
                            },
                        );
                        return;
                    }
                    if let Err(e) = delete_batch(
                        doc.as_deref(),
                        &name,
                        workspace,
                        &orphans,
                        notifications.as_ref(),
                    ) {
                        log::error!("Deferred orphan deletion failed: {}", e);
                    }
                });
                log::debug!("Deferred deletion of {} orphans to host idle", count);
                Ok(DeletionOutcome::Deferred(count))
            }
        }
    }

    /// Open a document file at the next idle signal
    pub fn open_document_deferred(&self, host: Arc<dyn HostApplication>, path: impl Into<String>) {
        let path = path.into();
        self.idle.enqueue(move || {
            if let Err(e) = host.open_document(&path) {
                log::warn!("Failed to open '{}': {}", path, e);
            }
        });
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

/// Resolve and delete one batch inside a single transaction
///
/// Returns the number of elements deleted. Stale references are skipped;
/// with no live references no transaction is opened. Without a bound
/// document the batch is abandoned with `NoDocument`.
pub fn delete_batch(
    doc: Option<&dyn HostDocument>,
    transaction_name: &str,
    workspace: Option<WorkspaceId>,
    orphans: &[ElementRef],
    notifications: &dyn NotificationSink,
) -> Result<usize> {
    let Some(doc) = doc else {
        log::warn!("No bound document, dropping {} orphans", orphans.len());
        let err = HostLinkError::NoDocument;
        notify(
            notifications,
            BridgeNotification::DeletionAbandoned {
                workspace,
                reason: err.to_string(),
            },
        );
        return Err(err);
    };

    let mut seen = HashSet::with_capacity(orphans.len());
    let live: Vec<ElementRef> = orphans
        .iter()
        .filter_map(|e| doc.try_resolve(*e))
        .filter(|element| seen.insert(*element))
        .collect();
    if live.is_empty() {
        log::debug!("No live orphans among {} references", orphans.len());
        return Ok(0);
    }

    let result = run_in_transaction(doc, transaction_name, |doc, tx| {
        doc.delete_elements(tx, &live)
    });

    match result {
        Ok(()) => {
            log::info!("Deleted {} orphaned elements from {}", live.len(), doc.id());
            notify(
                notifications,
                BridgeNotification::OrphansDeleted {
                    workspace,
                    count: live.len(),
                },
            );
            Ok(live.len())
        }
        Err(e) => {
            if e.is_rejection() {
                log::warn!("Abandoned deletion of {} orphans: {}", live.len(), e);
                notify(
                    notifications,
                    BridgeNotification::DeletionAbandoned {
                        workspace,
                        reason: e.to_string(),
                    },
                );
            }
            Err(e)
        }
    }
}
