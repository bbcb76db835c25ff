//! Orphan reconciliation after graph evaluation
//!
//! After a workspace loaded with persisted trace data finishes its first
//! evaluation, elements the previous session created but the current run
//! did not recreate are orphans. They are handed to the deletion executor
//! once, and the ledger entry is gone for good afterwards.
//!
//! # Key Concepts
//!
//! - **One-shot**: the ledger entry is consumed before anything else, so
//!   repeated evaluation signals cannot reconcile twice
//! - **Set membership**: a historical element survives iff the same node
//!   reports it again in the current run; order and counts do not matter
//! - **Abort and discard**: if the current run cannot be read, nothing is
//!   deleted and the consumed entry is not restored

use std::collections::HashSet;
use std::sync::Arc;

use crate::deletion::{DeletionExecutor, DeletionOutcome};
use crate::error::{HostLinkError, Result};
use crate::events::{notify, BridgeNotification, NotificationSink};
use crate::ledger::IdentityLedger;
use crate::trace::TraceSnapshotReader;
use crate::types::{ElementMap, ElementRef, WorkspaceId};

/// Result of one reconciliation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No ledger entry; nothing to do
    Skipped,
    /// Current run could not be read; the entry was discarded
    Aborted { reason: String },
    /// Every historical element is still produced
    Clean,
    /// Orphans were deleted
    Deleted(usize),
    /// Orphans are queued for host idle time
    Deferred(usize),
    /// The deletion batch was dropped: the host rejected it or no
    /// document was bound
    Abandoned { reason: String },
}

/// Elements in `historical` that `current` no longer produces
///
/// Nodes missing from `current` orphan all of their elements. The result is
/// free of duplicates and keeps first-seen order.
pub fn compute_orphans(historical: &ElementMap, current: &ElementMap) -> Vec<ElementRef> {
    let mut seen = HashSet::new();
    let mut orphans = Vec::new();

    for (node, refs) in historical {
        let survivors: HashSet<ElementRef> = current
            .get(node)
            .map(|now| now.iter().copied().collect())
            .unwrap_or_default();

        for element in refs {
            if !survivors.contains(element) && seen.insert(*element) {
                orphans.push(*element);
            }
        }
    }
    orphans
}

/// Diffs the identity ledger against the current run
pub struct Reconciler {
    reader: TraceSnapshotReader,
    deletion: DeletionExecutor,
    notifications: Arc<dyn NotificationSink>,
}

impl Reconciler {
    pub fn new(
        reader: TraceSnapshotReader,
        deletion: DeletionExecutor,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            reader,
            deletion,
            notifications,
        }
    }

    /// Reconcile a workspace whose evaluation just completed
    ///
    /// Host rejections of the deletion batch and a missing bound document
    /// are handled here; only unexpected host failures are returned as
    /// errors.
    pub fn reconcile(
        &self,
        ledger: &mut IdentityLedger,
        workspace: WorkspaceId,
    ) -> Result<ReconcileOutcome> {
        if !ledger.contains(&workspace) {
            return Ok(ReconcileOutcome::Skipped);
        }
        let Some(historical) = ledger.consume(&workspace) else {
            return Ok(ReconcileOutcome::Skipped);
        };

        let current = match self.reader.snapshot(workspace) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!(
                    "Reconciliation of workspace {} aborted, previous elements will not be cleaned up: {}",
                    workspace,
                    e
                );
                notify(
                    self.notifications.as_ref(),
                    BridgeNotification::ReconciliationAborted {
                        workspace,
                        reason: e.to_string(),
                    },
                );
                return Ok(ReconcileOutcome::Aborted {
                    reason: e.to_string(),
                });
            }
        };

        let orphans = compute_orphans(&historical, &current);
        if orphans.is_empty() {
            log::debug!("Workspace {} has no orphaned elements", workspace);
            return Ok(ReconcileOutcome::Clean);
        }

        log::info!(
            "Workspace {} left {} orphaned elements",
            workspace,
            orphans.len()
        );
        match self.deletion.delete_orphans(Some(workspace), orphans) {
            Ok(DeletionOutcome::Deleted(count)) => Ok(ReconcileOutcome::Deleted(count)),
            Ok(DeletionOutcome::Deferred(count)) => Ok(ReconcileOutcome::Deferred(count)),
            Err(e) if e.is_rejection() || matches!(e, HostLinkError::NoDocument) => {
                Ok(ReconcileOutcome::Abandoned {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn deletion(&self) -> &DeletionExecutor {
        &self.deletion
    }

    pub fn reader(&self) -> &TraceSnapshotReader {
        &self.reader
    }
}
