//! Identity ledger of elements produced in a persisted session
//!
//! When a workspace is loaded together with trace data from its previous
//! session, the ledger remembers which elements each node produced back
//! then. The first reconciliation after the load consumes the entry; the
//! ledger never learns about a workspace again after that.

use std::collections::HashMap;

use crate::runtime::TraceDecoder;
use crate::types::{ElementMap, TraceData, WorkspaceId};

/// Workspace -> (node -> elements) as of workspace load
#[derive(Debug, Default)]
pub struct IdentityLedger {
    entries: HashMap<WorkspaceId, ElementMap>,
}

impl IdentityLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the elements found in a workspace's preloaded trace data
    ///
    /// Does nothing if the workspace already has an entry, so duplicate
    /// load signals keep the first payload. Returns whether an entry was
    /// recorded. Payloads that fail to decode are skipped.
    pub fn record_if_absent(
        &mut self,
        workspace: WorkspaceId,
        trace_data: &TraceData,
        decoder: &dyn TraceDecoder,
    ) -> bool {
        if self.entries.contains_key(&workspace) {
            log::debug!("Ledger already holds workspace {}, ignoring trace data", workspace);
            return false;
        }

        let mut entry = ElementMap::new();
        for (node, payloads) in trace_data {
            let refs = entry.entry(*node).or_default();
            for payload in payloads {
                match decoder.extract_element_refs(payload) {
                    Ok(found) => refs.extend(found),
                    Err(e) => {
                        log::warn!("Skipping unreadable trace payload for node {}: {}", node, e);
                    }
                }
            }
        }

        log::debug!("Recorded {} nodes for workspace {}", entry.len(), workspace);
        self.entries.insert(workspace, entry);
        true
    }

    /// Whether an entry is waiting to be reconciled
    pub fn contains(&self, workspace: &WorkspaceId) -> bool {
        self.entries.contains_key(workspace)
    }

    /// Remove and return the entry for a workspace
    pub fn consume(&mut self, workspace: &WorkspaceId) -> Option<ElementMap> {
        self.entries.remove(workspace)
    }

    /// Number of workspaces awaiting reconciliation
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
