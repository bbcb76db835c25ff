//! In-memory collaborators
//!
//! Fully working stand-ins for the host application, its documents, the
//! graph runtime and the trace store. Documents have real transaction
//! semantics: deletions are staged and only applied by a successful commit.
//!
//! Useful for tests and for replaying scenarios without a host.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{HostLinkError, Result};
use crate::host::{HostApplication, HostDocument, HostFailure, MaterialsHook};
use crate::runtime::{GraphRuntime, TraceProvider, WorkspaceInfo};
use crate::types::{
    DocumentId, ElementRef, NodeId, TraceData, TracePayload, TransactionId, ViewInfo, ViewKind,
    WorkspaceId,
};

// =========================================================================
// Document
// =========================================================================

struct OpenTransaction {
    id: TransactionId,
    name: String,
    staged: BTreeSet<ElementRef>,
    failures: Vec<HostFailure>,
}

#[derive(Default)]
struct DocumentTables {
    elements: BTreeSet<ElementRef>,
    locked: BTreeSet<ElementRef>,
    next_tx: u64,
    open: Option<OpenTransaction>,
    injected: Vec<HostFailure>,
    commit_rejection: Option<String>,
    committed: Vec<String>,
    dismissed: Vec<String>,
}

/// A host document backed by an element set
pub struct MemoryDocument {
    id: DocumentId,
    tables: Mutex<DocumentTables>,
}

impl MemoryDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(id),
            tables: Mutex::new(DocumentTables::default()),
        }
    }

    pub fn with_elements(id: impl Into<String>, elements: impl IntoIterator<Item = i64>) -> Self {
        let doc = Self::new(id);
        doc.tables
            .lock()
            .elements
            .extend(elements.into_iter().map(ElementRef));
        doc
    }

    /// Add a live element
    pub fn insert(&self, element: ElementRef) {
        self.tables.lock().elements.insert(element);
    }

    pub fn contains(&self, element: ElementRef) -> bool {
        self.tables.lock().elements.contains(&element)
    }

    pub fn element_count(&self) -> usize {
        self.tables.lock().elements.len()
    }

    pub fn elements(&self) -> Vec<ElementRef> {
        self.tables.lock().elements.iter().copied().collect()
    }

    /// Deleting a locked element raises a host error in the transaction
    pub fn lock_element(&self, element: ElementRef) {
        self.tables.lock().locked.insert(element);
    }

    /// Raise this failure in the next transaction
    pub fn inject_failure(&self, failure: HostFailure) {
        self.tables.lock().injected.push(failure);
    }

    /// Make every commit fail with the given reason
    pub fn reject_commits(&self, reason: impl Into<String>) {
        self.tables.lock().commit_rejection = Some(reason.into());
    }

    /// Names of committed transactions, oldest first
    pub fn committed_transactions(&self) -> Vec<String> {
        self.tables.lock().committed.clone()
    }

    /// Messages of dismissed warnings, oldest first
    pub fn dismissed_warnings(&self) -> Vec<String> {
        self.tables.lock().dismissed.clone()
    }

    pub fn has_open_transaction(&self) -> bool {
        self.tables.lock().open.is_some()
    }
}

fn open_tx(tables: &mut DocumentTables, tx: TransactionId) -> Result<&mut OpenTransaction> {
    match tables.open.as_mut() {
        Some(open) if open.id == tx => Ok(open),
        _ => Err(HostLinkError::host(format!("transaction {} is not open", tx.0))),
    }
}

impl HostDocument for MemoryDocument {
    fn id(&self) -> DocumentId {
        self.id.clone()
    }

    fn try_resolve(&self, element: ElementRef) -> Option<ElementRef> {
        self.contains(element).then_some(element)
    }

    fn begin_transaction(&self, name: &str) -> Result<TransactionId> {
        let mut tables = self.tables.lock();
        if tables.open.is_some() {
            return Err(HostLinkError::host("a transaction is already open"));
        }
        tables.next_tx += 1;
        let id = TransactionId(tables.next_tx);
        let failures = std::mem::take(&mut tables.injected);
        tables.open = Some(OpenTransaction {
            id,
            name: name.to_string(),
            staged: BTreeSet::new(),
            failures,
        });
        Ok(id)
    }

    fn delete_elements(&self, tx: TransactionId, elements: &[ElementRef]) -> Result<()> {
        let mut tables = self.tables.lock();
        let locked = tables.locked.clone();
        let open = open_tx(&mut tables, tx)?;
        for element in elements {
            if locked.contains(element) {
                open
                    .failures
                    .push(HostFailure::error(format!("element {} is locked", element)));
            } else {
                open.staged.insert(*element);
            }
        }
        Ok(())
    }

    fn pending_failures(&self, tx: TransactionId) -> Vec<HostFailure> {
        let mut tables = self.tables.lock();
        open_tx(&mut tables, tx)
            .map(|open| open.failures.clone())
            .unwrap_or_default()
    }

    fn dismiss_failure(&self, tx: TransactionId, failure: &HostFailure) {
        if !failure.is_warning() {
            return;
        }
        let mut tables = self.tables.lock();
        let Ok(open) = open_tx(&mut tables, tx) else {
            return;
        };
        let Some(pos) = open.failures.iter().position(|f| f == failure) else {
            return;
        };
        open.failures.remove(pos);
        tables.dismissed.push(failure.message.clone());
    }

    fn commit(&self, tx: TransactionId) -> Result<()> {
        let mut tables = self.tables.lock();
        let open = open_tx(&mut tables, tx)?;
        if let Some(error) = open.failures.iter().find(|f| !f.is_warning()) {
            return Err(HostLinkError::rejected(error.message.clone()));
        }
        if let Some(reason) = tables.commit_rejection.clone() {
            return Err(HostLinkError::rejected(reason));
        }
        let Some(open) = tables.open.take() else {
            return Err(HostLinkError::host("transaction vanished"));
        };
        for element in &open.staged {
            tables.elements.remove(element);
        }
        tables.committed.push(open.name);
        Ok(())
    }

    fn rollback(&self, tx: TransactionId) {
        let mut tables = self.tables.lock();
        if tables.open.as_ref().is_some_and(|open| open.id == tx) {
            tables.open = None;
        }
    }
}

// =========================================================================
// Host application
// =========================================================================

#[derive(Default)]
struct HostState {
    documents: Vec<Arc<MemoryDocument>>,
    active: Option<DocumentId>,
    active_view: Option<ViewInfo>,
    perspective_automation: bool,
    idle_subscribed: bool,
    idle_subscribe_calls: usize,
    close_refusal: Option<String>,
    close_requested: bool,
    notices: Vec<String>,
    opened_paths: Vec<String>,
}

/// A host application holding any number of open documents
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open document (does not activate it)
    pub fn add_document(&self, document: Arc<MemoryDocument>) {
        self.state.lock().documents.push(document);
    }

    /// Look up an open document
    pub fn document(&self, id: &str) -> Option<Arc<MemoryDocument>> {
        self.state
            .lock()
            .documents
            .iter()
            .find(|doc| doc.id.as_str() == id)
            .cloned()
    }

    /// Make a document and view active
    pub fn activate(&self, document: &str, view: ViewInfo) {
        let mut state = self.state.lock();
        state.active = Some(DocumentId::new(document));
        state.active_view = Some(view);
    }

    /// Close a document; clears the active document if it was active
    pub fn close_document(&self, id: &str) {
        let mut state = self.state.lock();
        state.documents.retain(|doc| doc.id.as_str() != id);
        if state.active.as_ref().is_some_and(|active| active.as_str() == id) {
            state.active = None;
            state.active_view = None;
        }
    }

    pub fn set_perspective_automation(&self, allowed: bool) {
        self.state.lock().perspective_automation = allowed;
    }

    /// Make `request_close` fail, as when a command is running
    pub fn refuse_close(&self, reason: impl Into<String>) {
        self.state.lock().close_refusal = Some(reason.into());
    }

    pub fn idle_subscribed(&self) -> bool {
        self.state.lock().idle_subscribed
    }

    pub fn idle_subscribe_calls(&self) -> usize {
        self.state.lock().idle_subscribe_calls
    }

    pub fn close_requested(&self) -> bool {
        self.state.lock().close_requested
    }

    pub fn notices(&self) -> Vec<String> {
        self.state.lock().notices.clone()
    }

    pub fn opened_paths(&self) -> Vec<String> {
        self.state.lock().opened_paths.clone()
    }
}

impl HostApplication for MemoryHost {
    fn active_document(&self) -> Option<Arc<dyn HostDocument>> {
        let state = self.state.lock();
        let active = state.active.as_ref()?;
        state
            .documents
            .iter()
            .find(|doc| &doc.id == active)
            .map(|doc| doc.clone() as Arc<dyn HostDocument>)
    }

    fn active_view(&self) -> Option<ViewInfo> {
        self.state.lock().active_view.clone()
    }

    fn allows_perspective_automation(&self) -> bool {
        self.state.lock().perspective_automation
    }

    fn subscribe_idle(&self) {
        let mut state = self.state.lock();
        state.idle_subscribed = true;
        state.idle_subscribe_calls += 1;
    }

    fn unsubscribe_idle(&self) {
        self.state.lock().idle_subscribed = false;
    }

    fn open_document(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock();
        if !state.documents.iter().any(|doc| doc.id.as_str() == path) {
            state.documents.push(Arc::new(MemoryDocument::new(path)));
        }
        state.active = Some(DocumentId::new(path));
        state.active_view = Some(ViewInfo::new(
            format!("{path}/Level 1"),
            DocumentId::new(path),
            ViewKind::Plan,
        ));
        state.opened_paths.push(path.to_string());
        Ok(())
    }

    fn request_close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(reason) = state.close_refusal.clone() {
            return Err(HostLinkError::host(reason));
        }
        state.close_requested = true;
        Ok(())
    }

    fn show_notice(&self, message: &str) {
        self.state.lock().notices.push(message.to_string());
    }
}

// =========================================================================
// Graph runtime
// =========================================================================

#[derive(Default)]
struct RuntimeState {
    workspaces: Vec<WorkspaceInfo>,
    run_enabled: HashMap<WorkspaceId, bool>,
    dirty_marks: HashMap<WorkspaceId, usize>,
    run_requests: HashMap<WorkspaceId, usize>,
}

/// A graph runtime that only tracks run control
#[derive(Default)]
pub struct MemoryRuntime {
    state: Mutex<RuntimeState>,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a workspace with a fresh id
    pub fn add_workspace(&self, is_home: bool) -> WorkspaceId {
        let id = WorkspaceId::new();
        self.insert_workspace(id, is_home);
        id
    }

    /// Add a workspace with a known id
    pub fn insert_workspace(&self, id: WorkspaceId, is_home: bool) {
        self.state.lock().workspaces.push(WorkspaceInfo { id, is_home });
    }

    /// How many times every node of the workspace was marked dirty
    pub fn dirty_marks(&self, workspace: WorkspaceId) -> usize {
        self.state.lock().dirty_marks.get(&workspace).copied().unwrap_or(0)
    }

    pub fn run_requests(&self, workspace: WorkspaceId) -> usize {
        self.state.lock().run_requests.get(&workspace).copied().unwrap_or(0)
    }
}

impl GraphRuntime for MemoryRuntime {
    fn workspaces(&self) -> Vec<WorkspaceInfo> {
        self.state.lock().workspaces.clone()
    }

    fn set_run_enabled(&self, workspace: WorkspaceId, enabled: bool) {
        self.state.lock().run_enabled.insert(workspace, enabled);
    }

    fn run_enabled(&self, workspace: WorkspaceId) -> bool {
        self.state
            .lock()
            .run_enabled
            .get(&workspace)
            .copied()
            .unwrap_or(false)
    }

    fn mark_all_nodes_dirty(&self, workspace: WorkspaceId) {
        *self.state.lock().dirty_marks.entry(workspace).or_default() += 1;
    }

    fn request_run(&self, workspace: WorkspaceId) {
        *self.state.lock().run_requests.entry(workspace).or_default() += 1;
    }
}

// =========================================================================
// Trace store
// =========================================================================

#[derive(Default)]
struct TraceState {
    nodes: HashMap<WorkspaceId, Vec<NodeId>>,
    traces: HashMap<WorkspaceId, TraceData>,
    failure: Option<String>,
}

/// A run-trace store keyed by workspace
#[derive(Default)]
pub struct MemoryTraceProvider {
    state: Mutex<TraceState>,
}

impl MemoryTraceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nodes present in a workspace
    pub fn set_nodes(&self, workspace: WorkspaceId, nodes: Vec<NodeId>) {
        self.state.lock().nodes.insert(workspace, nodes);
    }

    /// Set one node's trace payloads for the current run
    pub fn set_trace(&self, workspace: WorkspaceId, node: NodeId, payloads: Vec<TracePayload>) {
        self.state
            .lock()
            .traces
            .entry(workspace)
            .or_default()
            .insert(node, payloads);
    }

    /// Replace a workspace's whole current run
    pub fn set_run(&self, workspace: WorkspaceId, trace: TraceData) {
        self.state.lock().traces.insert(workspace, trace);
    }

    /// Make every query fail until cleared
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.state.lock().failure = Some(reason.into());
    }

    pub fn clear_failure(&self) {
        self.state.lock().failure = None;
    }
}

impl TraceProvider for MemoryTraceProvider {
    fn node_ids(&self, workspace: WorkspaceId) -> Result<Vec<NodeId>> {
        let state = self.state.lock();
        if let Some(reason) = &state.failure {
            return Err(HostLinkError::TraceUnavailable(reason.clone()));
        }
        Ok(state.nodes.get(&workspace).cloned().unwrap_or_default())
    }

    fn trace_data_for_nodes(&self, workspace: WorkspaceId, nodes: &[NodeId]) -> Result<TraceData> {
        let state = self.state.lock();
        if let Some(reason) = &state.failure {
            return Err(HostLinkError::TraceUnavailable(reason.clone()));
        }
        let Some(trace) = state.traces.get(&workspace) else {
            return Ok(TraceData::new());
        };
        Ok(nodes
            .iter()
            .filter_map(|node| trace.get(node).map(|payloads| (*node, payloads.clone())))
            .collect())
    }
}

// =========================================================================
// Materials
// =========================================================================

/// Materials hook that records which documents it was asked to prepare
#[derive(Default)]
pub struct MemoryMaterials {
    reinitialized: Mutex<Vec<DocumentId>>,
}

impl MemoryMaterials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reinitialized(&self) -> Vec<DocumentId> {
        self.reinitialized.lock().clone()
    }
}

impl MaterialsHook for MemoryMaterials {
    fn reinitialize(&self, document: &DocumentId) {
        self.reinitialized.lock().push(document.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_deletes_apply_on_commit() {
        let doc = MemoryDocument::with_elements("doc1", [1, 2]);
        let tx = doc.begin_transaction("t").unwrap();
        doc.delete_elements(tx, &[ElementRef(1)]).unwrap();
        assert!(doc.contains(ElementRef(1)));

        doc.commit(tx).unwrap();
        assert!(!doc.contains(ElementRef(1)));
        assert!(doc.contains(ElementRef(2)));
    }

    #[test]
    fn test_rollback_discards_staged() {
        let doc = MemoryDocument::with_elements("doc1", [1]);
        let tx = doc.begin_transaction("t").unwrap();
        doc.delete_elements(tx, &[ElementRef(1)]).unwrap();
        doc.rollback(tx);

        assert!(doc.contains(ElementRef(1)));
        assert!(doc.begin_transaction("again").is_ok());
    }

    #[test]
    fn test_single_open_transaction() {
        let doc = MemoryDocument::new("doc1");
        let _tx = doc.begin_transaction("first").unwrap();
        assert!(doc.begin_transaction("second").is_err());
    }

    #[test]
    fn test_host_active_document() {
        let host = MemoryHost::new();
        assert!(host.active_document().is_none());

        host.add_document(Arc::new(MemoryDocument::new("doc1")));
        host.activate(
            "doc1",
            ViewInfo::new("v", DocumentId::new("doc1"), ViewKind::Plan),
        );
        assert_eq!(host.active_document().unwrap().id(), DocumentId::new("doc1"));

        host.close_document("doc1");
        assert!(host.active_document().is_none());
        assert!(host.active_view().is_none());
    }

    #[test]
    fn test_trace_provider_filters_nodes() {
        let traces = MemoryTraceProvider::new();
        let ws = WorkspaceId::new();
        let (a, b) = (NodeId::new(), NodeId::new());
        traces.set_trace(ws, a, vec!["1".into()]);
        traces.set_trace(ws, b, vec!["2".into()]);

        let data = traces.trace_data_for_nodes(ws, &[a]).unwrap();
        assert_eq!(data.len(), 1);
        assert!(data.contains_key(&a));
    }
}
