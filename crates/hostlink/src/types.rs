//! Core identifier and view types
//!
//! Workspace and node identifiers come from the graph runtime, element and
//! document identifiers come from the host. None of them carry meaning
//! outside the collaborator that issued them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a graph workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(pub Uuid);

impl WorkspaceId {
    /// Generate a fresh random workspace id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a node within a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Generate a fresh random node id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Integer id of a native element inside a host document
///
/// Only meaningful for the document generation that issued it; always
/// existence-check through `HostDocument::try_resolve` before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub i64);

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a host document; equality is document identity
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of an open host transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u64);

/// The kind of a host view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewKind {
    Plan,
    Section,
    Sheet,
    Schedule,
    /// 3D view, either isometric or perspective camera
    ThreeD { perspective: bool },
}

impl ViewKind {
    /// Whether the view uses a perspective camera
    pub fn is_perspective(&self) -> bool {
        matches!(self, ViewKind::ThreeD { perspective: true })
    }
}

/// A host view and the document it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewInfo {
    pub id: String,
    pub document: DocumentId,
    pub kind: ViewKind,
}

impl ViewInfo {
    pub fn new(id: impl Into<String>, document: DocumentId, kind: ViewKind) -> Self {
        Self {
            id: id.into(),
            document,
            kind,
        }
    }
}

/// How host document mutations are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Automated/test execution: mutations run synchronously
    Automated,
    /// Interactive session: mutations wait for the host idle signal
    #[default]
    Interactive,
}

/// Node -> produced elements, in run insertion order
pub type ElementMap = BTreeMap<NodeId, Vec<ElementRef>>;

/// Opaque serialized run-trace payload owned by the execution engine
pub type TracePayload = String;

/// Node -> raw trace payloads, as persisted or reported by the engine
pub type TraceData = BTreeMap<NodeId, Vec<TracePayload>>;
