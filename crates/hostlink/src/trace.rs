//! Snapshot of the elements produced by the current run

use std::sync::Arc;

use crate::error::Result;
use crate::runtime::{TraceDecoder, TraceProvider};
use crate::types::{ElementMap, WorkspaceId};

/// Reads node -> element mappings out of the engine's run-trace store
///
/// Every node currently in the workspace appears in the snapshot; nodes
/// without trace data map to an empty sequence.
pub struct TraceSnapshotReader {
    provider: Arc<dyn TraceProvider>,
    decoder: Arc<dyn TraceDecoder>,
}

impl TraceSnapshotReader {
    pub fn new(provider: Arc<dyn TraceProvider>, decoder: Arc<dyn TraceDecoder>) -> Self {
        Self { provider, decoder }
    }

    /// Take a snapshot of the workspace's current run
    ///
    /// Fails if the engine cannot report trace data or a payload is corrupt.
    pub fn snapshot(&self, workspace: WorkspaceId) -> Result<ElementMap> {
        let nodes = self.provider.node_ids(workspace)?;
        let mut trace_data = self.provider.trace_data_for_nodes(workspace, &nodes)?;

        let mut snapshot = ElementMap::new();
        for node in nodes {
            let mut refs = Vec::new();
            for payload in trace_data.remove(&node).unwrap_or_default() {
                refs.extend(self.decoder.extract_element_refs(&payload)?);
            }
            snapshot.insert(node, refs);
        }
        Ok(snapshot)
    }

    /// The decoder used for trace payloads
    pub fn decoder(&self) -> &Arc<dyn TraceDecoder> {
        &self.decoder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostLinkError;
    use crate::memory::MemoryTraceProvider;
    use crate::runtime::JsonTraceDecoder;
    use crate::types::{ElementRef, NodeId};

    #[test]
    fn test_snapshot_includes_nodes_without_trace() {
        let provider = Arc::new(MemoryTraceProvider::new());
        let ws = WorkspaceId::new();
        let (a, b) = (NodeId::new(), NodeId::new());
        provider.set_nodes(ws, vec![a, b]);
        provider.set_trace(ws, a, vec!["[10, 11]".to_string(), "12".to_string()]);

        let reader = TraceSnapshotReader::new(provider, Arc::new(JsonTraceDecoder));
        let snapshot = reader.snapshot(ws).unwrap();

        assert_eq!(snapshot[&a], vec![ElementRef(10), ElementRef(11), ElementRef(12)]);
        assert!(snapshot[&b].is_empty());
    }

    #[test]
    fn test_snapshot_ignores_trace_for_removed_nodes() {
        let provider = Arc::new(MemoryTraceProvider::new());
        let ws = WorkspaceId::new();
        let (kept, removed) = (NodeId::new(), NodeId::new());
        provider.set_nodes(ws, vec![kept]);
        provider.set_trace(ws, removed, vec!["[1]".to_string()]);

        let reader = TraceSnapshotReader::new(provider, Arc::new(JsonTraceDecoder));
        let snapshot = reader.snapshot(ws).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.contains_key(&removed));
    }

    #[test]
    fn test_snapshot_propagates_engine_failure() {
        let provider = Arc::new(MemoryTraceProvider::new());
        let ws = WorkspaceId::new();
        provider.set_nodes(ws, vec![NodeId::new()]);
        provider.fail_with("engine is rebuilding");

        let reader = TraceSnapshotReader::new(provider, Arc::new(JsonTraceDecoder));
        assert!(matches!(
            reader.snapshot(ws),
            Err(HostLinkError::TraceUnavailable(_))
        ));
    }

    #[test]
    fn test_snapshot_rejects_corrupt_payload() {
        let provider = Arc::new(MemoryTraceProvider::new());
        let ws = WorkspaceId::new();
        let node = NodeId::new();
        provider.set_nodes(ws, vec![node]);
        provider.set_trace(ws, node, vec!["{broken".to_string()]);

        let reader = TraceSnapshotReader::new(provider, Arc::new(JsonTraceDecoder));
        assert!(matches!(
            reader.snapshot(ws),
            Err(HostLinkError::InvalidTracePayload(_))
        ));
    }
}
