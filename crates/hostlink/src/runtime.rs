//! Graph runtime and execution engine collaborator interfaces
//!
//! The runtime owns workspaces and their run flags; the execution engine
//! owns run traces. Trace payloads are opaque to this crate apart from the
//! element-extraction contract of [`TraceDecoder`].

use serde_json::Value;

use crate::error::{HostLinkError, Result};
use crate::types::{ElementRef, NodeId, TraceData, TracePayload, WorkspaceId};

/// A workspace known to the graph runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceInfo {
    pub id: WorkspaceId,
    /// Home workspaces are top-level graphs; custom node definitions are not
    pub is_home: bool,
}

/// Graph runtime: workspace listing and run control
pub trait GraphRuntime: Send + Sync {
    /// All workspaces, in runtime order
    fn workspaces(&self) -> Vec<WorkspaceInfo>;

    /// Allow or forbid the workspace from running
    fn set_run_enabled(&self, workspace: WorkspaceId, enabled: bool);

    /// Whether the workspace may run
    fn run_enabled(&self, workspace: WorkspaceId) -> bool;

    /// Mark every node dirty so the next run re-derives all state
    fn mark_all_nodes_dirty(&self, workspace: WorkspaceId);

    /// Ask the runtime to schedule a run
    fn request_run(&self, workspace: WorkspaceId);
}

/// Ids of the home workspaces, in runtime order
pub fn home_workspaces(runtime: &dyn GraphRuntime) -> Vec<WorkspaceId> {
    runtime
        .workspaces()
        .into_iter()
        .filter(|ws| ws.is_home)
        .map(|ws| ws.id)
        .collect()
}

/// Execution engine: the live run-trace store
pub trait TraceProvider: Send + Sync {
    /// Nodes currently in the workspace
    fn node_ids(&self, workspace: WorkspaceId) -> Result<Vec<NodeId>>;

    /// Trace payloads recorded by the current run, for the given nodes
    ///
    /// Nodes without trace data may be missing from the result.
    fn trace_data_for_nodes(&self, workspace: WorkspaceId, nodes: &[NodeId]) -> Result<TraceData>;
}

/// Extracts element references from an opaque trace payload
pub trait TraceDecoder: Send + Sync {
    fn extract_element_refs(&self, payload: &TracePayload) -> Result<Vec<ElementRef>>;
}

/// Decoder for JSON trace payloads
///
/// Accepts any nesting of:
/// - an integer element id: `42`
/// - an array of payloads: `[1, 2, {"intId": 3}]`
/// - a serialized id object: `{"stringId": "...", "intId": 42}`
/// - an id list wrapper: `{"ids": [...]}`
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTraceDecoder;

impl JsonTraceDecoder {
    fn collect(value: &Value, out: &mut Vec<ElementRef>) -> Result<()> {
        match value {
            Value::Number(n) => {
                let id = n.as_i64().ok_or_else(|| {
                    HostLinkError::InvalidTracePayload(format!("not an integer id: {}", n))
                })?;
                out.push(ElementRef(id));
            }
            Value::Array(items) => {
                for item in items {
                    Self::collect(item, out)?;
                }
            }
            Value::Object(map) => {
                if let Some(id) = map.get("intId") {
                    Self::collect(id, out)?;
                } else if let Some(ids) = map.get("ids") {
                    Self::collect(ids, out)?;
                } else {
                    return Err(HostLinkError::InvalidTracePayload(
                        "object without intId or ids".to_string(),
                    ));
                }
            }
            other => {
                return Err(HostLinkError::InvalidTracePayload(format!(
                    "unexpected value: {}",
                    other
                )));
            }
        }
        Ok(())
    }
}

impl TraceDecoder for JsonTraceDecoder {
    fn extract_element_refs(&self, payload: &TracePayload) -> Result<Vec<ElementRef>> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| HostLinkError::InvalidTracePayload(e.to_string()))?;
        let mut refs = Vec::new();
        Self::collect(&value, &mut refs)?;
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(payload: &str) -> Result<Vec<ElementRef>> {
        JsonTraceDecoder.extract_element_refs(&payload.to_string())
    }

    #[test]
    fn test_decode_shapes() {
        assert_eq!(decode("7").unwrap(), vec![ElementRef(7)]);
        assert_eq!(
            decode(r#"[1, {"intId": 2}, {"ids": [3, 4]}]"#).unwrap(),
            vec![ElementRef(1), ElementRef(2), ElementRef(3), ElementRef(4)]
        );
        assert_eq!(
            decode(r#"{"stringId": "a1b2-0000", "intId": 316}"#).unwrap(),
            vec![ElementRef(316)]
        );
        assert!(decode("[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode("not json"),
            Err(HostLinkError::InvalidTracePayload(_))
        ));
        assert!(decode(r#"{"name": "wall"}"#).is_err());
        assert!(decode(r#""12""#).is_err());
        assert!(decode("1.5").is_err());
    }
}
