//! Scenario files replayed against an in-memory host
//!
//! A scenario describes the open documents, the workspaces with the trace
//! data they were loaded with, and an ordered list of steps. Replaying it
//! drives a real `HostBridge` and reports what the bridge did.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use hostlink::memory::{MemoryDocument, MemoryHost, MemoryRuntime, MemoryTraceProvider};
use hostlink::runtime::GraphRuntime;
use hostlink::{
    BridgeConfig, BridgeNotification, DocumentId, ElementRef, HostBridge, HostEvent, NodeId,
    ReconcileOutcome, TraceData, VecSink, ViewInfo, WorkspaceId,
};
use serde::{Deserialize, Serialize};

/// A document open in the host when the scenario starts
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSpec {
    pub id: String,
    #[serde(default)]
    pub elements: Vec<i64>,
}

/// A workspace known to the runtime when the scenario starts
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSpec {
    pub id: WorkspaceId,
    #[serde(default = "default_home")]
    pub home: bool,
    #[serde(default)]
    pub nodes: Vec<NodeId>,
    /// Trace data persisted by the previous session
    #[serde(default)]
    pub preloaded: Option<TraceData>,
}

fn default_home() -> bool {
    true
}

/// One scenario step
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum Step {
    /// The host switches its active document and view
    #[serde(rename_all = "camelCase")]
    Activate { document: String, view: ViewInfo },
    /// The host closes a document without emitting events
    #[serde(rename_all = "camelCase")]
    Close { document: String },
    /// The host emits an event
    #[serde(rename_all = "camelCase")]
    Host { event: HostEvent },
    /// A workspace evaluation completes with the given run trace
    #[serde(rename_all = "camelCase")]
    Evaluate {
        workspace: WorkspaceId,
        #[serde(default)]
        nodes: Option<Vec<NodeId>>,
        #[serde(default)]
        trace: TraceData,
    },
    /// The bridge shuts down
    #[serde(rename_all = "camelCase")]
    Shutdown {
        #[serde(default)]
        close_host: Option<bool>,
    },
}

/// A complete scenario
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub documents: Vec<DocumentSpec>,
    #[serde(default)]
    pub active_document: Option<String>,
    #[serde(default)]
    pub active_view: Option<ViewInfo>,
    #[serde(default)]
    pub perspective_automation: bool,
    pub workspaces: Vec<WorkspaceSpec>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid scenario {:?}", path))
    }
}

/// What the bridge did over a replay
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub notifications: Vec<BridgeNotification>,
    pub reconciliations: Vec<ReconcileRecord>,
    pub current_document: Option<DocumentId>,
    pub run_enabled: BTreeMap<WorkspaceId, bool>,
    pub elements: BTreeMap<String, Vec<ElementRef>>,
    pub host_close_requested: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRecord {
    pub workspace: WorkspaceId,
    pub outcome: String,
}

fn describe(outcome: &ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::Skipped => "skipped".to_string(),
        ReconcileOutcome::Aborted { reason } => format!("aborted: {}", reason),
        ReconcileOutcome::Clean => "clean".to_string(),
        ReconcileOutcome::Deleted(n) => format!("deleted {}", n),
        ReconcileOutcome::Deferred(n) => format!("deferred {}", n),
        ReconcileOutcome::Abandoned { reason } => format!("abandoned: {}", reason),
    }
}

/// Replay a scenario and report the result
pub fn replay(scenario: &Scenario, config: BridgeConfig) -> Result<Report> {
    let host = Arc::new(MemoryHost::new());
    host.set_perspective_automation(scenario.perspective_automation);
    for spec in &scenario.documents {
        host.add_document(Arc::new(MemoryDocument::with_elements(
            spec.id.clone(),
            spec.elements.iter().copied(),
        )));
    }
    if let Some(active) = &scenario.active_document {
        let view = scenario
            .active_view
            .clone()
            .with_context(|| format!("Active document '{}' needs an active view", active))?;
        host.activate(active, view);
    }

    let runtime = Arc::new(MemoryRuntime::new());
    let traces = Arc::new(MemoryTraceProvider::new());
    for ws in &scenario.workspaces {
        runtime.insert_workspace(ws.id, ws.home);
        traces.set_nodes(ws.id, ws.nodes.clone());
    }

    let sink = Arc::new(VecSink::new());
    let close_on_shutdown = config.close_host_on_shutdown;
    let mut bridge = HostBridge::builder(host.clone(), runtime.clone(), traces.clone())
        .config(config)
        .notifications(sink.clone())
        .build();

    for ws in &scenario.workspaces {
        bridge.on_workspace_added(ws.id, ws.preloaded.as_ref());
    }

    let mut reconciliations = Vec::new();
    for (index, step) in scenario.steps.iter().enumerate() {
        log::debug!("Step {}: {:?}", index, step);
        match step {
            Step::Activate { document, view } => host.activate(document, view.clone()),
            Step::Close { document } => host.close_document(document),
            Step::Host { event } => bridge.on_host_event(event),
            Step::Evaluate {
                workspace,
                nodes,
                trace,
            } => {
                if let Some(nodes) = nodes {
                    traces.set_nodes(*workspace, nodes.clone());
                }
                traces.set_run(*workspace, trace.clone());
                let outcome = bridge
                    .on_evaluation_completed(*workspace)
                    .with_context(|| format!("Step {}: reconciliation failed", index))?;
                reconciliations.push(ReconcileRecord {
                    workspace: *workspace,
                    outcome: describe(&outcome),
                });
            }
            Step::Shutdown { close_host } => {
                bridge.shutdown(close_host.unwrap_or(close_on_shutdown));
            }
        }
    }

    let run_enabled = scenario
        .workspaces
        .iter()
        .map(|ws| (ws.id, runtime.run_enabled(ws.id)))
        .collect();
    let elements = scenario
        .documents
        .iter()
        .filter_map(|spec| host.document(&spec.id).map(|doc| (spec.id.clone(), doc.elements())))
        .collect();

    Ok(Report {
        notifications: sink.notifications(),
        reconciliations,
        current_document: bridge.current_document(),
        run_enabled,
        elements,
        host_close_requested: host.close_requested(),
    })
}
