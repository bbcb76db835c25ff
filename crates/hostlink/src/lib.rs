//! hostlink - Keeps a dataflow graph in step with a CAD host document
//!
//! A graph run creates native elements inside the host document. When the
//! graph is re-evaluated, elements that a node produced in a previous session
//! but no longer produces are orphans and must be removed from the document.
//! The host document can also change underneath the graph (documents open and
//! close, views switch), and the graph may only run while it is bound to the
//! right document.
//!
//! This crate provides:
//!
//! - `IdentityLedger`: one-shot record of which elements each node produced
//!   in the persisted session
//! - `TraceSnapshotReader`: the current run's node -> element mapping
//! - `Reconciler`: diffs the two and hands the orphan set to deletion
//! - `DeletionExecutor`: removes orphans inside a single host transaction,
//!   deferred to host idle time in interactive mode
//! - `HostLifecycleSynchronizer`: the current document state machine that
//!   gates graph execution
//! - `HostBridge`: owns all of the above and routes host/runtime signals
//!
//! # Architecture
//!
//! The graph runtime, its trace store and the host application are external
//! collaborators, consumed through the traits in [`host`] and [`runtime`].
//! An in-memory implementation of every collaborator lives in [`memory`].
//!
//! # Example
//!
//! ```ignore
//! use hostlink::{BridgeConfig, HostBridge};
//!
//! let mut bridge = HostBridge::builder(host, runtime, traces)
//!     .config(BridgeConfig::default())
//!     .build();
//!
//! bridge.on_workspace_added(workspace_id, preloaded_trace);
//! bridge.on_evaluation_completed(workspace_id)?;
//! ```

pub mod bridge;
pub mod config;
pub mod deletion;
pub mod error;
pub mod events;
pub mod host;
pub mod idle;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod reconcile;
pub mod render_cache;
pub mod runtime;
pub mod trace;
pub mod transaction;
pub mod types;

// Re-export key types
pub use bridge::{HostBridge, HostBridgeBuilder};
pub use config::BridgeConfig;
pub use deletion::{DeletionExecutor, DeletionOutcome};
pub use error::{HostLinkError, Result};
pub use events::{BridgeNotification, NotificationSink, NullSink, VecSink};
pub use host::{HostApplication, HostDocument, HostEvent, HostFailure, MaterialsHook};
pub use idle::IdleQueue;
pub use ledger::IdentityLedger;
pub use lifecycle::{DocumentPointer, DocumentState, HostLifecycleSynchronizer};
pub use reconcile::{compute_orphans, ReconcileOutcome, Reconciler};
pub use render_cache::{RenderCacheRegistry, RenderPackage};
pub use runtime::{GraphRuntime, JsonTraceDecoder, TraceDecoder, TraceProvider};
pub use trace::TraceSnapshotReader;
pub use types::{
    DocumentId, ElementMap, ElementRef, ExecutionMode, NodeId, TraceData, TracePayload,
    TransactionId, ViewInfo, ViewKind, WorkspaceId,
};
