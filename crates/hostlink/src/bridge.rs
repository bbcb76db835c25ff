//! The bridge between one graph runtime and one host application
//!
//! `HostBridge` owns every piece of synchronization state (ledger, bound
//! document, idle queue, render caches) and is the single entry point for
//! runtime and host signals. Construct it once per host session and drop it
//! at shutdown.

use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::deletion::DeletionExecutor;
use crate::error::Result;
use crate::events::{notify, BridgeNotification, NotificationSink, NullSink};
use crate::host::{HostApplication, HostEvent, MaterialsHook, NoMaterials};
use crate::idle::IdleQueue;
use crate::ledger::IdentityLedger;
use crate::lifecycle::{DocumentState, HostLifecycleSynchronizer};
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::render_cache::RenderCacheRegistry;
use crate::runtime::{GraphRuntime, JsonTraceDecoder, TraceDecoder, TraceProvider};
use crate::trace::TraceSnapshotReader;
use crate::types::{DocumentId, TraceData, WorkspaceId};

/// Builder for [`HostBridge`]
pub struct HostBridgeBuilder {
    host: Arc<dyn HostApplication>,
    runtime: Arc<dyn GraphRuntime>,
    traces: Arc<dyn TraceProvider>,
    config: BridgeConfig,
    decoder: Arc<dyn TraceDecoder>,
    notifications: Arc<dyn NotificationSink>,
    materials: Arc<dyn MaterialsHook>,
    render_caches: Arc<RenderCacheRegistry>,
}

impl HostBridgeBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn TraceDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn notifications(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn materials(mut self, materials: Arc<dyn MaterialsHook>) -> Self {
        self.materials = materials;
        self
    }

    /// Share render caches with the visualization pass
    pub fn render_caches(mut self, render_caches: Arc<RenderCacheRegistry>) -> Self {
        self.render_caches = render_caches;
        self
    }

    /// Build the bridge and bind to the host's active document
    pub fn build(self) -> HostBridge {
        let idle = Arc::new(IdleQueue::new(self.host.clone()));

        let mut synchronizer = HostLifecycleSynchronizer::new(
            self.host.clone(),
            self.runtime.clone(),
            self.notifications.clone(),
            self.render_caches.clone(),
            self.materials,
        );
        if let Some(allowed) = self.config.perspective_automation {
            synchronizer = synchronizer.with_perspective_automation(allowed);
        }
        synchronizer.start();

        let deletion = DeletionExecutor::new(
            self.config.execution_mode,
            synchronizer.pointer(),
            idle.clone(),
            self.notifications.clone(),
            self.config.deletion_transaction_name.clone(),
        );
        let reader = TraceSnapshotReader::new(self.traces, self.decoder);
        let reconciler = Reconciler::new(reader, deletion, self.notifications.clone());

        HostBridge {
            config: self.config,
            host: self.host,
            runtime: self.runtime,
            notifications: self.notifications,
            render_caches: self.render_caches,
            ledger: IdentityLedger::new(),
            reconciler,
            synchronizer,
            idle,
            shut_down: false,
        }
    }
}

/// Owns synchronization state and routes host and runtime signals
pub struct HostBridge {
    config: BridgeConfig,
    host: Arc<dyn HostApplication>,
    runtime: Arc<dyn GraphRuntime>,
    notifications: Arc<dyn NotificationSink>,
    render_caches: Arc<RenderCacheRegistry>,
    ledger: IdentityLedger,
    reconciler: Reconciler,
    synchronizer: HostLifecycleSynchronizer,
    idle: Arc<IdleQueue>,
    shut_down: bool,
}

impl HostBridge {
    /// Start building a bridge over the given collaborators
    pub fn builder(
        host: Arc<dyn HostApplication>,
        runtime: Arc<dyn GraphRuntime>,
        traces: Arc<dyn TraceProvider>,
    ) -> HostBridgeBuilder {
        HostBridgeBuilder {
            host,
            runtime,
            traces,
            config: BridgeConfig::default(),
            decoder: Arc::new(JsonTraceDecoder),
            notifications: Arc::new(NullSink),
            materials: Arc::new(NoMaterials),
            render_caches: Arc::new(RenderCacheRegistry::new()),
        }
    }

    // =========================================================================
    // Runtime signals
    // =========================================================================

    /// A workspace was added, possibly with trace data from its last session
    pub fn on_workspace_added(&mut self, workspace: WorkspaceId, preloaded: Option<&TraceData>) {
        let Some(trace) = preloaded else {
            return;
        };
        let decoder = self.reconciler.reader().decoder().clone();
        self.ledger.record_if_absent(workspace, trace, decoder.as_ref());
    }

    /// A graph evaluation of `workspace` finished
    pub fn on_evaluation_completed(&mut self, workspace: WorkspaceId) -> Result<ReconcileOutcome> {
        self.reconciler.reconcile(&mut self.ledger, workspace)
    }

    // =========================================================================
    // Host signals
    // =========================================================================

    /// Route one host event
    pub fn on_host_event(&mut self, event: &HostEvent) {
        match event {
            HostEvent::Idling => {
                let ran = self.idle.on_idle();
                if ran > 0 {
                    log::debug!("Ran {} idle tasks", ran);
                }
            }
            other => self.synchronizer.handle(other),
        }
    }

    /// Open a document at the next idle signal
    pub fn open_document_deferred(&self, path: impl Into<String>) {
        self.reconciler
            .deletion()
            .open_document_deferred(self.host.clone(), path);
    }

    /// Detach from the host; optionally ask it to close at its next idle point
    ///
    /// A refusal is shown to the user and not retried.
    pub fn shutdown(&mut self, close_host: bool) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.synchronizer.detach();
        log::info!("Bridge shutting down");

        if !close_host {
            return;
        }
        let host = self.host.clone();
        let notifications = self.notifications.clone();
        self.idle.enqueue(move || {
            if let Err(e) = host.request_close() {
                let reason = e.to_string();
                log::warn!("Host refused to close: {}", reason);
                host.show_notice(&format!("The application cannot close right now: {}", reason));
                notify(
                    notifications.as_ref(),
                    BridgeNotification::ShutdownRefused { reason },
                );
            }
        });
    }

    /// Shut down using the configured close behavior
    pub fn shutdown_with_config(&mut self) {
        let close_host = self.config.close_host_on_shutdown;
        self.shutdown(close_host);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn current_document(&self) -> Option<DocumentId> {
        self.synchronizer.current_document()
    }

    pub fn document_state(&self) -> &DocumentState {
        self.synchronizer.state()
    }

    pub fn ledger(&self) -> &IdentityLedger {
        &self.ledger
    }

    pub fn idle_queue(&self) -> &Arc<IdleQueue> {
        &self.idle
    }

    pub fn render_caches(&self) -> &Arc<RenderCacheRegistry> {
        &self.render_caches
    }

    pub fn runtime(&self) -> &Arc<dyn GraphRuntime> {
        &self.runtime
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}
