//! Host lifecycle synchronizer
//!
//! Owns the single "current document" the graph is bound to and decides
//! whether home workspaces may run. Every transition is driven by a host
//! event delivered on the host thread.
//!
//! # States
//!
//! - `NoDocument`: nothing is bound; runs are disabled
//! - `BoundTo(doc)`: the graph works against `doc`
//! - `PendingSwitch(doc)`: `doc` is closing; the host has not yet reported
//!   which document becomes active, so rebinding waits for `DocumentClosed`

use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::{notify, BridgeNotification, NotificationSink};
use crate::host::{HostApplication, HostDocument, HostEvent, MaterialsHook};
use crate::render_cache::RenderCacheRegistry;
use crate::runtime::{home_workspaces, GraphRuntime};
use crate::types::{DocumentId, ViewInfo};

/// Shared read handle to the bound document
///
/// Only the synchronizer writes through it; deletion reads it when a batch
/// actually runs.
#[derive(Clone, Default)]
pub struct DocumentPointer {
    inner: Arc<RwLock<Option<Arc<dyn HostDocument>>>>,
}

impl DocumentPointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bound document, if any
    pub fn get(&self) -> Option<Arc<dyn HostDocument>> {
        self.inner.read().clone()
    }

    /// Identity of the bound document, if any
    pub fn id(&self) -> Option<DocumentId> {
        self.inner.read().as_ref().map(|doc| doc.id())
    }

    pub(crate) fn set(&self, document: Option<Arc<dyn HostDocument>>) {
        *self.inner.write() = document;
    }
}

impl std::fmt::Debug for DocumentPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DocumentPointer").field(&self.id()).finish()
    }
}

/// Binding state of the synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentState {
    NoDocument,
    BoundTo(DocumentId),
    PendingSwitch(DocumentId),
}

/// Keeps the bound document and run flags in step with host events
pub struct HostLifecycleSynchronizer {
    host: Arc<dyn HostApplication>,
    runtime: Arc<dyn GraphRuntime>,
    notifications: Arc<dyn NotificationSink>,
    render_caches: Arc<RenderCacheRegistry>,
    materials: Arc<dyn MaterialsHook>,
    pointer: DocumentPointer,
    state: DocumentState,
    perspective_allowed: bool,
    attached: bool,
}

impl HostLifecycleSynchronizer {
    pub fn new(
        host: Arc<dyn HostApplication>,
        runtime: Arc<dyn GraphRuntime>,
        notifications: Arc<dyn NotificationSink>,
        render_caches: Arc<RenderCacheRegistry>,
        materials: Arc<dyn MaterialsHook>,
    ) -> Self {
        let perspective_allowed = host.allows_perspective_automation();
        Self {
            host,
            runtime,
            notifications,
            render_caches,
            materials,
            pointer: DocumentPointer::new(),
            state: DocumentState::NoDocument,
            perspective_allowed,
            attached: false,
        }
    }

    /// Override the host's perspective-view automation capability
    pub fn with_perspective_automation(mut self, allowed: bool) -> Self {
        self.perspective_allowed = allowed;
        self
    }

    /// Attach to the host and bind to its active document, if any
    pub fn start(&mut self) {
        self.attached = true;
        match self.host.active_document() {
            Some(doc) => {
                log::info!("Starting bound to document {}", doc.id());
                self.bind(doc);
            }
            None => log::info!("Starting without an active document"),
        }
    }

    /// Stop reacting to host events
    pub fn detach(&mut self) {
        if self.attached {
            log::debug!("Detaching from host lifecycle events");
        }
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    /// Identity of the bound document, if any
    pub fn current_document(&self) -> Option<DocumentId> {
        self.pointer.id()
    }

    /// Read handle shared with deletion
    pub fn pointer(&self) -> DocumentPointer {
        self.pointer.clone()
    }

    /// Apply one host event
    pub fn handle(&mut self, event: &HostEvent) {
        if !self.attached {
            log::debug!("Ignoring {:?}, synchronizer is detached", event);
            return;
        }

        match event {
            HostEvent::DocumentOpened => self.on_document_opened(),
            HostEvent::DocumentClosing(doc) => self.on_document_closing(doc),
            HostEvent::DocumentClosed => self.on_document_closed(),
            HostEvent::ViewActivating(view) => self.on_view_activating(view),
            HostEvent::ViewActivated(view) => self.on_view_activated(view),
            HostEvent::Idling => {}
        }
    }

    fn on_document_opened(&mut self) {
        if self.state != DocumentState::NoDocument {
            return;
        }
        let Some(doc) = self.host.active_document() else {
            log::debug!("Document opened but host reports none active");
            return;
        };
        log::info!("Binding to opened document {}", doc.id());
        self.bind(doc);
        self.set_runs_enabled(true);
        self.reset_for_new_document();
    }

    fn on_document_closing(&mut self, closing: &DocumentId) {
        if let DocumentState::BoundTo(bound) = &self.state {
            if bound == closing {
                log::debug!("Bound document {} is closing", closing);
                self.state = DocumentState::PendingSwitch(closing.clone());
            }
        }
    }

    fn on_document_closed(&mut self) {
        match self.host.active_document() {
            None => {
                log::info!("Last document closed");
                self.pointer.set(None);
                self.state = DocumentState::NoDocument;
                self.set_runs_enabled(false);
                notify(self.notifications.as_ref(), BridgeNotification::DocumentLost);
            }
            Some(doc) => {
                if matches!(self.state, DocumentState::PendingSwitch(_)) {
                    let id = doc.id();
                    log::info!("Switching to document {}", id);
                    self.bind(doc);
                    notify(
                        self.notifications.as_ref(),
                        BridgeNotification::DocumentChanged { document: id },
                    );
                }
            }
        }

        if let Some(view) = self.host.active_view() {
            self.evaluate_view(&view);
        }
    }

    fn on_view_activating(&mut self, view: &ViewInfo) {
        self.evaluate_view(view);
    }

    fn on_view_activated(&mut self, view: &ViewInfo) {
        if self.state != DocumentState::NoDocument {
            return;
        }
        let Some(doc) = self.host.active_document() else {
            log::debug!("View {} activated without an active document", view.id);
            return;
        };
        let id = doc.id();
        log::info!("Binding to document {} through view {}", id, view.id);
        self.bind(doc);
        self.set_runs_enabled(true);
        self.materials.reinitialize(&id);
        self.reset_for_new_document();
    }

    /// Enable or disable runs for a view about to become active
    fn evaluate_view(&mut self, view: &ViewInfo) {
        if view.kind.is_perspective() && !self.perspective_allowed {
            log::debug!("Perspective view {} cannot host automation", view.id);
            self.set_runs_enabled(false);
            notify(
                self.notifications.as_ref(),
                BridgeNotification::ContextUnavailable {
                    view: view.id.clone(),
                },
            );
            return;
        }

        if self.current_document().as_ref() == Some(&view.document) {
            self.set_runs_enabled(true);
        } else {
            log::debug!(
                "View {} belongs to {}, not the bound document",
                view.id,
                view.document
            );
            self.set_runs_enabled(false);
            notify(
                self.notifications.as_ref(),
                BridgeNotification::InvalidDocumentActivated {
                    view: view.id.clone(),
                    document: view.document.clone(),
                },
            );
        }
    }

    fn bind(&mut self, doc: Arc<dyn HostDocument>) {
        self.state = DocumentState::BoundTo(doc.id());
        self.pointer.set(Some(doc));
    }

    fn set_runs_enabled(&self, enabled: bool) {
        for ws in home_workspaces(self.runtime.as_ref()) {
            self.runtime.set_run_enabled(ws, enabled);
        }
    }

    /// Drop cached display state and force a full re-run
    fn reset_for_new_document(&self) {
        let dropped = self.render_caches.clear_all();
        log::debug!("Cleared {} render packages for new document", dropped);
        for ws in home_workspaces(self.runtime.as_ref()) {
            self.runtime.mark_all_nodes_dirty(ws);
            self.runtime.request_run(ws);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::VecSink;
    use crate::memory::{MemoryDocument, MemoryHost, MemoryRuntime};
    use crate::types::{ViewKind, WorkspaceId};

    struct Fixture {
        host: Arc<MemoryHost>,
        runtime: Arc<MemoryRuntime>,
        sink: Arc<VecSink>,
        caches: Arc<RenderCacheRegistry>,
        home: WorkspaceId,
        sync: HostLifecycleSynchronizer,
    }

    fn fixture(active: Option<&str>) -> Fixture {
        let host = Arc::new(MemoryHost::new());
        host.add_document(Arc::new(MemoryDocument::with_elements("doc1", [1])));
        host.add_document(Arc::new(MemoryDocument::with_elements("doc2", [2])));
        if let Some(id) = active {
            host.activate(id, plan_view(id));
        }

        let runtime = Arc::new(MemoryRuntime::new());
        let home = runtime.add_workspace(true);
        runtime.add_workspace(false);

        let sink = Arc::new(VecSink::new());
        let caches = Arc::new(RenderCacheRegistry::new());
        let mut sync = HostLifecycleSynchronizer::new(
            host.clone(),
            runtime.clone(),
            sink.clone(),
            caches.clone(),
            Arc::new(crate::host::NoMaterials),
        );
        sync.start();

        Fixture {
            host,
            runtime,
            sink,
            caches,
            home,
            sync,
        }
    }

    fn plan_view(doc: &str) -> ViewInfo {
        ViewInfo::new(format!("{doc}/Level 1"), DocumentId::new(doc), ViewKind::Plan)
    }

    fn camera_view(doc: &str) -> ViewInfo {
        ViewInfo::new(
            format!("{doc}/Camera"),
            DocumentId::new(doc),
            ViewKind::ThreeD { perspective: true },
        )
    }

    #[test]
    fn test_start_binds_active_document() {
        let fx = fixture(Some("doc1"));
        assert_eq!(fx.sync.state(), &DocumentState::BoundTo(DocumentId::new("doc1")));
        assert_eq!(fx.sync.current_document(), Some(DocumentId::new("doc1")));
    }

    #[test]
    fn test_start_without_document() {
        let fx = fixture(None);
        assert_eq!(fx.sync.state(), &DocumentState::NoDocument);
        assert!(fx.sync.current_document().is_none());
    }

    #[test]
    fn test_open_binds_and_resets() {
        let mut fx = fixture(None);
        let node = crate::types::NodeId::new();
        fx.caches.store(
            node,
            vec![crate::render_cache::RenderPackage {
                element: None,
                payload: serde_json::Value::Null,
            }],
        );

        fx.host.activate("doc1", plan_view("doc1"));
        fx.sync.handle(&HostEvent::DocumentOpened);

        assert_eq!(fx.sync.current_document(), Some(DocumentId::new("doc1")));
        assert!(fx.runtime.run_enabled(fx.home));
        assert_eq!(fx.runtime.dirty_marks(fx.home), 1);
        assert_eq!(fx.runtime.run_requests(fx.home), 1);
        assert_eq!(fx.caches.package_count(), 0);
    }

    #[test]
    fn test_open_additional_document_keeps_binding() {
        let mut fx = fixture(Some("doc1"));
        fx.host.activate("doc2", plan_view("doc2"));
        fx.sync.handle(&HostEvent::DocumentOpened);

        assert_eq!(fx.sync.current_document(), Some(DocumentId::new("doc1")));
        assert_eq!(fx.runtime.dirty_marks(fx.home), 0);
    }

    #[test]
    fn test_closing_other_document_does_not_arm_switch() {
        let mut fx = fixture(Some("doc1"));
        fx.sync.handle(&HostEvent::DocumentClosing(DocumentId::new("doc2")));
        assert_eq!(fx.sync.state(), &DocumentState::BoundTo(DocumentId::new("doc1")));

        fx.sync.handle(&HostEvent::DocumentClosed);
        assert_eq!(fx.sync.current_document(), Some(DocumentId::new("doc1")));
        assert_eq!(
            fx.sync_notifications_of(|n| matches!(n, BridgeNotification::DocumentChanged { .. })),
            0
        );
    }

    #[test]
    fn test_closing_bound_document_switches() {
        let mut fx = fixture(Some("doc1"));
        fx.sync.handle(&HostEvent::DocumentClosing(DocumentId::new("doc1")));
        assert_eq!(
            fx.sync.state(),
            &DocumentState::PendingSwitch(DocumentId::new("doc1"))
        );

        fx.host.close_document("doc1");
        fx.host.activate("doc2", plan_view("doc2"));
        fx.sync.handle(&HostEvent::DocumentClosed);

        assert_eq!(fx.sync.state(), &DocumentState::BoundTo(DocumentId::new("doc2")));
        assert!(fx.runtime.run_enabled(fx.home));
        assert_eq!(
            fx.sink.notifications(),
            vec![BridgeNotification::DocumentChanged {
                document: DocumentId::new("doc2")
            }]
        );
    }

    #[test]
    fn test_last_document_closed() {
        let mut fx = fixture(Some("doc1"));
        fx.runtime.set_run_enabled(fx.home, true);

        fx.sync.handle(&HostEvent::DocumentClosing(DocumentId::new("doc1")));
        fx.host.close_document("doc1");
        fx.host.close_document("doc2");
        fx.sync.handle(&HostEvent::DocumentClosed);

        assert_eq!(fx.sync.state(), &DocumentState::NoDocument);
        assert!(fx.sync.current_document().is_none());
        assert!(!fx.runtime.run_enabled(fx.home));
        assert_eq!(fx.sink.notifications(), vec![BridgeNotification::DocumentLost]);
    }

    #[test]
    fn test_perspective_view_disables_run() {
        let mut fx = fixture(Some("doc1"));
        fx.runtime.set_run_enabled(fx.home, true);

        fx.sync.handle(&HostEvent::ViewActivating(camera_view("doc1")));

        assert!(!fx.runtime.run_enabled(fx.home));
        assert_eq!(
            fx.sink.notifications(),
            vec![BridgeNotification::ContextUnavailable {
                view: "doc1/Camera".into()
            }]
        );
        assert_eq!(fx.sync.current_document(), Some(DocumentId::new("doc1")));
    }

    #[test]
    fn test_perspective_allowed_by_override() {
        let host = Arc::new(MemoryHost::new());
        host.add_document(Arc::new(MemoryDocument::new("doc1")));
        host.activate("doc1", plan_view("doc1"));
        let runtime = Arc::new(MemoryRuntime::new());
        let home = runtime.add_workspace(true);
        let sink = Arc::new(VecSink::new());
        let mut sync = HostLifecycleSynchronizer::new(
            host,
            runtime.clone(),
            sink.clone(),
            Arc::new(RenderCacheRegistry::new()),
            Arc::new(crate::host::NoMaterials),
        )
        .with_perspective_automation(true);
        sync.start();

        sync.handle(&HostEvent::ViewActivating(camera_view("doc1")));

        assert!(runtime.run_enabled(home));
        assert!(sink.notifications().is_empty());
    }

    #[test]
    fn test_foreign_view_disables_run() {
        let mut fx = fixture(Some("doc1"));
        fx.sync.handle(&HostEvent::ViewActivating(plan_view("doc2")));

        assert!(!fx.runtime.run_enabled(fx.home));
        assert_eq!(
            fx.sink.notifications(),
            vec![BridgeNotification::InvalidDocumentActivated {
                view: "doc2/Level 1".into(),
                document: DocumentId::new("doc2"),
            }]
        );

        fx.sync.handle(&HostEvent::ViewActivating(plan_view("doc1")));
        assert!(fx.runtime.run_enabled(fx.home));
    }

    #[test]
    fn test_view_activated_binds_when_unbound() {
        let mut fx = fixture(None);
        fx.host.activate("doc2", plan_view("doc2"));
        fx.sync.handle(&HostEvent::ViewActivated(plan_view("doc2")));

        assert_eq!(fx.sync.current_document(), Some(DocumentId::new("doc2")));
        assert!(fx.runtime.run_enabled(fx.home));
        assert_eq!(fx.runtime.dirty_marks(fx.home), 1);
    }

    #[test]
    fn test_custom_workspaces_untouched() {
        let mut fx = fixture(Some("doc1"));
        let custom = fx
            .runtime
            .workspaces()
            .into_iter()
            .find(|ws| !ws.is_home)
            .unwrap()
            .id;
        fx.runtime.set_run_enabled(custom, true);

        fx.sync.handle(&HostEvent::ViewActivating(plan_view("doc2")));
        assert!(fx.runtime.run_enabled(custom));
    }

    #[test]
    fn test_detached_ignores_events() {
        let mut fx = fixture(Some("doc1"));
        fx.sync.detach();
        fx.host.close_document("doc1");
        fx.host.close_document("doc2");
        fx.sync.handle(&HostEvent::DocumentClosed);

        assert_eq!(fx.sync.current_document(), Some(DocumentId::new("doc1")));
        assert!(fx.sink.notifications().is_empty());
    }

    impl Fixture {
        fn sync_notifications_of(&self, predicate: impl Fn(&BridgeNotification) -> bool) -> usize {
            self.sink.count(predicate)
        }
    }
}
