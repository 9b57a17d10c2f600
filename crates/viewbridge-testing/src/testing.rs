//! Scenario driver wiring a [`RenderManager`] to the in-memory surface
//! and a recording sink, so tests can feed mutation batches in and
//! assert on surface calls and emitted logical events.

use std::cell::RefCell;
use std::rc::Rc;

use viewbridge_core::{
    AttachError, AttrValue, EventSink, HandleId, MemorySurface, Mutation, NativeEvent, NodeId,
    NodeRef, RenderManager, RootId, SurfaceOp,
};

/// One logical event as observed by the sink.
#[derive(Clone, Debug, PartialEq)]
pub struct EmittedEvent {
    pub node_id: NodeId,
    pub name: String,
    pub payload: AttrValue,
    pub can_capture: bool,
    pub can_bubble: bool,
}

/// [`EventSink`] that records every emitted tuple in order.
#[derive(Default)]
pub struct RecordingSink {
    events: RefCell<Vec<EmittedEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.borrow().clone()
    }

    pub fn take_events(&self) -> Vec<EmittedEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn emit(
        &self,
        node_id: NodeId,
        name: &str,
        payload: &AttrValue,
        can_capture: bool,
        can_bubble: bool,
    ) {
        self.events.borrow_mut().push(EmittedEvent {
            node_id,
            name: name.to_owned(),
            payload: payload.clone(),
            can_capture,
            can_bubble,
        });
    }
}

/// A complete bridge instance over a [`MemorySurface`] and a
/// [`RecordingSink`], ready to drive end-to-end scenarios.
pub struct BridgeHarness {
    surface: Rc<RefCell<MemorySurface>>,
    sink: Rc<RecordingSink>,
    manager: RenderManager,
}

impl BridgeHarness {
    pub fn new() -> Self {
        Self::with_instance(1)
    }

    pub fn with_instance(instance_id: u32) -> Self {
        let surface = Rc::new(RefCell::new(MemorySurface::new()));
        let sink = Rc::new(RecordingSink::default());
        let manager = RenderManager::new(instance_id, surface.clone(), sink.clone());
        Self {
            surface,
            sink,
            manager,
        }
    }

    pub fn surface(&self) -> &Rc<RefCell<MemorySurface>> {
        &self.surface
    }

    pub fn sink(&self) -> &Rc<RecordingSink> {
        &self.sink
    }

    pub fn manager(&mut self) -> &mut RenderManager {
        &mut self.manager
    }

    /// Applies a mutation batch against one root.
    pub fn apply(
        &mut self,
        root_id: RootId,
        mutations: impl IntoIterator<Item = Mutation>,
    ) -> Result<(), AttachError> {
        self.manager.apply(root_id, mutations)
    }

    pub fn node(&mut self, root_id: RootId, node_id: NodeId) -> Option<NodeRef> {
        self.manager.view_manager(root_id).borrow().node(node_id)
    }

    /// Native handle bound to a node, if it is attached.
    pub fn handle_of(&mut self, root_id: RootId, node_id: NodeId) -> Option<HandleId> {
        self.node(root_id, node_id)?.borrow().handle()
    }

    pub fn registry_len(&self) -> usize {
        self.manager.context().registry().node_count()
    }

    /// Drives a generic node event through the surface callback, as the
    /// platform event pump would.
    pub fn emit_node_event(&self, handle: HandleId, name: &str, payload: AttrValue) {
        self.surface
            .borrow()
            .emit_event(NativeEvent::node(handle, name, payload));
    }

    /// Drives a raw touch event through the surface callback.
    pub fn emit_touch_event(&self, handle: HandleId, name: &str, payload: AttrValue) {
        self.surface
            .borrow()
            .emit_event(NativeEvent::touch(handle, name, payload));
    }

    pub fn surface_ops(&self) -> Vec<SurfaceOp> {
        self.surface.borrow().ops().to_vec()
    }

    pub fn take_surface_ops(&self) -> Vec<SurfaceOp> {
        self.surface.borrow_mut().take_ops()
    }
}

impl Default for BridgeHarness {
    fn default() -> Self {
        Self::new()
    }
}
