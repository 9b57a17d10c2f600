//! Logical nodes: the reconciliation unit binding one virtual-tree entry
//! to at most one native view handle.
//!
//! A node is created when the diff engine announces the entry, mounted
//! into its parent's logical child list immediately, and only then
//! attached to a native handle. Attach and detach may alternate any
//! number of times over the node's life (detach without destruction is
//! the recycling path for pooled list items); deletion always detaches
//! and unregisters first.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use thiserror::Error;

use crate::collections::map::HashSet;
use crate::context::BridgeContext;
use crate::kind::ViewKind;
use crate::style::{changed_entries, AttrValue, StyleMap};
use crate::surface::{HandleId, Rect, SurfaceError};
use crate::NodeId;

/// Shared ownership handle for a logical node.
pub type NodeRef = Rc<RefCell<LogicalNode>>;

type LayoutListener = Box<dyn Fn(Rect)>;

/// Creation record handed over by the diff engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderInfo {
    pub node_id: NodeId,
    pub parent_id: NodeId,
    pub index: i32,
}

impl RenderInfo {
    pub const fn new(node_id: NodeId, parent_id: NodeId, index: i32) -> Self {
        Self {
            node_id,
            parent_id,
            index,
        }
    }
}

/// The one node operation allowed to fail outward: a subtree that cannot
/// materialize a native handle cannot render, and its caller must know.
#[derive(Debug, Error)]
pub enum AttachError {
    #[error("no view kind registered for {kind:?}")]
    UnknownKind { kind: String },
    #[error("render instance for node {node_id} is gone")]
    InstanceGone { node_id: NodeId },
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

pub struct LogicalNode {
    info: RenderInfo,
    kind: Rc<ViewKind>,
    ctx: Weak<BridgeContext>,
    self_ref: Weak<RefCell<LogicalNode>>,
    parent: Weak<RefCell<LogicalNode>>,
    children: Vec<NodeRef>,
    handle: Option<HandleId>,
    is_attached: bool,
    /// The virtual-tree index is not always the native child index; this
    /// compensates when creates and deletes interleave out of order.
    /// Best effort, see `set_corrected_index`.
    corrected_index: i32,
    subscribed_events: HashSet<String>,
    /// Target style as accumulated from update deltas.
    style: StyleMap,
    /// Style actually pushed to the current handle.
    applied_style: StyleMap,
    layout_listeners: Vec<(u64, LayoutListener)>,
    next_listener_id: u64,
    frame: Option<Rect>,
}

impl LogicalNode {
    pub fn new(info: RenderInfo, kind: Rc<ViewKind>, ctx: &Rc<BridgeContext>) -> NodeRef {
        let node = Rc::new(RefCell::new(Self {
            corrected_index: info.index,
            info,
            kind,
            ctx: Rc::downgrade(ctx),
            self_ref: Weak::new(),
            parent: Weak::new(),
            children: Vec::new(),
            handle: None,
            is_attached: false,
            subscribed_events: HashSet::new(),
            style: StyleMap::new(),
            applied_style: StyleMap::new(),
            layout_listeners: Vec::new(),
            next_listener_id: 0,
            frame: None,
        }));
        node.borrow_mut().self_ref = Rc::downgrade(&node);
        node
    }

    /// Mounts a freshly created node in its parent's logical child list.
    /// Logical mounting precedes native attachment; the native mirror
    /// happens later, inside [`attach`](Self::attach).
    pub fn on_create(this: &NodeRef, parent: Option<&NodeRef>) {
        if let Some(parent) = parent {
            let index = this.borrow().info.index;
            parent.borrow_mut().add_child_at(this, index);
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.info.node_id
    }

    pub fn parent_id(&self) -> NodeId {
        self.info.parent_id
    }

    pub fn render_info(&self) -> &RenderInfo {
        &self.info
    }

    pub fn kind(&self) -> &Rc<ViewKind> {
        &self.kind
    }

    pub fn is_attached(&self) -> bool {
        self.is_attached
    }

    /// Raw handle accessor without the attachment contract check.
    pub fn handle(&self) -> Option<HandleId> {
        self.handle
    }

    /// The bound native handle. Calling this on an unattached node is a
    /// contract violation: asserted in debug builds, `None` in release.
    pub fn view(&self) -> Option<HandleId> {
        if !self.is_attached {
            debug_assert!(false, "view() on unattached node {}", self.info.node_id);
            log::warn!("view() on unattached node {}", self.info.node_id);
            return None;
        }
        self.handle
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.upgrade()
    }

    pub fn corrected_index(&self) -> i32 {
        self.corrected_index
    }

    /// Overrides the native insertion index. The manager sets this when
    /// the creation index no longer matches reality because a sibling
    /// delete has not been processed yet. The compensation is best
    /// effort: with creates racing deletes the two trees can stay
    /// briefly out of step, which is bounded, known, and not a fault.
    pub fn set_corrected_index(&mut self, index: i32) {
        self.corrected_index = index;
    }

    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscribed_events.contains(name)
    }

    fn context(&self) -> Option<Rc<BridgeContext>> {
        let ctx = self.ctx.upgrade();
        if ctx.is_none() {
            log::warn!("node {} outlived its render instance", self.info.node_id);
        }
        ctx
    }

    /// Handle of the native parent this node is (or would be) mounted
    /// under, if that parent is currently attached.
    fn attached_parent_handle(&self) -> Option<HandleId> {
        let parent = self.parent.upgrade()?;
        let parent = parent.borrow();
        if parent.is_attached {
            parent.handle
        } else {
            None
        }
    }

    /// Binds the node to a native handle.
    ///
    /// With `existing` supplied the node adopts that pre-existing handle
    /// (the reuse path for pooled list items). Otherwise a handle kept
    /// from an earlier `detach(false)` is re-bound, and only a node with
    /// no handle at all mints a new one through its kind's factory.
    ///
    /// On success the node is registered for event dispatch, pending
    /// style and layout state are replayed onto the handle, and the
    /// handle is mounted under the native parent at the corrected index.
    ///
    /// Attaching an already-attached node is a contract violation:
    /// asserted in debug builds, a logged no-op in release.
    pub fn attach(&mut self, existing: Option<HandleId>) -> Result<(), AttachError> {
        if self.is_attached {
            debug_assert!(false, "attach on already-attached node {}", self.info.node_id);
            log::warn!("attach on already-attached node {}", self.info.node_id);
            return Ok(());
        }
        let ctx = self.ctx.upgrade().ok_or(AttachError::InstanceGone {
            node_id: self.info.node_id,
        })?;

        let handle = match existing.or(self.handle) {
            Some(handle) => handle,
            None => self.kind.create_view(&mut *ctx.surface().borrow_mut())?,
        };
        self.handle = Some(handle);
        self.is_attached = true;
        ctx.registry().register_node(handle, self.self_ref.clone());

        self.flush_style(&ctx, handle);
        if let Some(frame) = self.frame {
            ctx.surface().borrow_mut().set_frame(handle, frame);
        }

        if let Some(parent_handle) = self.attached_parent_handle() {
            let index = self.corrected_index.max(0) as usize;
            ctx.surface()
                .borrow_mut()
                .add_child_handle(parent_handle, handle, index);
        }
        Ok(())
    }

    /// Unbinds the node (and its subtree) from the native tree.
    ///
    /// With `sync_to_native_tree` the handle is removed from its native
    /// parent and destroyed: genuine removal. Without it the handle is
    /// un-parented but kept alive for the next [`attach`](Self::attach),
    /// the pooling path for recyclable list and grid items.
    pub fn detach(&mut self, sync_to_native_tree: bool) {
        let parent_handle = self.attached_parent_handle();
        self.detach_with_parent(sync_to_native_tree, parent_handle);
    }

    fn detach_with_parent(&mut self, sync_to_native_tree: bool, parent_handle: Option<HandleId>) {
        if !self.is_attached {
            log::debug!("detach on unattached node {}", self.info.node_id);
            return;
        }
        let my_handle = self.handle;
        for child in &self.children {
            child
                .borrow_mut()
                .detach_with_parent(sync_to_native_tree, my_handle);
        }

        self.is_attached = false;
        let Some(ctx) = self.context() else {
            if sync_to_native_tree {
                self.handle = None;
                self.applied_style.clear();
            }
            return;
        };
        let Some(handle) = my_handle else {
            return;
        };
        ctx.registry().unregister_node(handle);

        let mut surface = ctx.surface().borrow_mut();
        if let Some(parent_handle) = parent_handle {
            surface.remove_child_handle(parent_handle, handle);
        }
        if sync_to_native_tree {
            surface.destroy_handle(handle);
            drop(surface);
            self.handle = None;
            self.applied_style.clear();
        }
    }

    /// Merges a style delta and pushes only the changed attributes to
    /// the native handle. Re-applying an identical delta is a no-op.
    pub fn on_update(&mut self, delta: &StyleMap) {
        for (key, value) in delta {
            self.style.insert(key.clone(), value.clone());
        }
        if self.is_attached {
            if let (Some(handle), Some(ctx)) = (self.handle, self.context()) {
                self.flush_style(&ctx, handle);
            }
        }
    }

    fn flush_style(&mut self, ctx: &Rc<BridgeContext>, handle: HandleId) {
        let changed: Vec<(String, AttrValue)> = changed_entries(&self.applied_style, &self.style)
            .into_iter()
            .map(|(key, value)| (key.to_owned(), value.clone()))
            .collect();
        if changed.is_empty() {
            return;
        }
        {
            let mut surface = ctx.surface().borrow_mut();
            for (key, value) in &changed {
                self.kind.apply_style(&mut *surface, handle, key, value);
            }
        }
        for (key, value) in changed {
            self.applied_style.insert(key, value);
        }
    }

    /// Tears the node down: cascades deletion through the children,
    /// detaches with full native teardown, and unlinks from the parent.
    pub fn on_delete(&mut self) {
        let children = std::mem::take(&mut self.children);
        for child in &children {
            // Sever the back-reference first so the child does not reach
            // back into this (currently borrowed) node.
            child.borrow_mut().parent = Weak::new();
            child.borrow_mut().on_delete();
        }
        if self.is_attached {
            self.detach(true);
        }
        if let Some(parent) = self.parent.upgrade() {
            parent.borrow_mut().remove_child_entry(self.info.node_id);
        }
        self.parent = Weak::new();
    }

    /// Inserts `child` into the logical child list at `index` (clamped)
    /// and, when both ends are attached, mirrors the insertion into the
    /// native tree at the child's corrected index.
    pub fn add_child_at(&mut self, child: &NodeRef, index: i32) {
        let index = (index.max(0) as usize).min(self.children.len());
        child.borrow_mut().parent = self.self_ref.clone();
        self.children.insert(index, child.clone());

        if !self.is_attached {
            return;
        }
        let (Some(parent_handle), Some(ctx)) = (self.handle, self.context()) else {
            return;
        };
        let child_ref = child.borrow();
        if !child_ref.is_attached {
            return;
        }
        if let Some(child_handle) = child_ref.handle {
            let native_index = child_ref.corrected_index.max(0) as usize;
            ctx.surface()
                .borrow_mut()
                .add_child_handle(parent_handle, child_handle, native_index);
        }
    }

    /// Removes `child` from the logical child list by identity and
    /// mirrors the removal natively when both ends are attached.
    pub fn remove_child(&mut self, child: &NodeRef) -> bool {
        let child_id = child.borrow().info.node_id;
        let Some(removed) = self.remove_child_entry(child_id) else {
            log::warn!(
                "node {} is not a child of node {}",
                child_id,
                self.info.node_id
            );
            return false;
        };
        self.unmirror_child(&removed);
        removed.borrow_mut().parent = Weak::new();
        true
    }

    /// Removes the child at a logical index. Prefer [`remove_child`]:
    /// when creates and deletes interleave out of order the logical
    /// index may no longer match the child it was issued against, so
    /// removal by identity is the reliable form.
    ///
    /// [`remove_child`]: Self::remove_child
    pub fn remove_child_at(&mut self, index: i32) -> Option<NodeRef> {
        if index < 0 || index as usize >= self.children.len() {
            log::warn!(
                "remove_child_at({index}) out of bounds on node {}",
                self.info.node_id
            );
            return None;
        }
        let removed = self.children.remove(index as usize);
        self.unmirror_child(&removed);
        removed.borrow_mut().parent = Weak::new();
        Some(removed)
    }

    /// Logical-list removal only; native mirroring is the caller's
    /// business (deletion handles it through detach).
    fn remove_child_entry(&mut self, child_id: NodeId) -> Option<NodeRef> {
        let position = self
            .children
            .iter()
            .position(|entry| entry.borrow().info.node_id == child_id)?;
        Some(self.children.remove(position))
    }

    fn unmirror_child(&self, child: &NodeRef) {
        if !self.is_attached {
            return;
        }
        let (Some(parent_handle), Some(ctx)) = (self.handle, self.ctx.upgrade()) else {
            return;
        };
        let child_ref = child.borrow();
        if !child_ref.is_attached {
            return;
        }
        if let Some(child_handle) = child_ref.handle {
            ctx.surface()
                .borrow_mut()
                .remove_child_handle(parent_handle, child_handle);
        }
    }

    /// Subscribes the node to a named native event. Unsupported names
    /// and repeated subscriptions are no-ops.
    pub fn on_add_event_listener(&mut self, listener_id: u64, name: &str) {
        if !self.kind.supports_event(name) {
            log::debug!(
                "listener {listener_id}: kind {:?} does not support event {name:?}",
                self.kind.name()
            );
            return;
        }
        if !self.subscribed_events.insert(name.to_owned()) {
            log::debug!("listener {listener_id}: {name:?} already subscribed");
        }
    }

    pub fn on_remove_event_listener(&mut self, listener_id: u64, name: &str) {
        if !self.subscribed_events.remove(name) {
            log::debug!("listener {listener_id}: {name:?} was not subscribed");
        }
    }

    /// Generic event entry invoked by the registry. Subscribed events
    /// are translated into logical gesture events; everything else is
    /// dropped quietly.
    pub fn on_node_event(&mut self, event: &crate::event::NativeEvent) {
        if !self.subscribed_events.contains(&event.name) {
            log::debug!(
                "node {} has no subscription for {:?}",
                self.info.node_id,
                event.name
            );
            return;
        }
        self.send_gesture_event(&event.name, &event.payload);
    }

    /// Emits a logical gesture event (capture and bubble enabled).
    pub fn send_gesture_event(&self, name: &str, payload: &AttrValue) {
        self.send_ui_event(name, payload, true, true);
    }

    pub fn send_ui_event(&self, name: &str, payload: &AttrValue, can_capture: bool, can_bubble: bool) {
        if let Some(ctx) = self.context() {
            ctx.sink()
                .emit(self.info.node_id, name, payload, can_capture, can_bubble);
        }
    }

    /// Applies a computed layout rectangle to the native handle and
    /// fires the layout-update listeners in registration order.
    pub fn handle_layout_update(&mut self, frame: Rect) {
        self.frame = Some(frame);
        if self.is_attached {
            if let (Some(handle), Some(ctx)) = (self.handle, self.context()) {
                ctx.surface().borrow_mut().set_frame(handle, frame);
            }
        }
        for (_, listener) in &self.layout_listeners {
            listener(frame);
        }
    }

    /// Registers a layout-update listener; the returned id removes it.
    pub fn add_layout_update_listener(&mut self, listener: impl Fn(Rect) + 'static) -> u64 {
        self.next_listener_id += 1;
        let id = self.next_listener_id;
        self.layout_listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_layout_update_listener(&mut self, id: u64) -> bool {
        let before = self.layout_listeners.len();
        self.layout_listeners.retain(|(entry, _)| *entry != id);
        self.layout_listeners.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSink;
    use crate::surface::{MemorySurface, SurfaceOp};

    #[derive(Default)]
    struct RecordingSink {
        events: RefCell<Vec<(NodeId, String, bool, bool)>>,
    }

    impl EventSink for RecordingSink {
        fn emit(
            &self,
            node_id: NodeId,
            name: &str,
            _payload: &AttrValue,
            can_capture: bool,
            can_bubble: bool,
        ) {
            self.events
                .borrow_mut()
                .push((node_id, name.to_owned(), can_capture, can_bubble));
        }
    }

    struct Fixture {
        surface: Rc<RefCell<MemorySurface>>,
        sink: Rc<RecordingSink>,
        ctx: Rc<BridgeContext>,
    }

    fn fixture() -> Fixture {
        let surface = Rc::new(RefCell::new(MemorySurface::new()));
        let sink = Rc::new(RecordingSink::default());
        let ctx = BridgeContext::new(1, surface.clone(), sink.clone());
        Fixture { surface, sink, ctx }
    }

    fn make_node(fixture: &Fixture, id: NodeId, parent_id: NodeId, index: i32) -> NodeRef {
        let kind = fixture.ctx.kinds().resolve("View").unwrap();
        LogicalNode::new(RenderInfo::new(id, parent_id, index), kind, &fixture.ctx)
    }

    fn set_attribute_count(surface: &Rc<RefCell<MemorySurface>>) -> usize {
        surface
            .borrow()
            .ops()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::SetAttribute { .. }))
            .count()
    }

    #[test]
    fn attach_registers_and_get_view_round_trips() {
        let fx = fixture();
        let node = make_node(&fx, 1, 0, 0);
        node.borrow_mut().attach(None).unwrap();

        let handle = node.borrow().view().unwrap();
        assert!(fx.surface.borrow().is_alive(handle));
        assert_eq!(fx.ctx.registry().node_count(), 1);
    }

    #[test]
    fn detach_with_sync_destroys_the_handle() {
        let fx = fixture();
        let node = make_node(&fx, 1, 0, 0);
        node.borrow_mut().attach(None).unwrap();
        let handle = node.borrow().handle().unwrap();

        node.borrow_mut().detach(true);
        assert!(!fx.surface.borrow().is_alive(handle));
        assert!(fx.ctx.registry().is_empty());
        assert_eq!(node.borrow().handle(), None);
    }

    #[test]
    fn pooled_detach_preserves_handle_identity() {
        let fx = fixture();
        let node = make_node(&fx, 1, 0, 0);
        node.borrow_mut().attach(None).unwrap();
        let before = node.borrow().handle().unwrap();

        node.borrow_mut().detach(false);
        assert!(!node.borrow().is_attached());
        assert!(fx.surface.borrow().is_alive(before));

        node.borrow_mut().attach(None).unwrap();
        assert_eq!(node.borrow().handle(), Some(before));
        // No second create op was issued.
        let creates = fx
            .surface
            .borrow()
            .ops()
            .iter()
            .filter(|op| matches!(op, SurfaceOp::Create { .. }))
            .count();
        assert_eq!(creates, 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "already-attached")]
    fn double_attach_asserts_in_debug() {
        let fx = fixture();
        let node = make_node(&fx, 1, 0, 0);
        node.borrow_mut().attach(None).unwrap();
        let _ = node.borrow_mut().attach(None);
    }

    #[test]
    fn identical_style_delta_is_applied_once() {
        let fx = fixture();
        let node = make_node(&fx, 1, 0, 0);
        node.borrow_mut().attach(None).unwrap();

        let delta: StyleMap = [("opacity".to_owned(), AttrValue::Float(0.5))]
            .into_iter()
            .collect();
        node.borrow_mut().on_update(&delta);
        let after_first = set_attribute_count(&fx.surface);
        assert_eq!(after_first, 1);

        node.borrow_mut().on_update(&delta);
        assert_eq!(set_attribute_count(&fx.surface), after_first);
    }

    #[test]
    fn pending_style_is_replayed_on_attach() {
        let fx = fixture();
        let node = make_node(&fx, 1, 0, 0);
        let delta: StyleMap = [("opacity".to_owned(), AttrValue::Float(0.5))]
            .into_iter()
            .collect();
        node.borrow_mut().on_update(&delta);
        assert_eq!(set_attribute_count(&fx.surface), 0);

        node.borrow_mut().attach(None).unwrap();
        assert_eq!(set_attribute_count(&fx.surface), 1);
    }

    #[test]
    fn child_mirroring_uses_the_corrected_index() {
        let fx = fixture();
        let parent = make_node(&fx, 1, 0, 0);
        parent.borrow_mut().attach(None).unwrap();
        let first = make_node(&fx, 2, 1, 0);
        LogicalNode::on_create(&first, Some(&parent));
        first.borrow_mut().attach(None).unwrap();

        // A sibling created at a stale index gets corrected to the end.
        let second = make_node(&fx, 3, 1, 5);
        second.borrow_mut().set_corrected_index(1);
        LogicalNode::on_create(&second, Some(&parent));
        second.borrow_mut().attach(None).unwrap();

        let parent_handle = parent.borrow().handle().unwrap();
        let surface = fx.surface.borrow();
        assert_eq!(
            surface.children_of(parent_handle),
            &[
                first.borrow().handle().unwrap(),
                second.borrow().handle().unwrap()
            ]
        );
    }

    #[test]
    fn cascading_delete_empties_the_registry() {
        let fx = fixture();
        let parent = make_node(&fx, 1, 0, 0);
        parent.borrow_mut().attach(None).unwrap();
        let child = make_node(&fx, 2, 1, 0);
        LogicalNode::on_create(&child, Some(&parent));
        child.borrow_mut().attach(None).unwrap();
        assert_eq!(fx.ctx.registry().node_count(), 2);

        parent.borrow_mut().on_delete();
        assert!(fx.ctx.registry().is_empty());
        assert_eq!(fx.surface.borrow().live_handles(), 0);
        assert_eq!(parent.borrow().child_count(), 0);
    }

    #[test]
    fn subscribed_events_reach_the_sink() {
        let fx = fixture();
        let node = make_node(&fx, 7, 0, 0);
        node.borrow_mut().attach(None).unwrap();
        node.borrow_mut().on_add_event_listener(1, "click");
        // Unsupported names never subscribe.
        node.borrow_mut().on_add_event_listener(2, "teleport");
        assert!(!node.borrow().is_subscribed("teleport"));

        let handle = node.borrow().handle().unwrap();
        fx.surface.borrow().emit_event(crate::event::NativeEvent::node(
            handle,
            "click",
            AttrValue::Null,
        ));
        let events = fx.sink.events.borrow();
        assert_eq!(events.as_slice(), &[(7, "click".to_owned(), true, true)]);
    }

    #[test]
    fn unsubscribed_events_are_dropped() {
        let fx = fixture();
        let node = make_node(&fx, 7, 0, 0);
        node.borrow_mut().attach(None).unwrap();
        node.borrow_mut().on_add_event_listener(1, "click");
        node.borrow_mut().on_remove_event_listener(1, "click");

        let handle = node.borrow().handle().unwrap();
        fx.surface.borrow().emit_event(crate::event::NativeEvent::node(
            handle,
            "click",
            AttrValue::Null,
        ));
        assert!(fx.sink.events.borrow().is_empty());
    }

    #[test]
    fn layout_updates_fire_listeners_and_set_frame() {
        let fx = fixture();
        let node = make_node(&fx, 1, 0, 0);
        node.borrow_mut().attach(None).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let id = node
            .borrow_mut()
            .add_layout_update_listener(move |frame| sink.borrow_mut().push(frame));

        let frame = Rect::new(0.0, 0.0, 100.0, 50.0);
        node.borrow_mut().handle_layout_update(frame);
        assert_eq!(seen.borrow().as_slice(), &[frame]);
        assert!(fx
            .surface
            .borrow()
            .ops()
            .iter()
            .any(|op| matches!(op, SurfaceOp::SetFrame { .. })));

        assert!(node.borrow_mut().remove_layout_update_listener(id));
        node.borrow_mut().handle_layout_update(frame);
        assert_eq!(seen.borrow().len(), 1);
    }
}
