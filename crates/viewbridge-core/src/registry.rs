//! Handle-keyed dispatch table for native events.
//!
//! The registry is the single chokepoint between the surface's
//! handle-addressed callback stream and the logical tree. It does two
//! things only: bookkeeping of (handle → node) and (handle → touch
//! handler) entries, and forwarding one event at a time. Problems are
//! logged and absorbed here; nothing at this boundary is allowed to
//! escape into the native event pump.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::collections::map::HashMap;
use crate::event::{NativeEvent, NativeEventKind, TouchHandler};
use crate::node::LogicalNode;
use crate::surface::HandleId;

#[derive(Default)]
pub struct HandleRegistry {
    nodes: RefCell<HashMap<HandleId, Weak<RefCell<LogicalNode>>>>,
    touch_handlers: RefCell<HashMap<HandleId, Rc<dyn TouchHandler>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a (handle → node) entry. A handle that is already mapped
    /// keeps its existing entry.
    pub fn register_node(&self, handle: HandleId, node: Weak<RefCell<LogicalNode>>) {
        let mut nodes = self.nodes.borrow_mut();
        if nodes.contains_key(&handle) {
            log::warn!("node for handle {handle} was already registered");
            return;
        }
        nodes.insert(handle, node);
    }

    pub fn unregister_node(&self, handle: HandleId) {
        if self.nodes.borrow_mut().remove(&handle).is_none() {
            log::warn!("node for handle {handle} not found");
        }
    }

    pub fn register_touch_handler(&self, handle: HandleId, handler: Rc<dyn TouchHandler>) {
        log::debug!("register touch handler for handle {handle}");
        let mut handlers = self.touch_handlers.borrow_mut();
        if handlers.contains_key(&handle) {
            log::warn!("touch handler for handle {handle} was already registered");
            return;
        }
        handlers.insert(handle, handler);
    }

    pub fn unregister_touch_handler(&self, handle: HandleId) {
        log::debug!("unregister touch handler for handle {handle}");
        if self.touch_handlers.borrow_mut().remove(&handle).is_none() {
            log::warn!("touch handler for handle {handle} not found");
        }
    }

    /// Number of currently registered nodes. Equals the number of
    /// attached logical nodes at any quiescent point.
    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Sole entry point for the surface's event callback.
    ///
    /// Touch events route through the touch-handler map, everything else
    /// through the node map. Unknown handles are logged and dropped. A
    /// panic raised by a handler is caught and logged; the event pump
    /// never sees it.
    pub fn dispatch(&self, event: &NativeEvent) {
        if event.kind == NativeEventKind::Touch {
            // Clone the target out before forwarding so handlers may
            // re-enter the registry.
            let handler = self.touch_handlers.borrow().get(&event.handle).cloned();
            let Some(handler) = handler else {
                log::warn!("touch event for handle {} not found", event.handle);
                return;
            };
            let payload = &event.payload;
            if catch_unwind(AssertUnwindSafe(|| handler.on_touch_event(payload))).is_err() {
                log::error!(
                    "touch handler for handle {} panicked; event {:?} suppressed",
                    event.handle,
                    event.name
                );
            }
            return;
        }

        let node = self.nodes.borrow().get(&event.handle).cloned();
        let Some(node) = node else {
            log::warn!("node for handle {} not found", event.handle);
            return;
        };
        let Some(node) = node.upgrade() else {
            // The owning node died without unregistering. Drop the stale
            // entry so the handle cannot be reached again.
            log::warn!("node for handle {} is gone; pruning stale entry", event.handle);
            self.nodes.borrow_mut().remove(&event.handle);
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| node.borrow_mut().on_node_event(event))).is_err() {
            log::error!(
                "event handler for handle {} panicked; event {:?} suppressed",
                event.handle,
                event.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BridgeContext;
    use crate::event::NullSink;
    use crate::node::RenderInfo;
    use crate::style::AttrValue;
    use crate::surface::MemorySurface;

    fn context() -> Rc<BridgeContext> {
        BridgeContext::new(
            1,
            Rc::new(RefCell::new(MemorySurface::new())),
            Rc::new(NullSink),
        )
    }

    fn node(ctx: &Rc<BridgeContext>, id: u32) -> Rc<RefCell<LogicalNode>> {
        let kind = ctx.kinds().resolve("View").unwrap();
        LogicalNode::new(RenderInfo::new(id, 0, 0), kind, ctx)
    }

    struct CountingHandler(RefCell<usize>);

    impl TouchHandler for CountingHandler {
        fn on_touch_event(&self, _payload: &AttrValue) {
            *self.0.borrow_mut() += 1;
        }
    }

    struct PanickingHandler;

    impl TouchHandler for PanickingHandler {
        fn on_touch_event(&self, _payload: &AttrValue) {
            panic!("boom");
        }
    }

    #[test]
    fn duplicate_registration_keeps_first_entry() {
        let ctx = context();
        let first = node(&ctx, 1);
        let second = node(&ctx, 2);
        let handle = HandleId::from_raw(7);

        let registry = HandleRegistry::new();
        registry.register_node(handle, Rc::downgrade(&first));
        registry.register_node(handle, Rc::downgrade(&second));
        assert_eq!(registry.node_count(), 1);

        registry.unregister_node(handle);
        assert!(registry.is_empty());
        // A second unregister is a logged miss, not an error.
        registry.unregister_node(handle);
    }

    #[test]
    fn touch_events_route_to_the_touch_handler() {
        let registry = HandleRegistry::new();
        let handle = HandleId::from_raw(3);
        let handler = Rc::new(CountingHandler(RefCell::new(0)));
        registry.register_touch_handler(handle, handler.clone());

        registry.dispatch(&NativeEvent::touch(handle, "touchstart", AttrValue::Null));
        assert_eq!(*handler.0.borrow(), 1);

        // A node event for the same handle does not reach the handler.
        registry.dispatch(&NativeEvent::node(handle, "click", AttrValue::Null));
        assert_eq!(*handler.0.borrow(), 1);
    }

    #[test]
    fn unknown_handles_are_dropped() {
        let registry = HandleRegistry::new();
        registry.dispatch(&NativeEvent::node(
            HandleId::from_raw(99),
            "click",
            AttrValue::Null,
        ));
        registry.dispatch(&NativeEvent::touch(
            HandleId::from_raw(99),
            "touchstart",
            AttrValue::Null,
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn dead_node_entries_are_pruned_on_dispatch() {
        let ctx = context();
        let handle = HandleId::from_raw(5);
        let registry = HandleRegistry::new();
        {
            let doomed = node(&ctx, 1);
            registry.register_node(handle, Rc::downgrade(&doomed));
        }
        assert_eq!(registry.node_count(), 1);

        registry.dispatch(&NativeEvent::node(handle, "click", AttrValue::Null));
        assert!(registry.is_empty());
    }

    #[test]
    fn handler_panics_are_contained() {
        let registry = HandleRegistry::new();
        let handle = HandleId::from_raw(11);
        registry.register_touch_handler(handle, Rc::new(PanickingHandler));

        registry.dispatch(&NativeEvent::touch(handle, "touchstart", AttrValue::Null));
        // Still usable afterwards.
        registry.unregister_touch_handler(handle);
    }
}
