//! Per-instance wiring shared by every component of one bridge.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::{EventCallback, EventSink};
use crate::kind::KindRegistry;
use crate::registry::HandleRegistry;
use crate::surface::ViewSurface;

/// The explicit context one render instance threads through its managers
/// and nodes: the surface adapter, the handle registry, the logical
/// event sink, and the kind table.
///
/// There is deliberately no process-wide instance of this; two contexts
/// coexist without sharing state. Everything inside is `Rc`/`RefCell`
/// based and therefore `!Send`: the whole bridge is pinned to the
/// thread that constructed it.
pub struct BridgeContext {
    instance_id: u32,
    surface: Rc<RefCell<dyn ViewSurface>>,
    registry: HandleRegistry,
    sink: Rc<dyn EventSink>,
    kinds: KindRegistry,
}

impl BridgeContext {
    /// Builds the context and installs the registry as the surface's
    /// event callback.
    pub fn new(
        instance_id: u32,
        surface: Rc<RefCell<dyn ViewSurface>>,
        sink: Rc<dyn EventSink>,
    ) -> Rc<Self> {
        let ctx = Rc::new(Self {
            instance_id,
            surface,
            registry: HandleRegistry::new(),
            sink,
            kinds: KindRegistry::with_defaults(),
        });
        let weak = Rc::downgrade(&ctx);
        let callback: EventCallback = Rc::new(move |event| match weak.upgrade() {
            Some(ctx) => ctx.registry.dispatch(&event),
            None => log::warn!(
                "native event for handle {} arrived after the bridge shut down",
                event.handle
            ),
        });
        ctx.surface.borrow_mut().set_event_callback(callback);
        ctx
    }

    pub fn instance_id(&self) -> u32 {
        self.instance_id
    }

    pub fn surface(&self) -> &Rc<RefCell<dyn ViewSurface>> {
        &self.surface
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn sink(&self) -> &Rc<dyn EventSink> {
        &self.sink
    }

    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }
}
