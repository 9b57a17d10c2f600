//! Top-level ownership for one hosted render instance.

use std::cell::RefCell;
use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::context::BridgeContext;
use crate::event::EventSink;
use crate::node::AttachError;
use crate::ops::Mutation;
use crate::surface::ViewSurface;
use crate::view_manager::{ViewManager, VirtualViewManager};
use crate::RootId;

/// One instance per hosted UI surface. Owns the bridge context plus the
/// per-root managers, created lazily as roots are first referenced.
pub struct RenderManager {
    ctx: Rc<BridgeContext>,
    view_managers: HashMap<RootId, Rc<RefCell<ViewManager>>>,
    virtual_managers: HashMap<RootId, Rc<RefCell<VirtualViewManager>>>,
}

impl RenderManager {
    pub fn new(
        instance_id: u32,
        surface: Rc<RefCell<dyn ViewSurface>>,
        sink: Rc<dyn EventSink>,
    ) -> Self {
        Self {
            ctx: BridgeContext::new(instance_id, surface, sink),
            view_managers: HashMap::new(),
            virtual_managers: HashMap::new(),
        }
    }

    pub fn instance_id(&self) -> u32 {
        self.ctx.instance_id()
    }

    pub fn context(&self) -> &Rc<BridgeContext> {
        &self.ctx
    }

    /// The view manager for `root_id`, constructed and registered on
    /// first reference. Never fails for an unknown root.
    pub fn view_manager(&mut self, root_id: RootId) -> Rc<RefCell<ViewManager>> {
        self.view_managers
            .entry(root_id)
            .or_insert_with(|| Rc::new(RefCell::new(ViewManager::new(root_id, self.ctx.clone()))))
            .clone()
    }

    /// The virtual-node manager for `root_id`, independent of the view
    /// manager: a root is never required to have both.
    pub fn virtual_node_manager(&mut self, root_id: RootId) -> Rc<RefCell<VirtualViewManager>> {
        self.virtual_managers
            .entry(root_id)
            .or_insert_with(|| Rc::new(RefCell::new(VirtualViewManager::new(root_id))))
            .clone()
    }

    /// Applies a mutation batch against one root, in arrival order.
    ///
    /// A hard attach failure does not stop the batch (sibling subtrees
    /// still deserve their operations); the first such error is
    /// reported to the caller once the batch is done.
    pub fn apply(
        &mut self,
        root_id: RootId,
        mutations: impl IntoIterator<Item = Mutation>,
    ) -> Result<(), AttachError> {
        let manager = self.view_manager(root_id);
        let mut first_error = None;
        for mutation in mutations {
            if let Err(error) = manager.borrow_mut().apply(mutation) {
                log::error!("root {root_id}: {error}");
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            None => Ok(()),
            Some(error) => Err(error),
        }
    }

    /// Tears down a root: cascades deletion through its remaining nodes
    /// and drops both managers.
    pub fn destroy_root(&mut self, root_id: RootId) {
        if let Some(manager) = self.view_managers.remove(&root_id) {
            manager.borrow_mut().destroy_all();
        }
        self.virtual_managers.remove(&root_id);
    }

    pub fn root_count(&self) -> usize {
        self.view_managers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullSink;
    use crate::kind::ViewKind;
    use crate::surface::MemorySurface;

    fn manager() -> (Rc<RefCell<MemorySurface>>, RenderManager) {
        let surface = Rc::new(RefCell::new(MemorySurface::new()));
        let manager = RenderManager::new(1, surface.clone(), Rc::new(NullSink));
        (surface, manager)
    }

    #[test]
    fn managers_are_created_lazily_and_reused() {
        let (_surface, mut manager) = manager();
        let first = manager.view_manager(10);
        let again = manager.view_manager(10);
        assert!(Rc::ptr_eq(&first, &again));
        assert_eq!(manager.root_count(), 1);

        // Virtual managers are independent of view managers.
        let _virtual_only = manager.virtual_node_manager(20);
        assert_eq!(manager.root_count(), 1);
    }

    #[test]
    fn batch_application_continues_past_a_failed_subtree() {
        let (surface, mut manager) = manager();
        manager.context().kinds().register(ViewKind::new("Image"));
        surface.borrow_mut().fail_creates_for("Image");

        let result = manager.apply(
            10,
            [
                Mutation::create(1, 10, 0, "Image"),
                Mutation::create(2, 10, 1, "View"),
            ],
        );
        assert!(result.is_err());

        let views = manager.view_manager(10);
        let views = views.borrow();
        assert!(!views.node(1).unwrap().borrow().is_attached());
        assert!(views.node(2).unwrap().borrow().is_attached());
    }

    #[test]
    fn destroy_root_empties_registry_and_surface() {
        let (surface, mut manager) = manager();
        manager
            .apply(
                10,
                [
                    Mutation::create(1, 10, 0, "View"),
                    Mutation::create(2, 1, 0, "View"),
                ],
            )
            .unwrap();
        assert_eq!(manager.context().registry().node_count(), 2);

        manager.destroy_root(10);
        assert_eq!(manager.root_count(), 0);
        assert!(manager.context().registry().is_empty());
        assert_eq!(surface.borrow().live_handles(), 0);
    }

    #[test]
    fn instances_do_not_share_state() {
        let (_surface_a, mut a) = manager();
        let surface_b = Rc::new(RefCell::new(MemorySurface::new()));
        let mut b = RenderManager::new(2, surface_b, Rc::new(NullSink));

        a.apply(10, [Mutation::create(1, 10, 0, "View")]).unwrap();
        assert_eq!(a.context().registry().node_count(), 1);
        assert!(b.context().registry().is_empty());

        b.apply(10, [Mutation::create(1, 10, 0, "View")]).unwrap();
        assert_eq!(b.context().registry().node_count(), 1);
        a.destroy_root(10);
        assert_eq!(b.context().registry().node_count(), 1);
    }
}
