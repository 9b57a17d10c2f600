//! Per-kind view capabilities.
//!
//! Instead of one type per UI element, each node carries a [`ViewKind`]:
//! a data-described capability record selected at construction time. The
//! record owns the view factory, the optional per-kind style hook, and
//! the set of event names instances of the kind may subscribe to.

use std::cell::RefCell;
use std::rc::Rc;

use crate::collections::map::{HashMap, HashSet};
use crate::style::AttrValue;
use crate::surface::{HandleId, SurfaceError, ViewSurface};

/// Gesture-class events every plain view understands.
pub const GESTURE_EVENTS: &[&str] = &[
    "click",
    "longclick",
    "pressin",
    "pressout",
    "touchstart",
    "touchmove",
    "touchend",
    "touchcancel",
];

/// Factory producing the native view backing a node of this kind.
pub type CreateViewFn = Rc<dyn Fn(&mut dyn ViewSurface, &str) -> Result<HandleId, SurfaceError>>;

/// Per-kind interception of a single attribute write.
pub type ApplyStyleFn = Rc<dyn Fn(&mut dyn ViewSurface, HandleId, &str, &AttrValue)>;

/// Capability record for one view kind.
pub struct ViewKind {
    name: String,
    supported_events: HashSet<String>,
    create_view: Option<CreateViewFn>,
    apply_style: Option<ApplyStyleFn>,
}

impl ViewKind {
    /// A kind with the default factory (ask the surface for a view of
    /// this kind's name) and the standard gesture event set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supported_events: GESTURE_EVENTS.iter().map(|name| (*name).to_owned()).collect(),
            create_view: None,
            apply_style: None,
        }
    }

    /// Replaces the supported event set.
    pub fn with_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_factory(mut self, factory: CreateViewFn) -> Self {
        self.create_view = Some(factory);
        self
    }

    pub fn with_style_hook(mut self, hook: ApplyStyleFn) -> Self {
        self.apply_style = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports_event(&self, name: &str) -> bool {
        self.supported_events.contains(name)
    }

    pub(crate) fn create_view(
        &self,
        surface: &mut dyn ViewSurface,
    ) -> Result<HandleId, SurfaceError> {
        match &self.create_view {
            Some(factory) => factory(surface, &self.name),
            None => surface.create_handle(&self.name),
        }
    }

    pub(crate) fn apply_style(
        &self,
        surface: &mut dyn ViewSurface,
        handle: HandleId,
        key: &str,
        value: &AttrValue,
    ) {
        match &self.apply_style {
            Some(hook) => hook(surface, handle, key, value),
            None => surface.set_attribute(handle, key, value),
        }
    }
}

/// Kind table for one render instance. Ships with a generic `"View"`
/// kind; embedders register the rest.
pub struct KindRegistry {
    kinds: RefCell<HashMap<String, Rc<ViewKind>>>,
}

impl KindRegistry {
    pub fn with_defaults() -> Self {
        let registry = Self {
            kinds: RefCell::new(HashMap::new()),
        };
        registry.register(ViewKind::new("View"));
        registry
    }

    /// Registers a kind. A duplicate name keeps the first registration.
    pub fn register(&self, kind: ViewKind) {
        let mut kinds = self.kinds.borrow_mut();
        let name = kind.name().to_owned();
        if kinds.contains_key(&name) {
            log::warn!("view kind {name:?} already registered; keeping existing entry");
            return;
        }
        kinds.insert(name, Rc::new(kind));
    }

    pub fn resolve(&self, name: &str) -> Option<Rc<ViewKind>> {
        self.kinds.borrow().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.kinds.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.borrow().is_empty()
    }
}
