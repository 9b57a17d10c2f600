//! The native surface contract and the in-memory reference surface.
//!
//! The platform side of the bridge is reduced to a handful of handle
//! operations plus one event callback. Everything the core does to a
//! real platform view goes through [`ViewSurface`]; [`MemorySurface`]
//! implements the same contract against plain data structures and records
//! every call, which is what the tests and benches drive.

use std::fmt;

use thiserror::Error;

use crate::collections::map::{HashMap, HashSet};
use crate::event::{EventCallback, NativeEvent};
use crate::style::AttrValue;

/// Opaque identifier for one live platform view instance. Minted by the
/// surface on `create_handle` and invalid after `destroy_handle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Computed layout rectangle, in surface coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Failures reported by the native surface.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("surface could not create a view of kind {kind:?}")]
    CreateFailed { kind: String },
    #[error("surface has no live view for handle {handle}")]
    UnknownHandle { handle: HandleId },
}

/// Operations the core may perform against the platform view tree.
///
/// Implementations are expected to be cheap and synchronous; the bridge
/// calls them inline on the thread that owns the surface. The single
/// event callback installed via [`set_event_callback`] is the only path
/// by which the surface talks back.
///
/// [`set_event_callback`]: ViewSurface::set_event_callback
pub trait ViewSurface {
    fn create_handle(&mut self, kind: &str) -> Result<HandleId, SurfaceError>;

    fn destroy_handle(&mut self, handle: HandleId);

    fn set_attribute(&mut self, handle: HandleId, key: &str, value: &AttrValue);

    /// Applies a computed layout rectangle to the view.
    fn set_frame(&mut self, handle: HandleId, frame: Rect);

    /// Inserts `child` under `parent` at `index`, clamped to the current
    /// native child count.
    fn add_child_handle(&mut self, parent: HandleId, child: HandleId, index: usize);

    fn remove_child_handle(&mut self, parent: HandleId, child: HandleId);

    /// Installs the single callback through which every native event is
    /// delivered. Installing a new callback replaces the previous one.
    fn set_event_callback(&mut self, callback: EventCallback);
}

/// One recorded [`MemorySurface`] call.
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceOp {
    Create {
        handle: HandleId,
        kind: String,
    },
    Destroy {
        handle: HandleId,
    },
    SetAttribute {
        handle: HandleId,
        key: String,
        value: AttrValue,
    },
    SetFrame {
        handle: HandleId,
        frame: Rect,
    },
    AddChild {
        parent: HandleId,
        child: HandleId,
        index: usize,
    },
    RemoveChild {
        parent: HandleId,
        child: HandleId,
    },
}

/// In-memory [`ViewSurface`] that mints sequential handles, keeps the
/// native child lists, and records every mutation in call order.
#[derive(Default)]
pub struct MemorySurface {
    next_handle: u64,
    alive: HashSet<HandleId>,
    children: HashMap<HandleId, Vec<HandleId>>,
    ops: Vec<SurfaceOp>,
    failing_kinds: HashSet<String>,
    callback: Option<EventCallback>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `create_handle` for `kind` fail. Used to
    /// exercise the irrecoverable-attach path.
    pub fn fail_creates_for(&mut self, kind: impl Into<String>) {
        self.failing_kinds.insert(kind.into());
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<SurfaceOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn is_alive(&self, handle: HandleId) -> bool {
        self.alive.contains(&handle)
    }

    pub fn live_handles(&self) -> usize {
        self.alive.len()
    }

    /// Native child list of `parent`, in native order.
    pub fn children_of(&self, parent: HandleId) -> &[HandleId] {
        self.children
            .get(&parent)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Delivers a native event through the installed callback, as the
    /// platform event pump would. Events arriving before a callback is
    /// installed are dropped.
    pub fn emit_event(&self, event: NativeEvent) {
        match self.callback.clone() {
            Some(callback) => callback(event),
            None => log::warn!(
                "native event {:?} for handle {} dropped: no callback installed",
                event.kind,
                event.handle
            ),
        }
    }
}

impl ViewSurface for MemorySurface {
    fn create_handle(&mut self, kind: &str) -> Result<HandleId, SurfaceError> {
        if self.failing_kinds.contains(kind) {
            return Err(SurfaceError::CreateFailed {
                kind: kind.to_owned(),
            });
        }
        self.next_handle += 1;
        let handle = HandleId(self.next_handle);
        self.alive.insert(handle);
        self.ops.push(SurfaceOp::Create {
            handle,
            kind: kind.to_owned(),
        });
        Ok(handle)
    }

    fn destroy_handle(&mut self, handle: HandleId) {
        if !self.alive.remove(&handle) {
            log::warn!("destroy for unknown handle {handle}");
            return;
        }
        self.children.remove(&handle);
        for siblings in self.children.values_mut() {
            siblings.retain(|child| *child != handle);
        }
        self.ops.push(SurfaceOp::Destroy { handle });
    }

    fn set_attribute(&mut self, handle: HandleId, key: &str, value: &AttrValue) {
        self.ops.push(SurfaceOp::SetAttribute {
            handle,
            key: key.to_owned(),
            value: value.clone(),
        });
    }

    fn set_frame(&mut self, handle: HandleId, frame: Rect) {
        self.ops.push(SurfaceOp::SetFrame { handle, frame });
    }

    fn add_child_handle(&mut self, parent: HandleId, child: HandleId, index: usize) {
        let siblings = self.children.entry(parent).or_default();
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.ops.push(SurfaceOp::AddChild {
            parent,
            child,
            index,
        });
    }

    fn remove_child_handle(&mut self, parent: HandleId, child: HandleId) {
        if let Some(siblings) = self.children.get_mut(&parent) {
            siblings.retain(|entry| *entry != child);
        }
        self.ops.push(SurfaceOp::RemoveChild { parent, child });
    }

    fn set_event_callback(&mut self, callback: EventCallback) {
        self.callback = Some(callback);
    }
}
