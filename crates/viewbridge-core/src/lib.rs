//! Bridge between a diff-driven logical node tree and a platform-native
//! view tree.
//!
//! The diff engine hands this crate per-root create/update/delete/move
//! operations; the crate materializes them as native view handles
//! through a [`ViewSurface`] and routes the surface's event stream back
//! to the owning logical nodes. Everything runs on the one thread that
//! owns the surface: the shared structures are `Rc`/`RefCell` based and
//! deliberately `!Send`.
//!
//! The layering, bottom up: [`HandleRegistry`] converts handle-addressed
//! native events into node-addressed dispatch; [`LogicalNode`] owns the
//! attach/detach/recycle lifecycle and child reconciliation for one
//! virtual-tree entry; [`ViewManager`] and [`VirtualViewManager`] own
//! the nodes of one root; [`RenderManager`] owns the per-root managers
//! of one hosted render instance.

pub mod collections;
mod context;
mod event;
mod kind;
mod node;
mod ops;
mod registry;
mod render_manager;
mod style;
mod surface;
mod view_manager;

/// Virtual-tree node id assigned by the diff engine.
pub type NodeId = u32;

/// Id of one independently rendered surface/screen.
pub type RootId = u32;

pub use context::BridgeContext;
pub use event::{EventCallback, EventSink, NativeEvent, NativeEventKind, NullSink, TouchHandler};
pub use kind::{ApplyStyleFn, CreateViewFn, KindRegistry, ViewKind, GESTURE_EVENTS};
pub use node::{AttachError, LogicalNode, NodeRef, RenderInfo};
pub use ops::Mutation;
pub use registry::HandleRegistry;
pub use render_manager::RenderManager;
pub use style::{AttrValue, StyleMap};
pub use surface::{HandleId, MemorySurface, Rect, SurfaceError, SurfaceOp, ViewSurface};
pub use view_manager::{ViewManager, VirtualNode, VirtualViewManager};
