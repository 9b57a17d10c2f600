//! Native event payloads and the sinks they are translated into.

use std::rc::Rc;

use crate::style::AttrValue;
use crate::surface::HandleId;
use crate::NodeId;

/// Discriminates the two dispatch paths at the registry: raw touch
/// streams go to a dedicated handler, everything else to the owning
/// node's generic event path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeEventKind {
    Touch,
    Node,
}

/// One event as delivered by the native surface's callback.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeEvent {
    pub handle: HandleId,
    pub kind: NativeEventKind,
    /// Event name, e.g. `"click"` or `"touchstart"`.
    pub name: String,
    pub payload: AttrValue,
}

impl NativeEvent {
    pub fn node(handle: HandleId, name: impl Into<String>, payload: AttrValue) -> Self {
        Self {
            handle,
            kind: NativeEventKind::Node,
            name: name.into(),
            payload,
        }
    }

    pub fn touch(handle: HandleId, name: impl Into<String>, payload: AttrValue) -> Self {
        Self {
            handle,
            kind: NativeEventKind::Touch,
            name: name.into(),
            payload,
        }
    }
}

/// Callback installed on the surface; the sole entry path for native
/// events into the bridge.
pub type EventCallback = Rc<dyn Fn(NativeEvent)>;

/// Receiver for raw touch payloads, registered per handle independently
/// of the generic node route.
pub trait TouchHandler {
    fn on_touch_event(&self, payload: &AttrValue);
}

/// Consumer of translated logical events, e.g. the script bridge or a
/// devtools notification channel. Implementations only accept the tuple;
/// nothing flows back.
pub trait EventSink {
    fn emit(
        &self,
        node_id: NodeId,
        name: &str,
        payload: &AttrValue,
        can_capture: bool,
        can_bubble: bool,
    );
}

/// Sink that discards everything. Useful for measurement-only setups.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _: NodeId, _: &str, _: &AttrValue, _: bool, _: bool) {}
}
