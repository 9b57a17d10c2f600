//! Per-root node ownership and mutation application.
//!
//! A [`ViewManager`] owns every logical node of one root and resolves
//! diff-engine operations against them. Its virtual sibling holds
//! measurement-only records that never touch the surface or registry.

use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::context::BridgeContext;
use crate::node::{AttachError, LogicalNode, NodeRef, RenderInfo};
use crate::ops::Mutation;
use crate::style::StyleMap;
use crate::{NodeId, RootId};

pub struct ViewManager {
    root_id: RootId,
    ctx: Rc<BridgeContext>,
    nodes: HashMap<NodeId, NodeRef>,
}

impl ViewManager {
    pub(crate) fn new(root_id: RootId, ctx: Rc<BridgeContext>) -> Self {
        Self {
            root_id,
            ctx,
            nodes: HashMap::new(),
        }
    }

    pub fn root_id(&self) -> RootId {
        self.root_id
    }

    pub fn node(&self, node_id: NodeId) -> Option<NodeRef> {
        self.nodes.get(&node_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Applies one diff operation.
    ///
    /// Unknown node or parent ids are logged and dropped, per the
    /// tolerance for out-of-order arrival. The one hard failure is a
    /// create whose subtree cannot materialize a native view: the node
    /// stays mounted logically but unattached, and the error surfaces
    /// to the caller.
    pub fn apply(&mut self, mutation: Mutation) -> Result<(), AttachError> {
        match mutation {
            Mutation::Create {
                node_id,
                parent_id,
                index,
                kind,
                style,
            } => self.create(node_id, parent_id, index, kind, style),
            Mutation::Update { node_id, delta } => {
                self.update(node_id, &delta);
                Ok(())
            }
            Mutation::Delete { node_id } => {
                self.delete(node_id);
                Ok(())
            }
            Mutation::Move {
                node_id,
                new_parent_id,
                new_index,
            } => {
                self.move_node(node_id, new_parent_id, new_index);
                Ok(())
            }
        }
    }

    fn create(
        &mut self,
        node_id: NodeId,
        parent_id: NodeId,
        index: i32,
        kind_name: String,
        style: StyleMap,
    ) -> Result<(), AttachError> {
        if self.nodes.contains_key(&node_id) {
            log::warn!("node {node_id} already exists in root {}", self.root_id);
            return Ok(());
        }
        let parent = if parent_id == self.root_id {
            None
        } else {
            match self.nodes.get(&parent_id) {
                Some(parent) => Some(parent.clone()),
                None => {
                    log::warn!(
                        "create for node {node_id}: parent {parent_id} unknown in root {}; dropping",
                        self.root_id
                    );
                    return Ok(());
                }
            }
        };
        let kind = self
            .ctx
            .kinds()
            .resolve(&kind_name)
            .ok_or(AttachError::UnknownKind { kind: kind_name })?;

        let node = LogicalNode::new(RenderInfo::new(node_id, parent_id, index), kind, &self.ctx);
        if !style.is_empty() {
            node.borrow_mut().on_update(&style);
        }
        if let Some(parent) = &parent {
            // The creation index can run ahead of the native tree when a
            // sibling delete has not landed yet; clamp against what the
            // parent holds right now.
            let corrected = (index.max(0) as usize).min(parent.borrow().child_count()) as i32;
            node.borrow_mut().set_corrected_index(corrected);
        }
        LogicalNode::on_create(&node, parent.as_ref());
        self.nodes.insert(node_id, node.clone());

        let attached = node.borrow_mut().attach(None);
        if attached.is_err() {
            log::error!("node {node_id} could not attach; subtree left unattached");
        }
        attached
    }

    fn update(&mut self, node_id: NodeId, delta: &StyleMap) {
        match self.nodes.get(&node_id) {
            Some(node) => node.borrow_mut().on_update(delta),
            None => log::warn!("update for unknown node {node_id} in root {}", self.root_id),
        }
    }

    fn delete(&mut self, node_id: NodeId) {
        let Some(node) = self.nodes.get(&node_id).cloned() else {
            log::warn!("delete for unknown node {node_id} in root {}", self.root_id);
            return;
        };
        let mut subtree = Vec::new();
        collect_subtree(&node, &mut subtree);
        node.borrow_mut().on_delete();
        for id in subtree {
            self.nodes.remove(&id);
        }
    }

    fn move_node(&mut self, node_id: NodeId, new_parent_id: NodeId, new_index: i32) {
        let Some(node) = self.nodes.get(&node_id).cloned() else {
            log::warn!("move for unknown node {node_id} in root {}", self.root_id);
            return;
        };
        let old_parent = node.borrow().parent();
        if let Some(old_parent) = old_parent {
            old_parent.borrow_mut().remove_child(&node);
        }
        if new_parent_id == self.root_id {
            return;
        }
        let Some(parent) = self.nodes.get(&new_parent_id).cloned() else {
            log::warn!(
                "move for node {node_id}: parent {new_parent_id} unknown in root {}; node left unmounted",
                self.root_id
            );
            return;
        };
        let corrected = (new_index.max(0) as usize).min(parent.borrow().child_count()) as i32;
        node.borrow_mut().set_corrected_index(corrected);
        parent.borrow_mut().add_child_at(&node, new_index);
    }

    /// Cascades deletion through every remaining node. Used when the
    /// root itself goes away.
    pub(crate) fn destroy_all(&mut self) {
        let roots: Vec<NodeRef> = self
            .nodes
            .values()
            .filter(|node| node.borrow().parent().is_none())
            .cloned()
            .collect();
        for node in roots {
            node.borrow_mut().on_delete();
        }
        self.nodes.clear();
    }
}

fn collect_subtree(node: &NodeRef, out: &mut Vec<NodeId>) {
    let node = node.borrow();
    out.push(node.node_id());
    for child in node.children() {
        collect_subtree(child, out);
    }
}

/// Measurement-only record for a node with no native backing.
#[derive(Clone, Debug)]
pub struct VirtualNode {
    info: RenderInfo,
    kind: String,
    style: StyleMap,
}

impl VirtualNode {
    pub fn node_id(&self) -> NodeId {
        self.info.node_id
    }

    pub fn render_info(&self) -> &RenderInfo {
        &self.info
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn style(&self) -> &StyleMap {
        &self.style
    }
}

/// Bookkeeping for virtual (non-backed) nodes of one root. Never talks
/// to the handle registry or the surface.
pub struct VirtualViewManager {
    root_id: RootId,
    nodes: HashMap<NodeId, VirtualNode>,
}

impl VirtualViewManager {
    pub(crate) fn new(root_id: RootId) -> Self {
        Self {
            root_id,
            nodes: HashMap::new(),
        }
    }

    pub fn root_id(&self) -> RootId {
        self.root_id
    }

    pub fn create_node(&mut self, info: RenderInfo, kind: impl Into<String>, style: StyleMap) {
        if self.nodes.contains_key(&info.node_id) {
            log::warn!(
                "virtual node {} already exists in root {}",
                info.node_id,
                self.root_id
            );
            return;
        }
        self.nodes.insert(
            info.node_id,
            VirtualNode {
                info,
                kind: kind.into(),
                style,
            },
        );
    }

    pub fn update_node(&mut self, node_id: NodeId, delta: &StyleMap) {
        match self.nodes.get_mut(&node_id) {
            Some(node) => {
                for (key, value) in delta {
                    node.style.insert(key.clone(), value.clone());
                }
            }
            None => log::warn!(
                "update for unknown virtual node {node_id} in root {}",
                self.root_id
            ),
        }
    }

    pub fn delete_node(&mut self, node_id: NodeId) {
        if self.nodes.remove(&node_id).is_none() {
            log::warn!(
                "delete for unknown virtual node {node_id} in root {}",
                self.root_id
            );
        }
    }

    pub fn node(&self, node_id: NodeId) -> Option<&VirtualNode> {
        self.nodes.get(&node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
