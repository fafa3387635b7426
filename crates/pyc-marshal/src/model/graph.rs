//! Arena owning every node produced by one decode.

use crate::error::DecodeError;
use crate::model::{Handle, Value};

/// The decoded value graph.
///
/// All nodes of one top-level decode live here and are released together
/// when the graph is dropped. Nodes are never removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph<'a> {
    nodes: Vec<Value<'a>>,
    root: Handle,
}

impl<'a> Graph<'a> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: Handle(0),
        }
    }

    /// Appends a node and returns its handle.
    pub(crate) fn alloc(&mut self, value: Value<'a>) -> Result<Handle, DecodeError> {
        let handle = Handle::from_index(self.nodes.len())?;
        self.nodes.push(value);
        Ok(handle)
    }

    /// Replaces the contents of an already allocated node.
    pub(crate) fn set(&mut self, handle: Handle, value: Value<'a>) {
        self.nodes[handle.index()] = value;
    }

    pub(crate) fn set_root(&mut self, root: Handle) {
        self.root = root;
    }

    /// Returns the root handle.
    pub fn root(&self) -> Handle {
        self.root
    }

    /// Returns the root node.
    pub fn root_value(&self) -> &Value<'a> {
        self.get(self.root)
    }

    /// Returns the node behind a handle.
    ///
    /// Handles are only ever minted by the graph that owns them, so a
    /// handle from this graph is always in bounds.
    pub fn get(&self, handle: Handle) -> &Value<'a> {
        &self.nodes[handle.index()]
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node was allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all nodes in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &Value<'a>)> {
        self.nodes
            .iter()
            .enumerate()
            // Every index was checked by `alloc`.
            .map(|(i, v)| (Handle(i as u32), v))
    }

    /// Counts how many child slots across the graph point at `handle`.
    pub fn parent_slots(&self, handle: Handle) -> usize {
        self.nodes
            .iter()
            .map(|node| node.children().iter().filter(|c| **c == handle).count())
            .sum()
    }

    /// Returns true if the node is reachable through more than one slot,
    /// i.e. it was the target of at least one back-reference.
    pub fn is_shared(&self, handle: Handle) -> bool {
        let slots = self.parent_slots(handle) + usize::from(handle == self.root);
        slots > 1
    }
}
