//! Virtual fragments: groups of sibling nodes moved and removed as one.
//!
//! A fragment is bounded by two anchors. Everything between them belongs to
//! the fragment, including content a nested structural marker inserts after
//! its own anchor later on, so moving a fragment carries that content along.

use tempera_carton::SmallVec;

use crate::changelog::Key;
use crate::dom::{Document, Locals, NodeId};
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct VirtualFragment {
    start: NodeId,
    end: NodeId,
    /// Top-level nodes created for this fragment, anchors included
    nodes: SmallVec<[NodeId; 4]>,
    key: Option<Key>,
    value: Value,
}

impl VirtualFragment {
    /// Wrap detached `content` nodes between two new anchors.
    pub fn new(document: &mut Document, content: &[NodeId]) -> Self {
        let start = document.create_anchor("fragment");
        let end = document.create_anchor("/fragment");
        let mut nodes = SmallVec::with_capacity(content.len() + 2);
        nodes.push(start);
        nodes.extend_from_slice(content);
        nodes.push(end);
        Self {
            start,
            end,
            nodes,
            key: None,
            value: Value::Undefined,
        }
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    /// Last node of the fragment, the reference to insert followers after.
    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Nodes created from the blueprint, anchors excluded.
    pub fn content(&self) -> &[NodeId] {
        &self.nodes[1..self.nodes.len() - 1]
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn set_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = value;
    }

    /// Every node currently between the anchors, inclusive.
    pub fn span(&self, document: &Document) -> Vec<NodeId> {
        if document.parent(self.start).is_none() {
            return self.nodes.to_vec();
        }
        let mut span = vec![self.start];
        let mut cursor = self.start;
        while cursor != self.end {
            match document.next_sibling(cursor) {
                Some(next) => {
                    span.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        span
    }

    /// Place the fragment directly after `reference`.
    pub fn insert_after(&self, document: &mut Document, reference: NodeId) {
        let span = self.span(document);
        if span.contains(&reference) {
            return;
        }
        let mut cursor = reference;
        for node in span {
            document.insert_after(cursor, node);
            cursor = node;
        }
    }

    /// Append the fragment to `parent`.
    pub fn append_to(&self, document: &mut Document, parent: NodeId) {
        for node in self.span(document) {
            document.append_child(parent, node);
        }
    }

    /// Whether the fragment already sits directly after `reference`.
    pub fn is_after(&self, document: &Document, reference: NodeId) -> bool {
        document.next_sibling(reference) == Some(self.start)
    }

    /// Attach local variables to the fragment's own nodes.
    pub fn set_locals(&self, document: &mut Document, locals: &Locals) {
        for &node in &self.nodes {
            document.set_locals(node, locals);
        }
    }

    /// Make local lookups from the fragment continue at `scope_parent`.
    pub fn set_scope_parent(&self, document: &mut Document, scope_parent: NodeId) {
        for &node in &self.nodes {
            document.set_scope_parent(node, scope_parent);
        }
    }

    /// Remove the fragment and everything inside it. Returns removed ids.
    pub fn remove(self, document: &mut Document) -> Vec<NodeId> {
        let mut removed = Vec::new();
        for node in self.span(document) {
            removed.extend(document.remove(node));
        }
        removed
    }
}
