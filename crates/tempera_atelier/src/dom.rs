//! In-memory document the engine renders into.
//!
//! Nodes live in an arena keyed by [`NodeId`]. Besides the usual parent and
//! child links a node may carry a table of local variables and a
//! `scope_parent`: nodes inserted by a structural marker point back at the
//! marker's anchor, so local lookups follow where content was rendered
//! *from* rather than where it sits among its siblings.

use std::fmt;
use std::rc::Rc;

use tempera_carton::{is_void_tag, CompactString, FxHashMap, IndexMap, IndexSet, SmallVec};

use crate::error::Result;
use crate::value::{Object, Value};

/// Unique identifier for document nodes.
pub type NodeId = u64;

/// Local variables attached to a node (`@item`, `@index`, ...).
pub type Locals = FxHashMap<CompactString, Value>;

/// Event handler attached to an element.
pub type ListenerFn = Rc<dyn Fn(&Document, &Event) -> Result<()>>;

/// An event delivered to element listeners.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: CompactString,
    pub target: NodeId,
    pub detail: Value,
}

impl Event {
    /// The event as a context value: `{ type, target, detail }`.
    pub fn to_value(&self) -> Value {
        Value::Object(Object::from_entries([
            ("type", Value::String(self.kind.clone())),
            ("target", Value::Number(self.target as f64)),
            ("detail", self.detail.clone()),
        ]))
    }
}

#[derive(Clone)]
pub struct Listener {
    pub event: CompactString,
    pub handler: ListenerFn,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("event", &self.event).finish()
    }
}

/// Element state.
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    pub tag: CompactString,
    /// Attributes other than `class` and `style`, in insertion order
    pub attributes: IndexMap<CompactString, CompactString>,
    pub classes: IndexSet<CompactString>,
    pub style: IndexMap<CompactString, CompactString>,
    /// Live properties (`value`, `checked`, ...)
    pub properties: IndexMap<CompactString, Value>,
    pub listeners: Vec<Listener>,
}

impl ElementData {
    pub fn new(tag: impl Into<CompactString>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<CompactString> {
        match name {
            "class" if !self.classes.is_empty() => Some(join_classes(&self.classes)),
            "style" if !self.style.is_empty() => Some(join_style(&self.style)),
            _ => self.attributes.get(name).cloned(),
        }
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match name {
            "class" => {
                self.classes = value.split_whitespace().map(CompactString::from).collect();
            }
            "style" => {
                self.style = value
                    .split(';')
                    .filter_map(|decl| {
                        let (prop, val) = decl.split_once(':')?;
                        Some((prop.trim().into(), val.trim().into()))
                    })
                    .collect();
            }
            _ => {
                self.attributes.insert(name.into(), value.into());
            }
        }
    }

    pub fn remove_attribute(&mut self, name: &str) {
        match name {
            "class" => self.classes.clear(),
            "style" => self.style.clear(),
            _ => {
                self.attributes.shift_remove(name);
            }
        }
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    pub fn property(&self, name: &str) -> Value {
        self.properties.get(name).cloned().unwrap_or_default()
    }
}

fn join_classes(classes: &IndexSet<CompactString>) -> CompactString {
    let mut out = CompactString::default();
    for (i, class) in classes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(class);
    }
    out
}

fn join_style(style: &IndexMap<CompactString, CompactString>) -> CompactString {
    let mut out = CompactString::default();
    for (i, (prop, value)) in style.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(prop);
        out.push_str(": ");
        out.push_str(value);
        out.push(';');
    }
    out
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    Element(ElementData),
    Text(CompactString),
    Comment(CompactString),
    /// Invisible position marker left by structural markers and fragments
    Anchor(CompactString),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 4]>,
    pub locals: Option<Locals>,
    /// Where local lookups continue instead of `parent`
    pub scope_parent: Option<NodeId>,
}

impl Node {
    fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            parent: None,
            children: SmallVec::new(),
            locals: None,
            scope_parent: None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// The document tree.
pub struct Document {
    nodes: FxHashMap<NodeId, Node>,
    root: NodeId,
    next_id: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut nodes = FxHashMap::default();
        nodes.insert(0, Node::new(0, NodeKind::Root));
        Self {
            nodes,
            root: 0,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn insert(&mut self, kind: NodeKind) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(id, Node::new(id, kind));
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.insert(NodeKind::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.insert(NodeKind::Text(content.into()))
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.insert(NodeKind::Comment(content.into()))
    }

    pub fn create_anchor(&mut self, label: &str) -> NodeId {
        self.insert(NodeKind::Anchor(label.into()))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn position(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(id)?;
        let index = self.children(parent).iter().position(|&c| c == id)?;
        Some((parent, index))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.position(id)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let (parent, index) = self.position(id)?;
        index.checked_sub(1).map(|i| self.children(parent)[i])
    }

    /// Detach `id` from its parent, keeping its subtree.
    pub fn detach(&mut self, id: NodeId) {
        if let Some((parent, index)) = self.position(id) {
            if let Some(parent) = self.nodes.get_mut(&parent) {
                parent.children.remove(index);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
    }

    /// Move `node` right after `reference` among its siblings.
    ///
    /// Does nothing when `reference` is detached.
    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) {
        if reference == node {
            return;
        }
        self.detach(node);
        let Some((parent, index)) = self.position(reference) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.insert(index + 1, node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = Some(parent);
        }
    }

    /// Remove a node and its descendants, returning every removed id.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if id == self.root {
            return Vec::new();
        }
        self.detach(id);
        let removed = self.descendants(id);
        for node_id in &removed {
            self.nodes.remove(node_id);
        }
        removed
    }

    /// A node and its descendants, pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                result.push(current);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        result
    }

    /// Next node in pre-order after `id`, staying inside `within`.
    pub fn next_in_preorder(&self, id: NodeId, within: NodeId) -> Option<NodeId> {
        if let Some(&first) = self.children(id).first() {
            return Some(first);
        }
        let mut current = id;
        loop {
            if current == within {
                return None;
            }
            if let Some(next) = self.next_sibling(current) {
                return Some(next);
            }
            current = self.parent(current)?;
        }
    }

    pub fn set_text(&mut self, id: NodeId, content: &str) {
        if let Some(node) = self.nodes.get_mut(&id) {
            match &mut node.kind {
                NodeKind::Text(text) | NodeKind::Comment(text) => {
                    text.clear();
                    text.push_str(content);
                }
                _ => {}
            }
        }
    }

    /// Replace the children of an element with a single text node.
    pub fn replace_children_with_text(&mut self, id: NodeId, content: &str) {
        let children: Vec<NodeId> = self.children(id).to_vec();
        for child in children {
            self.remove(child);
        }
        let text = self.create_text(content);
        self.append_child(id, text);
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node_id in self.descendants(id) {
            if let Some(NodeKind::Text(text)) = self.get(node_id).map(|n| &n.kind) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(el) = self.element_mut(id) {
            el.set_attribute(name, value);
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.remove_attribute(name);
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<CompactString> {
        self.element(id)?.attribute(name)
    }

    pub fn toggle_class(&mut self, id: NodeId, name: &str, on: bool) {
        if let Some(el) = self.element_mut(id) {
            if on {
                el.classes.insert(name.into());
            } else {
                el.classes.shift_remove(name);
            }
        }
    }

    pub fn has_class(&self, id: NodeId, name: &str) -> bool {
        self.element(id).is_some_and(|el| el.has_class(name))
    }

    /// Set or (with `None`) remove one style property.
    pub fn set_style(&mut self, id: NodeId, property: &str, value: Option<&str>) {
        if let Some(el) = self.element_mut(id) {
            match value {
                Some(value) => {
                    el.style.insert(property.into(), value.into());
                }
                None => {
                    el.style.shift_remove(property);
                }
            }
        }
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<CompactString> {
        self.element(id)?.style.get(property).cloned()
    }

    pub fn set_property(&mut self, id: NodeId, name: &str, value: Value) {
        if let Some(el) = self.element_mut(id) {
            el.properties.insert(name.into(), value);
        }
    }

    pub fn property(&self, id: NodeId, name: &str) -> Value {
        self.element(id).map(|el| el.property(name)).unwrap_or_default()
    }

    /// Merge `locals` into the node's own locals.
    pub fn set_locals(&mut self, id: NodeId, locals: &Locals) {
        if let Some(node) = self.nodes.get_mut(&id) {
            let own = node.locals.get_or_insert_with(Locals::default);
            own.extend(locals.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
    }

    pub fn own_locals(&self, id: NodeId) -> Option<&Locals> {
        self.get(id)?.locals.as_ref()
    }

    pub fn set_scope_parent(&mut self, id: NodeId, scope_parent: NodeId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.scope_parent = Some(scope_parent);
        }
    }

    /// Resolve a local variable, nearest scope first.
    pub fn lookup_local(&self, id: NodeId, name: &str) -> Option<Value> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.get(current)?;
            if let Some(value) = node.locals.as_ref().and_then(|l| l.get(name)) {
                return Some(value.clone());
            }
            cursor = node.scope_parent.or(node.parent);
        }
        None
    }

    /// Every local variable visible from `id`; nearer scopes shadow outer ones.
    pub fn visible_locals(&self, id: NodeId) -> Locals {
        let mut scopes = Vec::new();
        let mut cursor = Some(id);
        while let Some(node) = cursor.and_then(|c| self.get(c)) {
            if let Some(locals) = &node.locals {
                scopes.push(locals);
            }
            cursor = node.scope_parent.or(node.parent);
        }
        let mut merged = Locals::default();
        for locals in scopes.into_iter().rev() {
            merged.extend(locals.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    pub fn add_listener(&mut self, id: NodeId, event: &str, handler: ListenerFn) {
        if let Some(el) = self.element_mut(id) {
            el.listeners.push(Listener {
                event: event.into(),
                handler,
            });
        }
    }

    /// Deliver an event to the listeners on `target`. Returns how many ran.
    pub fn dispatch(&self, target: NodeId, kind: &str, detail: Value) -> Result<usize> {
        let handlers: Vec<ListenerFn> = self
            .element(target)
            .map(|el| {
                el.listeners
                    .iter()
                    .filter(|l| l.event == kind)
                    .map(|l| l.handler.clone())
                    .collect()
            })
            .unwrap_or_default();
        let event = Event {
            kind: kind.into(),
            target,
            detail,
        };
        for handler in &handlers {
            handler(self, &event)?;
        }
        Ok(handlers.len())
    }

    /// Depth-first search for the first element with `tag`.
    pub fn find_element(&self, from: NodeId, tag: &str) -> Option<NodeId> {
        self.find_elements(from, tag).into_iter().next()
    }

    pub fn find_elements(&self, from: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(from)
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(|el| el.tag == tag))
            .collect()
    }

    /// Opening tag of a node, used in diagnostics.
    pub fn opening_tag(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else {
            return format!("<#{id} removed>");
        };
        match &node.kind {
            NodeKind::Root => "#document".to_string(),
            NodeKind::Element(el) => {
                let mut out = String::new();
                write_opening_tag(el, &mut out);
                out
            }
            NodeKind::Text(text) => format!("#text {text:?}"),
            NodeKind::Comment(text) => format!("<!--{text}-->"),
            NodeKind::Anchor(label) => format!("<!--{label}-->"),
        }
    }

    /// Serialize a subtree to markup. Anchors are omitted.
    pub fn serialize(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_into(id, &mut out);
        out
    }

    fn serialize_into(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Root => {
                for &child in &node.children {
                    self.serialize_into(child, out);
                }
            }
            NodeKind::Element(el) => {
                write_opening_tag(el, out);
                if is_void_tag(&el.tag) {
                    return;
                }
                for &child in &node.children {
                    self.serialize_into(child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
            NodeKind::Text(text) => escape_into(text, false, out),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Anchor(_) => {}
        }
    }
}

fn write_opening_tag(el: &ElementData, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    let class = (!el.classes.is_empty()).then(|| join_classes(&el.classes));
    let style = (!el.style.is_empty()).then(|| join_style(&el.style));
    let extra = [("class", class), ("style", style)];
    let attributes = el
        .attributes
        .iter()
        .map(|(name, value)| (name.as_str(), value.clone()))
        .chain(extra.iter().filter_map(|(name, value)| Some((*name, value.clone()?))));
    for (name, value) in attributes {
        out.push(' ');
        out.push_str(name);
        if !value.is_empty() {
            out.push_str("=\"");
            escape_into(&value, true, out);
            out.push('"');
        }
    }
    out.push('>');
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}
