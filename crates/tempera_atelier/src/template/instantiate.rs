//! Blueprint instantiation.

use tempera_carton::is_form_control_tag;

use super::{BlueprintId, BlueprintNode, MarkerDescriptor, Templates};
use crate::dom::{Document, Locals, NodeId};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::expression::{ExprScope, Expression};
use crate::fragment::VirtualFragment;
use crate::markers::Binding;
use crate::value::{Object, Value};
use crate::watcher::{LiveTree, Watcher};

/// What to instantiate and which scope it lives in.
#[derive(Debug, Clone)]
pub struct Instantiation {
    pub blueprint: BlueprintId,
    /// Local variables set on the fragment's own nodes
    pub locals: Locals,
    /// Node local lookups continue at once the fragment runs out of scopes
    pub scope_parent: Option<NodeId>,
}

impl Instantiation {
    pub fn new(blueprint: BlueprintId) -> Self {
        Self {
            blueprint,
            locals: Locals::default(),
            scope_parent: None,
        }
    }
}

/// Clone a blueprint into the document, construct its markers and wrap the
/// result in a detached fragment. Nothing is evaluated yet: watchers run on
/// the next [`execute`](crate::watcher::execute) pass.
pub fn instantiate(
    engine: &Engine,
    tree: &mut LiveTree,
    context: &Object,
    request: Instantiation,
) -> Result<VirtualFragment> {
    let templates = engine.templates();
    let blueprint = templates.blueprint(request.blueprint)?;

    let mut created = Vec::with_capacity(blueprint.node_count());
    let roots: Vec<NodeId> = blueprint
        .nodes
        .iter()
        .map(|node| clone_node(&mut tree.document, node, &mut created))
        .collect();
    let fragment = VirtualFragment::new(&mut tree.document, &roots);
    if !request.locals.is_empty() {
        fragment.set_locals(&mut tree.document, &request.locals);
    }
    if let Some(scope_parent) = request.scope_parent {
        fragment.set_scope_parent(&mut tree.document, scope_parent);
    }

    for (index, descriptors) in &blueprint.bindings {
        let node = *created.get(*index as usize).ok_or_else(|| {
            Error::reference(format!("binding index {index} outside blueprint"))
        })?;
        for descriptor in descriptors {
            if let Err(err) = bind(engine, &templates, tree, context, node, descriptor) {
                let tag = tree.document.opening_tag(node);
                tree.remove_fragment(fragment);
                return Err(err.at_node(tag));
            }
        }
    }

    tracing::trace!(
        blueprint = request.blueprint.0,
        nodes = created.len(),
        "instantiated"
    );
    Ok(fragment)
}

/// A node's own locals overlaid with `extra`.
pub fn seed_locals(document: &Document, node: NodeId, extra: Locals) -> Locals {
    let mut locals = document.own_locals(node).cloned().unwrap_or_default();
    locals.extend(extra);
    locals
}

fn clone_node(document: &mut Document, node: &BlueprintNode, created: &mut Vec<NodeId>) -> NodeId {
    match node {
        BlueprintNode::Element {
            tag,
            attributes,
            children,
        } => {
            let id = document.create_element(tag);
            created.push(id);
            for (name, value) in attributes {
                document.set_attribute(id, name, value);
                if is_form_control_tag(tag) || tag == "option" {
                    seed_property(document, id, name, value);
                }
            }
            for child in children {
                let child = clone_node(document, child, created);
                document.append_child(id, child);
            }
            id
        }
        BlueprintNode::Text(content) => {
            let id = document.create_text(content);
            created.push(id);
            id
        }
        BlueprintNode::Comment(content) => {
            let id = document.create_comment(content);
            created.push(id);
            id
        }
        BlueprintNode::Anchor(label) => {
            let id = document.create_anchor(label);
            created.push(id);
            id
        }
    }
}

/// Initial control state comes from the markup attributes.
fn seed_property(document: &mut Document, id: NodeId, name: &str, value: &str) {
    match name {
        "value" => document.set_property(id, "value", Value::from(value)),
        "checked" | "selected" => document.set_property(id, name, Value::Bool(true)),
        _ => {}
    }
}

fn bind(
    engine: &Engine,
    templates: &Templates,
    tree: &mut LiveTree,
    context: &Object,
    node: NodeId,
    descriptor: &MarkerDescriptor,
) -> Result<()> {
    let path = templates
        .path(descriptor.path)
        .ok_or_else(|| Error::reference(format!("unknown path #{}", descriptor.path.0)))?;
    let filters = descriptor
        .filters
        .iter()
        .map(|call| engine.filters().bind(&call.name, call.args.clone()))
        .collect::<Result<Vec<_>>>()?;
    let scope = if descriptor.local {
        ExprScope::Local
    } else {
        ExprScope::Context
    };
    let expression = Expression::new(path, filters, node, scope);

    let mut binding = Binding {
        engine,
        document: &mut tree.document,
        context,
        node,
        marker: &descriptor.marker,
        expression: &expression,
        args: &descriptor.args,
    };
    if let Some(marker) = engine.markers().create(&descriptor.marker, &mut binding)? {
        tree.watchers.add(node, Watcher::new(marker, expression));
    }
    Ok(())
}
