//! Markers: the behaviors bound to nodes by marker attributes.
//!
//! A marker is created once per bound node when a blueprint is instantiated
//! and then receives every change of its expression's value through
//! [`Marker::update`]. Creation may also return no marker at all for
//! behaviors that only wire the node up once (event listeners).

mod attr;
mod class;
mod conditional;
mod event;
mod form;
mod list;
mod prop;
mod style;
mod text;

use std::rc::Rc;

use tempera_carton::{CompactString, FxHashMap};

use crate::changelog::Changelog;
use crate::dom::{Document, Locals, NodeId};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::expression::{Env, Expression};
use crate::fragment::VirtualFragment;
use crate::template::{instantiate, BlueprintId, Instantiation, MarkerArg};
use crate::value::{Object, Value};
use crate::watcher::LiveTree;

pub use conditional::ConditionalMarker;
pub use list::ListMarker;

/// Receives value changes for one bound node.
pub trait Marker {
    fn update(
        &mut self,
        cx: &mut UpdateContext<'_>,
        value: &Value,
        changelog: &Changelog,
    ) -> Result<()>;
}

impl<F> Marker for F
where
    F: FnMut(&mut UpdateContext<'_>, &Value, &Changelog) -> Result<()>,
{
    fn update(
        &mut self,
        cx: &mut UpdateContext<'_>,
        value: &Value,
        changelog: &Changelog,
    ) -> Result<()> {
        self(cx, value, changelog)
    }
}

/// Everything a marker may touch while updating.
pub struct UpdateContext<'a> {
    pub engine: &'a Engine,
    pub tree: &'a mut LiveTree,
    pub context: &'a Object,
    pub node: NodeId,
    pub expression: &'a Expression,
}

impl UpdateContext<'_> {
    pub fn env(&self) -> Env<'_> {
        Env::new(&self.tree.document, self.context)
    }

    pub fn document(&mut self) -> &mut Document {
        &mut self.tree.document
    }

    /// Instantiate a blueprint whose nodes resolve locals through this node.
    pub fn instantiate(&mut self, blueprint: BlueprintId, locals: Locals) -> Result<VirtualFragment> {
        instantiate(
            self.engine,
            self.tree,
            self.context,
            Instantiation {
                blueprint,
                locals,
                scope_parent: Some(self.node),
            },
        )
    }

    /// Remove a fragment and drop the watchers of everything in it.
    pub fn remove_fragment(&mut self, fragment: VirtualFragment) {
        self.tree.remove_fragment(fragment);
    }
}

/// What a marker factory is given when its node is instantiated.
pub struct Binding<'a> {
    pub engine: &'a Engine,
    pub document: &'a mut Document,
    pub context: &'a Object,
    pub node: NodeId,
    pub marker: &'a str,
    pub expression: &'a Expression,
    pub args: &'a [MarkerArg],
}

impl Binding<'_> {
    pub fn name_arg(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            MarkerArg::Name(name) => Some(name.as_str()),
            MarkerArg::Blueprint(_) => None,
        })
    }

    pub fn require_name(&self) -> Result<CompactString> {
        self.name_arg().map(CompactString::from).ok_or_else(|| {
            Error::type_error(format!(
                "'{}' needs a name, as in `{}=\"name: path\"`",
                self.marker, self.marker
            ))
        })
    }

    pub fn blueprint_arg(&self) -> Result<BlueprintId> {
        self.args
            .iter()
            .find_map(|arg| match arg {
                MarkerArg::Blueprint(id) => Some(*id),
                MarkerArg::Name(_) => None,
            })
            .ok_or_else(|| Error::type_error(format!("'{}' has no blueprint", self.marker)))
    }

    pub fn tag(&self) -> Option<&str> {
        self.document.element(self.node).map(|el| el.tag.as_str())
    }
}

/// Creates a marker for a bound node, or `None` when nothing needs updating.
pub type MarkerFactory = Rc<dyn Fn(&mut Binding<'_>) -> Result<Option<Box<dyn Marker>>>>;

#[derive(Clone)]
struct Entry {
    factory: MarkerFactory,
    structural: bool,
}

/// Marker names to factories.
#[derive(Clone, Default)]
pub struct MarkerRegistry {
    entries: FxHashMap<CompactString, Entry>,
}

impl MarkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in markers: `text`, `attr`, `class`, `style`,
    /// `prop`, `on`, `value`, and the structural `if` and `foreach`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("text", text::create);
        registry.register("attr", attr::create);
        registry.register("class", class::create);
        registry.register("style", style::create);
        registry.register("prop", prop::create);
        registry.register("on", event::create);
        registry.register("value", form::create);
        registry.register_structural("if", conditional::create);
        registry.register_structural("foreach", list::create);
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<CompactString>,
        factory: impl Fn(&mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> + 'static,
    ) {
        self.insert(name.into(), Rc::new(factory), false);
    }

    /// Register a marker that renders its element from a sub-blueprint.
    pub fn register_structural(
        &mut self,
        name: impl Into<CompactString>,
        factory: impl Fn(&mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> + 'static,
    ) {
        self.insert(name.into(), Rc::new(factory), true);
    }

    fn insert(&mut self, name: CompactString, factory: MarkerFactory, structural: bool) {
        self.entries.insert(
            name,
            Entry {
                factory,
                structural,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_structural(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|entry| entry.structural)
    }

    pub fn create(&self, name: &str, binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::reference(format!("unknown marker '{name}'")))?;
        (entry.factory)(binding)
    }
}
