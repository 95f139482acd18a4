//! Blueprints: compiled, reusable templates.
//!
//! Compilation turns markup into a [`Blueprint`]: an inert node tree plus a
//! sparse table mapping pre-order node indexes to the markers bound there.
//! Structural markers (`*if`, `*foreach`) take their element out of the
//! tree, compile it into a separate sub-blueprint and leave an anchor in its
//! place. Instantiation clones the node tree into a document and constructs
//! the bound markers.

mod compile;
mod instantiate;
pub mod syntax;

use std::rc::Rc;

use tempera_carton::{CompactString, FxHashMap, FxHashSet, SmallVec};
use tempera_relief::ParserOptions;

use crate::error::{Error, Result};
use crate::path::Path;
use syntax::FilterCall;

pub use instantiate::{instantiate, seed_locals, Instantiation};

/// Index of a blueprint in [`Templates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlueprintId(pub u32);

/// Index of an interned path in [`Templates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathId(pub u32);

/// Inert node of a blueprint.
#[derive(Debug, Clone)]
pub enum BlueprintNode {
    Element {
        tag: CompactString,
        attributes: Vec<(CompactString, CompactString)>,
        children: Vec<BlueprintNode>,
    },
    Text(CompactString),
    Comment(CompactString),
    /// Left where a structural marker was, or a template declaration
    Anchor(CompactString),
}

/// Argument attached to a marker binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerArg {
    /// `name` in `*attr="name: path"` or `.name="path"`
    Name(CompactString),
    /// Sub-blueprint rendered by a structural marker
    Blueprint(BlueprintId),
}

/// One marker bound to one node.
#[derive(Debug, Clone)]
pub struct MarkerDescriptor {
    pub marker: CompactString,
    pub path: PathId,
    pub local: bool,
    pub filters: Vec<FilterCall>,
    pub args: SmallVec<[MarkerArg; 2]>,
}

impl MarkerDescriptor {
    /// First `Name` argument.
    pub fn name_arg(&self) -> Option<&str> {
        self.args.iter().find_map(|arg| match arg {
            MarkerArg::Name(name) => Some(name.as_str()),
            MarkerArg::Blueprint(_) => None,
        })
    }
}

/// A compiled template.
#[derive(Debug, Clone, Default)]
pub struct Blueprint {
    pub name: Option<CompactString>,
    pub nodes: Vec<BlueprintNode>,
    /// Pre-order node index to the markers bound there, sorted by index
    pub bindings: Vec<(u32, SmallVec<[MarkerDescriptor; 2]>)>,
}

impl Blueprint {
    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[BlueprintNode]) -> usize {
            nodes
                .iter()
                .map(|node| match node {
                    BlueprintNode::Element { children, .. } => 1 + count(children),
                    _ => 1,
                })
                .sum()
        }
        count(&self.nodes)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &MarkerDescriptor> {
        self.bindings.iter().flat_map(|(_, descriptors)| descriptors.iter())
    }
}

/// Blueprint arena plus the path table shared by all of them.
pub struct Templates {
    options: ParserOptions,
    sentinel: char,
    blueprints: Vec<Blueprint>,
    names: FxHashMap<CompactString, BlueprintId>,
    paths: Vec<Rc<Path>>,
    path_index: FxHashMap<CompactString, PathId>,
    cache: FxHashMap<u64, BlueprintId>,
}

impl Templates {
    pub fn new(options: ParserOptions, sentinel: char) -> Self {
        Self {
            options,
            sentinel,
            blueprints: Vec::new(),
            names: FxHashMap::default(),
            paths: Vec::new(),
            path_index: FxHashMap::default(),
            cache: FxHashMap::default(),
        }
    }

    pub fn get(&self, id: BlueprintId) -> Option<&Blueprint> {
        self.blueprints.get(id.0 as usize)
    }

    pub fn blueprint(&self, id: BlueprintId) -> Result<&Blueprint> {
        self.get(id)
            .ok_or_else(|| Error::reference(format!("unknown blueprint #{}", id.0)))
    }

    /// Blueprint registered under `name` by `<template id="name">`.
    pub fn named(&self, name: &str) -> Option<BlueprintId> {
        self.names.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    pub fn path(&self, id: PathId) -> Option<Rc<Path>> {
        self.paths.get(id.0 as usize).cloned()
    }

    /// Number of distinct interned paths.
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    /// Intern a path by its text, parsing it once.
    pub fn intern_path(&mut self, source: &str) -> Result<PathId> {
        let source = source.trim();
        if let Some(&id) = self.path_index.get(source) {
            return Ok(id);
        }
        let path = Path::parse(source)?;
        let id = PathId(self.paths.len() as u32);
        self.paths.push(Rc::new(path));
        self.path_index.insert(source.into(), id);
        Ok(id)
    }

    /// Context root properties read by a blueprint and every blueprint it
    /// can render.
    pub fn root_properties(&self, id: BlueprintId) -> Vec<CompactString> {
        let mut seen = FxHashSet::default();
        let mut visited = FxHashSet::default();
        let mut roots = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(blueprint) = self.get(current) else {
                continue;
            };
            for descriptor in blueprint.descriptors() {
                for arg in &descriptor.args {
                    if let MarkerArg::Blueprint(sub) = arg {
                        stack.push(*sub);
                    }
                }
                if descriptor.local {
                    continue;
                }
                if let Some(path) = self.path(descriptor.path) {
                    if seen.insert(CompactString::from(path.root())) {
                        roots.push(CompactString::from(path.root()));
                    }
                }
            }
        }
        roots
    }

    fn reserve(&mut self, name: Option<&str>) -> BlueprintId {
        let id = BlueprintId(self.blueprints.len() as u32);
        self.blueprints.push(Blueprint {
            name: name.map(CompactString::from),
            ..Blueprint::default()
        });
        if let Some(name) = name {
            self.names.insert(name.into(), id);
        }
        id
    }
}
