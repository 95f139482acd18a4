//! Watchers and the execute pass.
//!
//! Every marker constructed on instantiation is wrapped in a [`Watcher`]
//! that caches the last value it delivered. [`execute`] walks a subtree in
//! document order, re-evaluates each watcher's expression and fires the
//! marker only when the value, or the contents of the same container,
//! changed since the previous pass.

use tempera_carton::FxHashMap;

use crate::changelog::{Changelog, Snapshot};
use crate::dom::{Document, NodeId};
use crate::engine::Engine;
use crate::error::Result;
use crate::expression::{Env, Expression};
use crate::fragment::VirtualFragment;
use crate::markers::{Marker, UpdateContext};
use crate::value::{Object, Value};

/// A marker plus the value it last saw.
pub struct Watcher {
    marker: Box<dyn Marker>,
    expression: Expression,
    cached: Value,
    snapshot: Option<Snapshot>,
    primed: bool,
}

impl Watcher {
    pub fn new(marker: Box<dyn Marker>, expression: Expression) -> Self {
        Self {
            marker,
            expression,
            cached: Value::Undefined,
            snapshot: None,
            primed: false,
        }
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn cached(&self) -> &Value {
        &self.cached
    }

    /// Compare a freshly evaluated value against the cache and describe
    /// what changed, if anything. The cache always takes the new value.
    fn check(&mut self, value: &Value) -> Option<Changelog> {
        let changelog = if !self.primed {
            self.primed = true;
            Some(Changelog::initial())
        } else if self.cached.same_container(value) {
            let changes = self
                .snapshot
                .as_ref()
                .map(|snapshot| snapshot.changes(value))
                .unwrap_or_default();
            (!changes.is_empty()).then_some(Changelog::Modify { changes })
        } else if !self.cached.same_value(value) {
            Some(Changelog::Set {
                old_value: self.cached.clone(),
            })
        } else {
            None
        };
        self.cached = value.clone();
        self.snapshot = Snapshot::capture(value);
        changelog
    }
}

/// Watchers by the node they are bound to.
#[derive(Default)]
pub struct WatcherStore {
    by_node: FxHashMap<NodeId, Vec<Watcher>>,
}

impl WatcherStore {
    pub fn add(&mut self, node: NodeId, watcher: Watcher) {
        self.by_node.entry(node).or_default().push(watcher);
    }

    pub fn count(&self, node: NodeId) -> usize {
        self.by_node.get(&node).map_or(0, Vec::len)
    }

    /// Total number of watchers.
    pub fn len(&self) -> usize {
        self.by_node.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    pub fn drop_nodes(&mut self, nodes: &[NodeId]) {
        for node in nodes {
            self.by_node.remove(node);
        }
    }

    fn take(&mut self, node: NodeId) -> Option<Vec<Watcher>> {
        self.by_node.remove(&node)
    }

    /// Put watchers back, keeping any added for the node in the meantime.
    fn restore(&mut self, node: NodeId, mut watchers: Vec<Watcher>) {
        if let Some(added) = self.by_node.remove(&node) {
            watchers.extend(added);
        }
        self.by_node.insert(node, watchers);
    }
}

/// A document and the watchers bound into it.
#[derive(Default)]
pub struct LiveTree {
    pub document: Document,
    pub watchers: WatcherStore,
}

impl LiveTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a fragment's nodes and every watcher bound to them.
    pub fn remove_fragment(&mut self, fragment: VirtualFragment) -> usize {
        let removed = fragment.remove(&mut self.document);
        self.watchers.drop_nodes(&removed);
        removed.len()
    }
}

/// Counters for one execute pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    /// Nodes walked
    pub visited: usize,
    /// Expressions evaluated
    pub evaluated: usize,
    /// Markers fired
    pub fired: usize,
}

/// Re-evaluate every watcher under `root`, in document order, firing the
/// markers whose value changed.
///
/// The walk is dynamic: content a marker inserts after its own node is
/// visited later in the same pass, and removed content is skipped.
pub fn execute(
    engine: &Engine,
    tree: &mut LiveTree,
    context: &Object,
    root: NodeId,
) -> Result<PassStats> {
    let mut stats = PassStats::default();
    let mut cursor = Some(root);
    while let Some(node) = cursor {
        stats.visited += 1;
        if let Some(mut watchers) = tree.watchers.take(node) {
            let outcome = run_watchers(engine, tree, context, node, &mut watchers, &mut stats);
            if tree.document.contains(node) {
                tree.watchers.restore(node, watchers);
            }
            if let Err(err) = outcome {
                return Err(err.at_node(tree.document.opening_tag(node)));
            }
        }
        cursor = tree.document.next_in_preorder(node, root);
    }
    tracing::debug!(
        visited = stats.visited,
        evaluated = stats.evaluated,
        fired = stats.fired,
        "execute pass"
    );
    Ok(stats)
}

fn run_watchers(
    engine: &Engine,
    tree: &mut LiveTree,
    context: &Object,
    node: NodeId,
    watchers: &mut [Watcher],
    stats: &mut PassStats,
) -> Result<()> {
    for watcher in watchers {
        let value = watcher
            .expression
            .get(Env::new(&tree.document, context))?;
        stats.evaluated += 1;
        let Some(changelog) = watcher.check(&value) else {
            continue;
        };
        stats.fired += 1;
        let mut cx = UpdateContext {
            engine,
            tree: &mut *tree,
            context,
            node,
            expression: &watcher.expression,
        };
        watcher.marker.update(&mut cx, &value, &changelog)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::ChangeKind;
    use crate::path::Path;
    use crate::value::Array;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recording(log: &Log) -> Box<dyn Marker> {
        let log = log.clone();
        Box::new(
            move |_: &mut UpdateContext<'_>, value: &Value, changelog: &Changelog| -> Result<()> {
                let kind = match changelog {
                    Changelog::Set { .. } => "set".to_string(),
                    Changelog::Modify { changes } => format!("modify x{}", changes.len()),
                    Changelog::Delete { .. } => "delete".to_string(),
                };
                log.borrow_mut()
                    .push(format!("{kind} {}", value.to_display_string()));
                Ok(())
            },
        )
    }

    fn watch(tree: &mut LiveTree, node: NodeId, path: &str, log: &Log) {
        let expression = Expression::new(
            Rc::new(Path::parse(path).unwrap()),
            Vec::new(),
            node,
            crate::expression::ExprScope::Context,
        );
        tree.watchers.add(node, Watcher::new(recording(log), expression));
    }

    #[test]
    fn test_fires_on_change_only() {
        let engine = Engine::default();
        let mut tree = LiveTree::new();
        let root = tree.document.root();
        let log = Log::default();
        watch(&mut tree, root, "count", &log);

        let context = Object::new();
        context.set("count", 1);
        execute(&engine, &mut tree, &context, root).unwrap();
        let stats = execute(&engine, &mut tree, &context, root).unwrap();
        assert_eq!(stats.fired, 0);
        context.set("count", 2);
        execute(&engine, &mut tree, &context, root).unwrap();
        assert_eq!(*log.borrow(), vec!["set 1", "set 2"]);
    }

    #[test]
    fn test_same_container_reports_modify() {
        let engine = Engine::default();
        let mut tree = LiveTree::new();
        let root = tree.document.root();
        let log = Log::default();
        watch(&mut tree, root, "items", &log);

        let items = Array::from_vec(vec![Value::from(1)]);
        let context = Object::new();
        context.set("items", items.clone());
        execute(&engine, &mut tree, &context, root).unwrap();
        items.push(Value::from(2));
        items.push(Value::from(3));
        execute(&engine, &mut tree, &context, root).unwrap();
        assert_eq!(*log.borrow(), vec!["set 1", "modify x2 1,2,3"]);
    }

    #[test]
    fn test_nan_does_not_refire() {
        let engine = Engine::default();
        let mut tree = LiveTree::new();
        let root = tree.document.root();
        let log = Log::default();
        watch(&mut tree, root, "n", &log);

        let context = Object::new();
        context.set("n", f64::NAN);
        execute(&engine, &mut tree, &context, root).unwrap();
        execute(&engine, &mut tree, &context, root).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_error_is_annotated_and_watchers_kept() {
        let engine = Engine::default();
        let mut tree = LiveTree::new();
        let div = tree.document.create_element("div");
        let root = tree.document.root();
        tree.document.append_child(root, div);
        let log = Log::default();
        watch(&mut tree, div, "missing.deep", &log);

        let err = execute(&engine, &mut tree, &Object::new(), root).unwrap_err();
        assert_eq!(err.node_tag(), Some("<div>"));
        assert_eq!(tree.watchers.count(div), 1);
    }

    #[test]
    fn test_changelog_detail() {
        let mut watcher = Watcher::new(
            Box::new(|_: &mut UpdateContext<'_>, _: &Value, _: &Changelog| -> Result<()> { Ok(()) }),
            Expression::new(
                Rc::new(Path::parse("x").unwrap()),
                Vec::new(),
                0,
                crate::expression::ExprScope::Context,
            ),
        );
        let items = Array::from_vec(vec![Value::from("a"), Value::from("b")]);
        let value = Value::Array(items.clone());
        assert!(matches!(watcher.check(&value), Some(Changelog::Set { .. })));
        items.remove(0);
        let Some(Changelog::Modify { changes }) = watcher.check(&value) else {
            panic!("expected a modify changelog");
        };
        let kinds: Vec<_> = changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Set, ChangeKind::Delete]);
    }
}
