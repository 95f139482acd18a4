//! Bound expressions: a path plus filters, tied to the node it was written on.
//!
//! Context-scoped expressions resolve their root property on the render
//! context. Local-scoped ones (`@item`) resolve it on the node's local
//! variables, searching outward through enclosing scopes.

use std::rc::Rc;

use tempera_carton::CompactString;

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::filters::BoundFilter;
use crate::path::{Path, Scope};
use crate::value::{Object, Value};

/// What an expression is evaluated against.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    pub document: &'a Document,
    pub context: &'a Object,
}

impl<'a> Env<'a> {
    pub fn new(document: &'a Document, context: &'a Object) -> Self {
        Self { document, context }
    }
}

/// Read-only view of the locals visible from a node.
pub struct LocalScope<'a> {
    document: &'a Document,
    node: NodeId,
}

impl<'a> LocalScope<'a> {
    pub fn new(document: &'a Document, node: NodeId) -> Self {
        Self { document, node }
    }
}

impl Scope for LocalScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.document.lookup_local(self.node, name)
    }

    fn assign(&self, name: &str, _value: Value) -> Result<()> {
        Err(Error::type_error(format!("local '@{name}' is read-only")))
    }

    fn remove(&self, name: &str) -> Result<()> {
        Err(Error::type_error(format!("local '@{name}' is read-only")))
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn len(&self) -> usize {
        self.document.visible_locals(self.node).len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprScope {
    Context,
    Local,
}

/// A compiled binding expression.
#[derive(Debug, Clone)]
pub struct Expression {
    path: Rc<Path>,
    filters: Rc<[BoundFilter]>,
    node: NodeId,
    scope: ExprScope,
}

impl Expression {
    pub fn new(path: Rc<Path>, filters: Vec<BoundFilter>, node: NodeId, scope: ExprScope) -> Self {
        Self {
            path,
            filters: filters.into(),
            node,
            scope,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn scope(&self) -> ExprScope {
        self.scope
    }

    pub fn is_local(&self) -> bool {
        self.scope == ExprScope::Local
    }

    /// Root property the expression depends on.
    pub fn root_property(&self) -> CompactString {
        self.path.root().into()
    }

    /// Evaluate the path and run the result through the filters.
    pub fn get(&self, env: Env<'_>) -> Result<Value> {
        let mut value = self.with_scope(env, |scope| self.path.get(scope))?;
        for filter in self.filters.iter() {
            value = filter.read(value)?;
        }
        Ok(value)
    }

    /// Run `value` back through the filters in reverse and write it.
    pub fn set(&self, env: Env<'_>, value: Value, replace: bool) -> Result<()> {
        let mut value = value;
        for filter in self.filters.iter().rev() {
            value = filter.write(value)?;
        }
        self.with_scope(env, |scope| self.path.set(scope, value, replace))
    }

    /// Call the function at the path. Every local variable visible from the
    /// node is passed as one extra trailing object argument.
    pub fn call(&self, env: Env<'_>, args: Vec<Value>) -> Result<Value> {
        let mut args = args;
        let locals = env.document.visible_locals(self.node);
        args.push(Value::Object(Object::from_entries(locals)));
        self.with_scope(env, |scope| self.path.call(scope, &args))
    }

    pub fn delete(&self, env: Env<'_>) -> Result<()> {
        self.with_scope(env, |scope| self.path.delete(scope))
    }

    fn with_scope<T>(&self, env: Env<'_>, f: impl FnOnce(&dyn Scope) -> Result<T>) -> Result<T> {
        match self.scope {
            ExprScope::Context => f(env.context),
            ExprScope::Local => f(&LocalScope::new(env.document, self.node)),
        }
    }
}
