//! Property paths such as `user.address[0].city` or `actions.save()`.
//!
//! A [`Path`] is parsed once and then read, written, called or deleted
//! against a [`Scope`], which supplies the root property. Writes create
//! missing intermediate containers: an array when the following step is a
//! bracketed number, an object otherwise.

use std::fmt;

use tempera_carton::{smallvec, CompactString, SmallVec};

use crate::error::{Error, Result};
use crate::value::{Array, Object, Value};

/// Resolves the first step of a path.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<Value>;

    fn assign(&self, name: &str, value: Value) -> Result<()>;

    fn remove(&self, name: &str) -> Result<()>;

    /// Whether the names themselves cannot be assigned or removed. Values
    /// they hold may still be mutated.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Number of names in the scope.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Scope for Object {
    fn lookup(&self, name: &str) -> Option<Value> {
        Object::lookup(self, name)
    }

    fn assign(&self, name: &str, value: Value) -> Result<()> {
        self.set(name, value);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.delete(name);
        Ok(())
    }

    fn len(&self) -> usize {
        Object::len(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// `.name`
    Property,
    /// `[name]`
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub property: CompactString,
    pub kind: StepKind,
}

/// A parsed property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    raw: CompactString,
    steps: SmallVec<[Step; 4]>,
    call: bool,
}

impl Path {
    /// Parse `source`. A trailing `()` marks the path as a call.
    pub fn parse(source: &str) -> Result<Self> {
        let raw = source.trim();
        let (body, call) = match raw.strip_suffix("()") {
            Some(body) => (body.trim_end(), true),
            None => (raw, false),
        };
        if body.is_empty() {
            return Err(Error::syntax(format!("empty path '{raw}'")));
        }

        let invalid = || Error::syntax(format!("invalid path '{raw}'"));
        let mut steps: SmallVec<[Step; 4]> = smallvec![];
        let mut name = CompactString::default();
        let mut after_bracket = false;
        let mut chars = body.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if name.is_empty() && !after_bracket {
                        return Err(invalid());
                    }
                    if !name.is_empty() {
                        steps.push(Step {
                            property: std::mem::take(&mut name),
                            kind: StepKind::Property,
                        });
                    }
                    after_bracket = false;
                    if chars.peek().is_none() {
                        return Err(invalid());
                    }
                }
                '[' => {
                    if !name.is_empty() {
                        steps.push(Step {
                            property: std::mem::take(&mut name),
                            kind: StepKind::Property,
                        });
                    } else if steps.is_empty() {
                        return Err(invalid());
                    }
                    let mut index = CompactString::default();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        index.push(c);
                    }
                    let index = unquote(index.trim());
                    if !closed || index.is_empty() {
                        return Err(invalid());
                    }
                    steps.push(Step {
                        property: index.into(),
                        kind: StepKind::Index,
                    });
                    after_bracket = true;
                }
                ']' | '(' | ')' => return Err(invalid()),
                c if c.is_whitespace() => return Err(invalid()),
                c => {
                    if after_bracket {
                        return Err(invalid());
                    }
                    name.push(c);
                }
            }
        }
        if !name.is_empty() {
            steps.push(Step {
                property: name,
                kind: StepKind::Property,
            });
        }

        Ok(Self {
            raw: raw.into(),
            steps,
            call,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn root(&self) -> &str {
        &self.steps[0].property
    }

    pub fn is_call(&self) -> bool {
        self.call
    }

    /// Read the value. A call path invokes the function without arguments.
    ///
    /// A missing root is a `ReferenceError`, a non-container in the middle
    /// of the path a `TypeError`, a missing final property `undefined`.
    pub fn get(&self, scope: &dyn Scope) -> Result<Value> {
        if self.call {
            return self.call(scope, &[]);
        }
        self.resolve(scope, self.steps.len())
    }

    /// Write `value`, creating missing intermediate containers.
    ///
    /// With `replace` unset an existing defined value is left alone.
    pub fn set(&self, scope: &dyn Scope, value: Value, replace: bool) -> Result<()> {
        let root = self.root();
        let last = self.steps.len() - 1;
        if last == 0 {
            if scope.is_read_only() {
                return scope.assign(root, value);
            }
            if !replace && scope.lookup(root).is_some_and(|v| !v.is_undefined()) {
                return Ok(());
            }
            return scope.assign(root, value);
        }

        let mut current = match scope.lookup(root) {
            Some(v) if !v.is_nullish() => v,
            _ => {
                let created = container_for(&self.steps[1]);
                scope.assign(root, created.clone())?;
                created
            }
        };
        for i in 1..last {
            let step = &self.steps[i];
            let next = child(&current, step, &self.raw)?;
            current = if next.is_nullish() {
                let created = container_for(&self.steps[i + 1]);
                put_child(&current, step, created.clone(), &self.raw)?;
                created
            } else {
                next
            };
        }

        let step = &self.steps[last];
        if !replace && !child(&current, step, &self.raw)?.is_undefined() {
            return Ok(());
        }
        put_child(&current, step, value, &self.raw)
    }

    /// Invoke the function at the path with its parent as `this`.
    pub fn call(&self, scope: &dyn Scope, args: &[Value]) -> Result<Value> {
        let depth = self.steps.len();
        let (this, target) = if depth == 1 {
            (Value::Undefined, self.resolve(scope, 1)?)
        } else {
            let parent = self.resolve(scope, depth - 1)?;
            let target = child(&parent, &self.steps[depth - 1], &self.raw)?;
            (parent, target)
        };
        match target {
            Value::Function(function) => function.call(&this, args),
            other => Err(Error::type_error(format!(
                "{} is not a function (got {})",
                self.body(),
                other.type_name()
            ))),
        }
    }

    /// Delete the value at the path.
    ///
    /// Empty containers left behind are removed as well: the deletion
    /// happens at the deepest container along the path that holds more
    /// than one key. In a read-only scope the root itself is never removed,
    /// so pruning stops at its first step. Array slots are cleared to
    /// `undefined` rather than spliced out, except the last slot, which is
    /// popped.
    pub fn delete(&self, scope: &dyn Scope) -> Result<()> {
        let root = self.root();
        let Some(mut current) = scope.lookup(root) else {
            return Ok(());
        };
        if self.steps.len() == 1 {
            return scope.remove(root);
        }
        let owner = current.clone();

        let mut cut: Option<(Value, &Step)> = None;
        for step in &self.steps[1..] {
            if !current.is_container() {
                return Ok(());
            }
            if key_count(&current) > 1 {
                cut = Some((current.clone(), step));
            }
            current = child(&current, step, &self.raw)?;
        }
        if current.is_undefined() {
            return Ok(());
        }

        match cut {
            Some((container, step)) => remove_child(&container, step),
            None if scope.is_read_only() => remove_child(&owner, &self.steps[1]),
            None if scope.len() > 1 => scope.remove(root),
            None => {
                // Nothing branches: clear the leaf itself.
                let (container, step) = self.parent_of_leaf(scope)?;
                remove_child(&container, step)
            }
        }
    }

    fn parent_of_leaf(&self, scope: &dyn Scope) -> Result<(Value, &Step)> {
        let depth = self.steps.len();
        Ok((self.resolve(scope, depth - 1)?, &self.steps[depth - 1]))
    }

    fn resolve(&self, scope: &dyn Scope, depth: usize) -> Result<Value> {
        let root = self.root();
        let mut current = scope
            .lookup(root)
            .ok_or_else(|| Error::reference(format!("{root} is not defined")))?;
        for step in &self.steps[1..depth] {
            current = child(&current, step, &self.raw)?;
        }
        Ok(current)
    }

    fn body(&self) -> &str {
        self.raw.strip_suffix("()").unwrap_or(&self.raw).trim_end()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

fn container_for(next: &Step) -> Value {
    if next.kind == StepKind::Index && next.property.parse::<usize>().is_ok() {
        Value::Array(Array::new())
    } else {
        Value::Object(Object::new())
    }
}

fn key_count(value: &Value) -> usize {
    match value {
        Value::Array(array) => array.len(),
        Value::Object(object) => object.len(),
        _ => 0,
    }
}

fn child(container: &Value, step: &Step, raw: &str) -> Result<Value> {
    match container {
        Value::Object(object) => Ok(object.get(&step.property)),
        Value::Array(array) => {
            if step.property == "length" {
                return Ok(Value::from(array.len()));
            }
            Ok(step
                .property
                .parse::<usize>()
                .map(|index| array.get(index))
                .unwrap_or_default())
        }
        other => Err(Error::type_error(format!(
            "cannot read '{}' of {} in '{raw}'",
            step.property,
            other.type_name()
        ))),
    }
}

fn put_child(container: &Value, step: &Step, value: Value, raw: &str) -> Result<()> {
    match container {
        Value::Object(object) => {
            object.set(step.property.clone(), value);
            Ok(())
        }
        Value::Array(array) => {
            if step.property == "length" {
                let len = value.to_number();
                if len.fract() != 0.0 || len < 0.0 {
                    return Err(Error::type_error(format!("invalid array length in '{raw}'")));
                }
                return array.set_len(len as usize);
            }
            let index = step.property.parse::<usize>().map_err(|_| {
                Error::type_error(format!(
                    "cannot set '{}' on an array in '{raw}'",
                    step.property
                ))
            })?;
            array.set(index, value)
        }
        other => Err(Error::type_error(format!(
            "cannot set '{}' on {} in '{raw}'",
            step.property,
            other.type_name()
        ))),
    }
}

fn remove_child(container: &Value, step: &Step) -> Result<()> {
    match container {
        Value::Object(object) => {
            object.delete(&step.property);
        }
        Value::Array(array) => {
            if let Ok(index) = step.property.parse::<usize>() {
                if index + 1 == array.len() {
                    array.pop();
                } else if index < array.len() {
                    array.set(index, Value::Undefined)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn path(source: &str) -> Path {
        Path::parse(source).unwrap()
    }

    fn json(value: &Value) -> String {
        value.to_json().to_string()
    }

    #[test]
    fn test_parse_steps() {
        let p = path("user.tags[0].name");
        let steps: Vec<_> = p
            .steps()
            .iter()
            .map(|s| format!("{}:{:?}", s.property, s.kind))
            .collect();
        assert_eq!(steps, vec!["user:Property", "tags:Property", "0:Index", "name:Property"]);
        assert!(!p.is_call());
        assert!(path("actions.save()").is_call());
        assert_eq!(path("a['b c']").steps()[1].property, "b c");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for source in ["", "a..b", ".a", "a.", "a[0", "[0]", "a[]", "a b", "a(b)"] {
            let err = Path::parse(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Syntax, "{source}");
        }
    }

    #[test]
    fn test_get() {
        let scope = Object::new();
        scope.set("user", Value::from_json(&serde_json::json!({ "tags": ["a", "b"] })));
        assert_eq!(path("user.tags[1]").get(&scope).unwrap(), Value::from("b"));
        assert_eq!(path("user.tags.length").get(&scope).unwrap(), Value::from(2));
        assert!(path("user.missing").get(&scope).unwrap().is_undefined());

        let err = path("nobody.name").get(&scope).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        let err = path("user.missing.deeper").get(&scope).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_set_creates_containers() {
        let scope = Object::new();
        path("a.list[1].name").set(&scope, Value::from("x"), true).unwrap();
        assert_eq!(json(&scope.get("a")), r#"{"list":[null,{"name":"x"}]}"#);
        assert_eq!(path("a.list[1].name").get(&scope).unwrap(), Value::from("x"));

        path("x['b c']").set(&scope, Value::from(1), true).unwrap();
        assert_eq!(json(&scope.get("x")), r#"{"b c":1}"#);
        assert_eq!(path("x['b c']").get(&scope).unwrap(), Value::from(1));
        path("y[0]['k']").set(&scope, Value::from(2), true).unwrap();
        assert_eq!(json(&scope.get("y")), r#"[{"k":2}]"#);
    }

    #[test]
    fn test_set_rejects_huge_indexes() {
        let scope = Object::new();
        scope.set("a", Vec::<Value>::new());
        for source in ["a[18446744073709551615]", "a[100000000000]"] {
            let err = path(source).set(&scope, Value::from(1), true).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Type, "{source}");
        }
        let err = path("a.length").set(&scope, Value::from(1e18), true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(path("a.length").get(&scope).unwrap(), Value::from(0));
    }

    #[test]
    fn test_set_without_replace_keeps_defined_value() {
        let scope = Object::new();
        scope.set("name", "kept");
        path("name").set(&scope, Value::from("new"), false).unwrap();
        assert_eq!(scope.get("name"), Value::from("kept"));
        path("form.title").set(&scope, Value::from("t"), false).unwrap();
        path("form.title").set(&scope, Value::from("u"), false).unwrap();
        assert_eq!(path("form.title").get(&scope).unwrap(), Value::from("t"));
    }

    #[test]
    fn test_call_binds_parent() {
        let scope = Object::new();
        let counter = Object::new();
        counter.set("count", 41);
        counter.set(
            "next",
            Value::function(|this, _| {
                let count = this.as_object().map(|o| o.get("count").to_number()).unwrap_or(0.0);
                Ok(Value::from(count + 1.0))
            }),
        );
        scope.set("counter", counter);
        assert_eq!(path("counter.next()").get(&scope).unwrap(), Value::from(42));

        let err = path("counter.count()").get(&scope).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_delete_prunes_empty_branches() {
        let scope = Object::new();
        scope.set("keep", 1);
        path("a.b.c").set(&scope, Value::from(1), true).unwrap();
        path("a.b.c").delete(&scope).unwrap();
        assert!(!scope.contains_key("a"));
        assert!(scope.contains_key("keep"));

        path("x.y").set(&scope, Value::from(1), true).unwrap();
        path("x.z").set(&scope, Value::from(2), true).unwrap();
        path("x.y").delete(&scope).unwrap();
        assert_eq!(json(&scope.get("x")), r#"{"z":2}"#);
    }

    #[test]
    fn test_delete_array_slot() {
        let scope = Object::new();
        scope.set("list", vec![Value::from(1), Value::from(2), Value::from(3)]);
        path("list[0]").delete(&scope).unwrap();
        path("list[2]").delete(&scope).unwrap();
        assert_eq!(json(&scope.get("list")), "[null,2]");
    }
}
