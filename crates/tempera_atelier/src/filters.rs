//! Named value filters (`{{ price | number }}`, `*value="agreed | not"`).
//!
//! A filter transforms a value on its way from the context to the document
//! (`read`) and, for two-way bindings, on its way back (`write`).

use std::fmt;
use std::rc::Rc;

use tempera_carton::{CompactString, FxHashMap};

use crate::error::{Error, Result};
use crate::value::Value;

pub trait Filter {
    fn read(&self, value: Value, args: &[Value]) -> Result<Value>;

    /// Inverse transform used when a binding writes back. Identity by default.
    fn write(&self, value: Value, _args: &[Value]) -> Result<Value> {
        Ok(value)
    }
}

impl<F> Filter for F
where
    F: Fn(Value, &[Value]) -> Result<Value>,
{
    fn read(&self, value: Value, args: &[Value]) -> Result<Value> {
        self(value, args)
    }
}

/// Filter names to implementations.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: FxHashMap<CompactString, Rc<dyn Filter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `not`, `upper`, `lower`, `trim`, `number`, `string`,
    /// `default` and `json`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("not", Not);
        registry.register("number", Number);
        registry.register("upper", |value: Value, _: &[Value]| {
            Ok(Value::from(value.to_display_string().to_uppercase()))
        });
        registry.register("lower", |value: Value, _: &[Value]| {
            Ok(Value::from(value.to_display_string().to_lowercase()))
        });
        registry.register("trim", |value: Value, _: &[Value]| {
            Ok(Value::from(value.to_display_string().trim()))
        });
        registry.register("string", |value: Value, _: &[Value]| {
            Ok(if value.is_nullish() {
                Value::from("")
            } else {
                Value::String(value.to_display_string())
            })
        });
        registry.register("default", |value: Value, args: &[Value]| {
            let empty = value.is_nullish() || value.as_str().is_some_and(str::is_empty);
            Ok(if empty {
                args.first().cloned().unwrap_or_default()
            } else {
                value
            })
        });
        registry.register("json", |value: Value, _: &[Value]| {
            serde_json::to_string(&value.to_json())
                .map(Value::from)
                .map_err(|err| Error::type_error(err.to_string()))
        });
        registry
    }

    pub fn register(&mut self, name: impl Into<CompactString>, filter: impl Filter + 'static) {
        self.filters.insert(name.into(), Rc::new(filter));
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Filter>> {
        self.filters.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Look up `name` and bind `args` to it.
    pub fn bind(&self, name: &str, args: Vec<Value>) -> Result<BoundFilter> {
        let filter = self
            .get(name)
            .ok_or_else(|| Error::reference(format!("unknown filter '{name}'")))?;
        Ok(BoundFilter {
            name: name.into(),
            filter,
            args,
        })
    }
}

struct Not;

impl Filter for Not {
    fn read(&self, value: Value, _args: &[Value]) -> Result<Value> {
        Ok(Value::Bool(!value.is_truthy()))
    }

    fn write(&self, value: Value, _args: &[Value]) -> Result<Value> {
        Ok(Value::Bool(!value.is_truthy()))
    }
}

struct Number;

impl Filter for Number {
    fn read(&self, value: Value, _args: &[Value]) -> Result<Value> {
        Ok(Value::Number(value.to_number()))
    }

    fn write(&self, value: Value, _args: &[Value]) -> Result<Value> {
        Ok(Value::Number(value.to_number()))
    }
}

/// A filter with its arguments, as written in a binding.
#[derive(Clone)]
pub struct BoundFilter {
    name: CompactString,
    filter: Rc<dyn Filter>,
    args: Vec<Value>,
}

impl BoundFilter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read(&self, value: Value) -> Result<Value> {
        self.filter.read(value, &self.args)
    }

    pub fn write(&self, value: Value) -> Result<Value> {
        self.filter.write(value, &self.args)
    }
}

impl fmt::Debug for BoundFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundFilter")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish()
    }
}
