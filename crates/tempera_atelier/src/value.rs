//! Dynamic values held by a render context.
//!
//! Containers ([`Array`] and [`Object`]) are shared handles: cloning one
//! clones the handle, not the data, so identity survives being passed
//! around. Every mutation goes through a method on the handle, which lets
//! observed containers report what changed.

use std::cell::{Ref, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use tempera_carton::{CompactString, IndexMap, ToCompactString};

use crate::changelog::{self, Change, ChangeKind, Key};
use crate::error::{Error, Result};
use crate::observer::Links;

/// Native callable stored in a context, invoked with `this` and arguments.
pub type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value>;

/// A dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(CompactString),
    Array(Array),
    Object(Object),
    Function(Function),
}

impl Value {
    /// Wrap a native function.
    pub fn function(f: impl Fn(&Value, &[Value]) -> Result<Value> + 'static) -> Self {
        Self::Function(Function(Rc::new(f)))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// `undefined` or `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Arrays and objects, the values that have identity.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Object(_))
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) => true,
        }
    }

    /// Strict equality: primitives by value, containers and functions by
    /// identity. `NaN` is not equal to itself.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Like [`Value::strict_eq`], but `NaN` equals `NaN`.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_eq(other),
        }
    }

    /// Whether both values are the same container.
    pub fn same_container(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Numeric conversion, `NaN` when there is none.
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Array(_) | Self::Object(_) | Self::Function(_) => f64::NAN,
        }
    }

    /// Text used when a value is written into the document.
    pub fn to_display_string(&self) -> CompactString {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(b) => if *b { "true" } else { "false" }.into(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Array(array) => {
                let mut out = CompactString::default();
                for (i, item) in array.to_vec().iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    if !item.is_nullish() {
                        out.push_str(&item.to_display_string());
                    }
                }
                out
            }
            Self::Object(_) => "[object Object]".into(),
            Self::Function(_) => "function".into(),
        }
    }

    /// Convert from JSON data. Numbers become `f64`.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s.into()),
            serde_json::Value::Array(items) => {
                Self::Array(Array::from_vec(items.iter().map(Self::from_json).collect()))
            }
            serde_json::Value::Object(map) => Self::Object(Object::from_entries(
                map.iter().map(|(k, v)| (CompactString::from(k.as_str()), Self::from_json(v))),
            )),
        }
    }

    /// Convert to JSON data. `undefined` and functions become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null | Self::Function(_) => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serde_json::Value::Number((*n as i64).into())
            }
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Array(array) => {
                serde_json::Value::Array(array.to_vec().iter().map(Self::to_json).collect())
            }
            Self::Object(object) => serde_json::Value::Object(
                object
                    .entries()
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn format_number(n: f64) -> CompactString {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        // -0 prints as 0
        (n as i64).to_compact_string()
    } else {
        n.to_compact_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(array) => f.debug_list().entries(array.to_vec().iter()).finish(),
            Self::Object(object) => f.debug_map().entries(object.entries()).finish(),
            Self::Function(_) => f.write_str("[function]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s.into())
    }
}

impl From<CompactString> for Value {
    fn from(s: CompactString) -> Self {
        Self::String(s)
    }
}

impl From<Array> for Value {
    fn from(array: Array) -> Self {
        Self::Array(array)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(Array::from_vec(items.into_iter().map(Into::into).collect()))
    }
}

/// Shared handle to a native function.
#[derive(Clone)]
pub struct Function(Rc<NativeFn>);

impl Function {
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value> {
        (self.0)(this, args)
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

struct ArrayData {
    items: RefCell<Vec<Value>>,
    links: Links,
}

/// Shared, observable list of values.
#[derive(Clone)]
pub struct Array(Rc<ArrayData>);

/// Longest array a write may grow to.
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

fn check_length(len: Option<usize>) -> Result<()> {
    match len {
        Some(len) if len <= MAX_ARRAY_LENGTH => Ok(()),
        _ => Err(Error::type_error(format!(
            "array length exceeds {MAX_ARRAY_LENGTH}"
        ))),
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl Array {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayData {
            items: RefCell::new(items),
            links: Links::default(),
        }))
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn links(&self) -> &Links {
        &self.0.links
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Item at `index`, `undefined` when out of range.
    pub fn get(&self, index: usize) -> Value {
        self.0.items.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Borrow the items. Do not mutate the array while holding this.
    pub fn items(&self) -> Ref<'_, Vec<Value>> {
        self.0.items.borrow()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.position(value).is_some()
    }

    pub fn position(&self, value: &Value) -> Option<usize> {
        self.0.items.borrow().iter().position(|item| item.strict_eq(value))
    }

    /// Replace the item at `index`, padding with `undefined` past the end.
    ///
    /// Growing past [`MAX_ARRAY_LENGTH`] is an error.
    pub fn set(&self, index: usize, value: Value) -> Result<()> {
        if index >= self.len() {
            check_length(index.checked_add(1))?;
        }
        self.mutate(|items| {
            if index >= items.len() {
                items.resize(index + 1, Value::Undefined);
            }
            items[index] = value;
        });
        Ok(())
    }

    pub fn push(&self, value: Value) {
        self.mutate(|items| items.push(value));
    }

    pub fn pop(&self) -> Value {
        self.mutate(|items| items.pop().unwrap_or_default())
    }

    pub fn shift(&self) -> Value {
        self.mutate(|items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        })
    }

    pub fn unshift(&self, value: Value) {
        self.mutate(|items| items.insert(0, value));
    }

    pub fn insert(&self, index: usize, value: Value) {
        self.mutate(|items| {
            let index = index.min(items.len());
            items.insert(index, value);
        });
    }

    pub fn remove(&self, index: usize) -> Value {
        self.mutate(|items| {
            if index < items.len() {
                items.remove(index)
            } else {
                Value::Undefined
            }
        })
    }

    /// Remove `delete_count` items at `start` and insert `insert` in their
    /// place, returning the removed items.
    pub fn splice(&self, start: usize, delete_count: usize, insert: Vec<Value>) -> Vec<Value> {
        self.mutate(|items| {
            let start = start.min(items.len());
            let end = (start + delete_count).min(items.len());
            items.splice(start..end, insert).collect()
        })
    }

    /// Set the length, padding with `undefined` or truncating.
    pub fn set_len(&self, len: usize) -> Result<()> {
        check_length(Some(len))?;
        self.mutate(|items| items.resize(len, Value::Undefined));
        Ok(())
    }

    /// Drop everything past `len`. Shorter arrays are left alone.
    pub fn truncate(&self, len: usize) {
        if len < self.len() {
            self.mutate(|items| items.truncate(len));
        }
    }

    pub fn reverse(&self) {
        self.mutate(|items| items.reverse());
    }

    /// Sort by display string, `undefined` last.
    pub fn sort(&self) {
        self.sort_by(|a, b| match (a.is_undefined(), b.is_undefined()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.to_display_string().cmp(&b.to_display_string()),
        });
    }

    pub fn sort_by(&self, compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.mutate(|items| items.sort_by(compare));
    }

    /// Replace every item at once.
    pub fn replace_all(&self, values: Vec<Value>) {
        self.mutate(|items| *items = values);
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let before = self
            .0
            .links
            .is_observed()
            .then(|| self.0.items.borrow().clone());
        let result = f(&mut self.0.items.borrow_mut());
        if let Some(before) = before {
            let after = self.to_vec();
            let changes = changelog::diff_items(&before, &after);
            if !changes.is_empty() {
                for change in &changes {
                    if change.kind == ChangeKind::Set {
                        let value = change.key.as_index().map(|i| after[i].clone());
                        self.0.links.adopt(None, &value.unwrap_or_default());
                    }
                }
                self.0.links.notify(changes);
            }
        }
        result
    }
}

struct ObjectData {
    entries: RefCell<IndexMap<CompactString, Value>>,
    links: Links,
}

/// Shared, observable record with insertion-ordered keys.
#[derive(Clone)]
pub struct Object(Rc<ObjectData>);

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Object {
    pub fn new() -> Self {
        Self(Rc::new(ObjectData {
            entries: RefCell::new(IndexMap::new()),
            links: Links::default(),
        }))
    }

    pub fn from_entries<K: Into<CompactString>>(
        entries: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        let object = Self::new();
        object
            .0
            .entries
            .borrow_mut()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        object
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn links(&self) -> &Links {
        &self.0.links
    }

    pub fn len(&self) -> usize {
        self.0.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.entries.borrow().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.entries.borrow().contains_key(key)
    }

    /// Value under `key`, `undefined` when absent.
    pub fn get(&self, key: &str) -> Value {
        self.0.entries.borrow().get(key).cloned().unwrap_or_default()
    }

    /// Value under `key`, `None` when absent.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.0.entries.borrow().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<CompactString> {
        self.0.entries.borrow().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(CompactString, Value)> {
        self.0
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Set `key`, returning the previous value. New keys are appended.
    pub fn set(&self, key: impl Into<CompactString>, value: impl Into<Value>) -> Value {
        let key = key.into();
        let value = value.into();
        let previous = self
            .0
            .entries
            .borrow_mut()
            .insert(key.clone(), value.clone());
        let old_value = previous.clone().unwrap_or_default();
        if self.0.links.is_observed() && (previous.is_none() || !old_value.same_value(&value)) {
            self.0.links.adopt(Some(key.as_str()), &value);
            let change = Change::set(Key::Name(key), old_value.clone());
            self.0.links.notify(vec![change]);
        }
        old_value
    }

    /// Remove `key`, keeping the order of the remaining keys.
    pub fn delete(&self, key: &str) -> Option<Value> {
        let removed = self.0.entries.borrow_mut().shift_remove(key);
        if let Some(old_value) = &removed {
            if self.0.links.is_observed() {
                let change = Change::delete(Key::Name(key.into()), old_value.clone());
                self.0.links.notify(vec![change]);
            }
        }
        removed
    }
}
