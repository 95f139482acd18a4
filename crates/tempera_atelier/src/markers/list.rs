//! `*foreach="path"` and `*foreach="alias: path"`.
//!
//! Keeps one fragment per key of an array or object, laid out after the
//! anchor in key order. Replacing the collection reconciles fragments by
//! value; mutating it in place follows the change list, so a shift or a
//! sort moves the existing fragments instead of rebuilding them.

use tempera_carton::{CompactString, FxHashMap, FxHashSet, IndexMap};

use super::{Binding, Marker, UpdateContext};
use crate::changelog::{Change, ChangeKind, Changelog, Key};
use crate::dom::{Document, Locals, NodeId};
use crate::error::{Error, Result};
use crate::fragment::VirtualFragment;
use crate::template::BlueprintId;
use crate::value::Value;

pub(super) fn create(binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
    let mut marker = ListMarker::new(binding.blueprint_arg()?);
    marker.alias = binding.name_arg().map(CompactString::from);
    Ok(Some(Box::new(marker)))
}

pub struct ListMarker {
    blueprint: BlueprintId,
    /// Extra local name for `item`
    alias: Option<CompactString>,
    fragments: IndexMap<Key, VirtualFragment>,
    length: usize,
}

impl ListMarker {
    pub fn new(blueprint: BlueprintId) -> Self {
        Self {
            blueprint,
            alias: None,
            fragments: IndexMap::default(),
            length: 0,
        }
    }

    /// Number of rendered entries.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Rebuild from a new collection, reusing fragments whose value matches.
    fn rebuild(&mut self, cx: &mut UpdateContext<'_>, entries: Vec<(Key, Value)>) -> Result<()> {
        let mut previous = std::mem::take(&mut self.fragments);
        let length = entries.len();
        let mut last = cx.node;
        let mut outcome = Ok(());
        for (index, (key, item)) in entries.into_iter().enumerate() {
            let mut fragment = match take_reusable(&mut previous, &key, &item) {
                Some(fragment) => fragment,
                None => match cx.instantiate(self.blueprint, Locals::default()) {
                    Ok(fragment) => fragment,
                    Err(err) => {
                        outcome = Err(err);
                        break;
                    }
                },
            };
            bind(self.alias.as_deref(), cx.document(), &mut fragment, &key, index, length, item);
            if !fragment.is_after(&cx.tree.document, last) {
                fragment.insert_after(cx.document(), last);
            }
            last = fragment.end();
            self.fragments.insert(key, fragment);
        }
        for (_, fragment) in previous {
            cx.remove_fragment(fragment);
        }
        self.length = length;
        outcome
    }

    /// Apply an in-place change list.
    ///
    /// Fragments named as the source of a move are claimed up front, so a
    /// value moving into a slot whose own fragment moves on later still finds
    /// its fragment. Entries are applied in listed order; deletes last.
    fn patch(
        &mut self,
        cx: &mut UpdateContext<'_>,
        entries: &[(Key, Value)],
        changes: &[Change],
    ) -> Result<()> {
        let positions: FxHashMap<&Key, usize> = entries
            .iter()
            .enumerate()
            .map(|(position, (key, _))| (key, position))
            .collect();
        let claimed: FxHashSet<&Key> = changes
            .iter()
            .filter(|change| change.kind == ChangeKind::Set)
            .filter_map(|change| change.old_key.as_ref())
            .collect();
        let mut detached: FxHashMap<Key, VirtualFragment> = claimed
            .iter()
            .filter_map(|&key| Some((key.clone(), self.fragments.swap_remove(key)?)))
            .collect();
        let mut orphans = Vec::new();
        let length = entries.len();

        let mut outcome = Ok(());
        for change in changes.iter().filter(|c| c.kind == ChangeKind::Set) {
            let key = change.target();
            let Some(&position) = positions.get(key) else {
                continue;
            };
            let reused = change.old_key.as_ref().and_then(|old| detached.remove(old));
            let fragment = match reused {
                Some(fragment) => {
                    orphans.extend(self.fragments.swap_remove(key));
                    Some(fragment)
                }
                None if claimed.contains(key) => None,
                None => self.fragments.swap_remove(key),
            };
            let mut fragment = match fragment {
                Some(fragment) => fragment,
                None => match cx.instantiate(self.blueprint, Locals::default()) {
                    Ok(fragment) => fragment,
                    Err(err) => {
                        outcome = Err(err);
                        break;
                    }
                },
            };
            let item = entries[position].1.clone();
            bind(self.alias.as_deref(), cx.document(), &mut fragment, key, position, length, item);
            let reference = self.predecessor(entries, position, cx.node);
            if !fragment.is_after(&cx.tree.document, reference) {
                fragment.insert_after(cx.document(), reference);
            }
            self.fragments.insert(key.clone(), fragment);
        }

        for change in changes.iter().filter(|c| c.kind == ChangeKind::Delete) {
            let key = change.target();
            if !positions.contains_key(key) {
                orphans.extend(self.fragments.swap_remove(key));
            }
        }
        for fragment in detached.into_values().chain(orphans) {
            cx.remove_fragment(fragment);
        }

        if outcome.is_ok() {
            self.fragments
                .sort_by_cached_key(|key, _| positions.get(key).copied().unwrap_or(usize::MAX));
            if length != self.length {
                let alias = self.alias.as_deref();
                for (position, (key, item)) in entries.iter().enumerate() {
                    if let Some(fragment) = self.fragments.get_mut(key) {
                        bind(alias, cx.document(), fragment, key, position, length, item.clone());
                    }
                }
            }
        }
        self.length = length;
        outcome
    }

    /// Node a fragment at `position` goes after: the end of the nearest
    /// rendered entry before it, or the anchor.
    fn predecessor(&self, entries: &[(Key, Value)], position: usize, anchor: NodeId) -> NodeId {
        entries[..position]
            .iter()
            .rev()
            .find_map(|(key, _)| self.fragments.get(key))
            .map_or(anchor, VirtualFragment::end)
    }
}

impl Marker for ListMarker {
    fn update(
        &mut self,
        cx: &mut UpdateContext<'_>,
        value: &Value,
        changelog: &Changelog,
    ) -> Result<()> {
        let entries = entries(value)?;
        let outcome = match changelog {
            Changelog::Modify { changes } => self.patch(cx, &entries, changes),
            Changelog::Set { .. } | Changelog::Delete { .. } => self.rebuild(cx, entries),
        };
        tracing::debug!(
            entries = self.fragments.len(),
            patched = matches!(changelog, Changelog::Modify { .. }),
            "list updated"
        );
        outcome
    }
}

/// Keys and values of the collection in iteration order.
fn entries(value: &Value) -> Result<Vec<(Key, Value)>> {
    match value {
        Value::Array(array) => Ok(array
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(index, item)| (Key::Index(index), item))
            .collect()),
        Value::Object(object) => Ok(object
            .entries()
            .into_iter()
            .map(|(name, item)| (Key::Name(name), item))
            .collect()),
        Value::Null | Value::Undefined => Ok(Vec::new()),
        other => Err(Error::type_error(format!(
            "cannot iterate over {}",
            other.type_name()
        ))),
    }
}

/// Prefer the fragment at the same key when it holds the same value, then
/// any fragment holding the value, then the same key for rebinding.
fn take_reusable(
    previous: &mut IndexMap<Key, VirtualFragment>,
    key: &Key,
    item: &Value,
) -> Option<VirtualFragment> {
    if previous.get(key).is_some_and(|f| f.value().same_value(item)) {
        return previous.shift_remove(key);
    }
    let matching = previous
        .iter()
        .find(|(_, fragment)| fragment.value().same_value(item))
        .map(|(key, _)| key.clone());
    match matching {
        Some(matching) => previous.shift_remove(&matching),
        None => previous.shift_remove(key),
    }
}

fn bind(
    alias: Option<&str>,
    document: &mut Document,
    fragment: &mut VirtualFragment,
    key: &Key,
    index: usize,
    length: usize,
    item: Value,
) {
    let locals = item_locals(alias, key, index, length, item.clone());
    fragment.set_locals(document, &locals);
    fragment.set_key(key.clone());
    fragment.set_value(item);
}

fn item_locals(alias: Option<&str>, key: &Key, index: usize, length: usize, item: Value) -> Locals {
    let mut locals = Locals::default();
    if let Some(alias) = alias {
        locals.insert(alias.into(), item.clone());
    }
    locals.insert("item".into(), item);
    locals.insert("key".into(), key.to_value());
    locals.insert("index".into(), Value::from(index));
    locals.insert("number".into(), Value::from(index + 1));
    locals.insert("length".into(), Value::from(length));
    locals.insert("first".into(), Value::Bool(index == 0));
    locals.insert("last".into(), Value::Bool(index + 1 == length));
    locals.insert("even".into(), Value::Bool(index % 2 == 0));
    locals.insert("odd".into(), Value::Bool(index % 2 == 1));
    locals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Array, Object};

    #[test]
    fn test_entries() {
        let array = Value::from(vec!["a", "b"]);
        let keys: Vec<_> = entries(&array).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Key::Index(0), Key::Index(1)]);

        let object = Object::new();
        object.set("x", 1);
        object.set("y", 2);
        let keys: Vec<_> = entries(&Value::Object(object))
            .unwrap()
            .into_iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(keys, vec!["x", "y"]);

        assert!(entries(&Value::Null).unwrap().is_empty());
        assert!(entries(&Value::Array(Array::new())).unwrap().is_empty());
        assert!(entries(&Value::from(5)).is_err());
    }

    #[test]
    fn test_item_locals() {
        let locals = item_locals(Some("row"), &Key::Index(2), 2, 3, Value::from("c"));
        assert_eq!(locals.get("row"), Some(&Value::from("c")));
        assert_eq!(locals.get("number"), Some(&Value::from(3)));
        assert_eq!(locals.get("last"), Some(&Value::Bool(true)));
        assert_eq!(locals.get("even"), Some(&Value::Bool(true)));
    }
}
