//! Change descriptions for bound values.
//!
//! A [`Changelog`] tells a marker how a value changed between two passes:
//! either it was replaced wholesale ([`Changelog::Set`]) or the same container
//! was mutated in place ([`Changelog::Modify`]), in which case each entry
//! describes one key. Array entries may carry an `old_key`, the index the new
//! value was found at before the mutation, which is what lets list markers
//! move existing nodes instead of rebuilding them.

use std::fmt;

use tempera_carton::{CompactString, FxHashMap, ToCompactString};

use crate::value::Value;

/// Key inside a container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(CompactString),
}

impl Key {
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Name(_) => None,
        }
    }

    /// The key as a value: a number for indexes, a string for names.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Index(index) => Value::from(*index),
            Self::Name(name) => Value::String(name.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::Name(name.to_compact_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Set,
    Modify,
    Delete,
}

/// One changed key of a container.
#[derive(Debug, Clone)]
pub struct Change {
    pub key: Key,
    pub kind: ChangeKind,
    pub old_value: Value,
    /// Where the new value lived before the mutation
    pub old_key: Option<Key>,
    /// Where the value now lives, when it differs from `key`
    pub new_key: Option<Key>,
}

impl Change {
    pub fn set(key: Key, old_value: Value) -> Self {
        Self {
            key,
            kind: ChangeKind::Set,
            old_value,
            old_key: None,
            new_key: None,
        }
    }

    pub fn moved(key: Key, old_value: Value, old_key: Key) -> Self {
        Self {
            old_key: Some(old_key),
            ..Self::set(key, old_value)
        }
    }

    pub fn delete(key: Key, old_value: Value) -> Self {
        Self {
            kind: ChangeKind::Delete,
            ..Self::set(key, old_value)
        }
    }

    /// Key the change applies to after the mutation.
    pub fn target(&self) -> &Key {
        self.new_key.as_ref().unwrap_or(&self.key)
    }
}

/// How a bound value changed since the previous pass.
#[derive(Debug, Clone)]
pub enum Changelog {
    /// Replaced (or seen for the first time)
    Set { old_value: Value },
    /// The same container, mutated in place
    Modify { changes: Vec<Change> },
    /// Removed from its parent
    Delete { old_value: Value },
}

impl Changelog {
    pub fn initial() -> Self {
        Self::Set {
            old_value: Value::Undefined,
        }
    }

    pub fn changes(&self) -> &[Change] {
        match self {
            Self::Modify { changes } => changes,
            Self::Set { .. } | Self::Delete { .. } => &[],
        }
    }
}

/// Shallow copy of a container taken at the end of a pass.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Items(Vec<Value>),
    Entries(Vec<(CompactString, Value)>),
}

impl Snapshot {
    /// Capture a container; primitives have nothing to capture.
    pub fn capture(value: &Value) -> Option<Self> {
        match value {
            Value::Array(array) => Some(Self::Items(array.to_vec())),
            Value::Object(object) => Some(Self::Entries(object.entries())),
            _ => None,
        }
    }

    /// Changes between the snapshot and the current state of `value`.
    pub fn changes(&self, value: &Value) -> Vec<Change> {
        match (self, value) {
            (Self::Items(old), Value::Array(array)) => diff_items(old, &array.items()),
            (Self::Entries(old), Value::Object(object)) => diff_entries(old, &object.entries()),
            _ => Vec::new(),
        }
    }
}

/// Diff two item lists.
///
/// An index holding the same value as before is unchanged. Otherwise the new
/// value is looked up among the old items not yet accounted for; a hit is
/// reported as a move via `old_key`, a miss as a plain set. Old indexes past
/// the new length are deleted.
pub fn diff_items(old: &[Value], new: &[Value]) -> Vec<Change> {
    let mut used = vec![false; old.len()];
    for (i, value) in new.iter().enumerate() {
        if old.get(i).is_some_and(|o| o.same_value(value)) {
            used[i] = true;
        }
    }

    let mut changes = Vec::new();
    for (i, value) in new.iter().enumerate() {
        if used.get(i).copied().unwrap_or(false) && old[i].same_value(value) {
            continue;
        }
        let old_value = old.get(i).cloned().unwrap_or_default();
        let found = (0..old.len()).find(|&j| !used[j] && old[j].same_value(value));
        match found {
            Some(j) => {
                used[j] = true;
                changes.push(Change::moved(Key::Index(i), old_value, Key::Index(j)));
            }
            None => changes.push(Change::set(Key::Index(i), old_value)),
        }
    }
    for (i, old_value) in old.iter().enumerate().skip(new.len()) {
        changes.push(Change::delete(Key::Index(i), old_value.clone()));
    }
    changes
}

/// Diff two key/value records: added or replaced keys are sets, missing
/// keys are deletes.
///
/// Key order matters too. A key kept from the old record whose predecessor
/// among the kept keys changed (a key deleted and inserted again lands
/// last) is reported as a move onto itself, so list markers re-position it.
/// Changes are listed in the new key order, deletes last.
pub fn diff_entries(old: &[(CompactString, Value)], new: &[(CompactString, Value)]) -> Vec<Change> {
    let previous: FxHashMap<&str, &Value> = old.iter().map(|(k, v)| (k.as_str(), v)).collect();
    let current: FxHashMap<&str, &Value> = new.iter().map(|(k, v)| (k.as_str(), v)).collect();
    let old_before = kept_predecessors(old, &current);
    let new_before = kept_predecessors(new, &previous);

    let mut changes = Vec::new();
    for (key, value) in new {
        let name = Key::Name(key.clone());
        let Some(old_value) = previous.get(key.as_str()) else {
            changes.push(Change::set(name, Value::Undefined));
            continue;
        };
        let old_value = (*old_value).clone();
        if old_before.get(key.as_str()) != new_before.get(key.as_str()) {
            changes.push(Change::moved(name.clone(), old_value, name));
        } else if !old_value.same_value(value) {
            changes.push(Change::set(name, old_value));
        }
    }
    for (key, old_value) in old {
        if !current.contains_key(key.as_str()) {
            changes.push(Change::delete(Key::Name(key.clone()), old_value.clone()));
        }
    }
    changes
}

/// For each key also present in `other`, the previous such key.
fn kept_predecessors<'a>(
    entries: &'a [(CompactString, Value)],
    other: &FxHashMap<&str, &Value>,
) -> FxHashMap<&'a str, Option<&'a str>> {
    let mut before = None;
    let mut predecessors = FxHashMap::default();
    for (key, _) in entries {
        if other.contains_key(key.as_str()) {
            predecessors.insert(key.as_str(), before);
            before = Some(key.as_str());
        }
    }
    predecessors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::from(*s)).collect()
    }

    fn describe(changes: &[Change]) -> Vec<String> {
        changes
            .iter()
            .map(|c| match (&c.kind, &c.old_key) {
                (ChangeKind::Set, Some(old)) => format!("set {} <- {}", c.key, old),
                (ChangeKind::Set, None) => format!("set {}", c.key),
                (ChangeKind::Delete, _) => format!("delete {}", c.key),
                (ChangeKind::Modify, _) => format!("modify {}", c.key),
            })
            .collect()
    }

    #[test]
    fn test_shift_reports_moves() {
        let changes = diff_items(&strings(&["4", "2", "3", "1"]), &strings(&["2", "3", "1"]));
        insta::assert_debug_snapshot!(describe(&changes), @r#"
        [
            "set 0 <- 1",
            "set 1 <- 2",
            "set 2 <- 3",
            "delete 3",
        ]
        "#);
    }

    #[test]
    fn test_unchanged_indexes_are_skipped() {
        let changes = diff_items(&strings(&["a", "b", "c"]), &strings(&["a", "x", "c"]));
        assert_eq!(describe(&changes), vec!["set 1"]);
        assert_eq!(changes[0].old_value, Value::from("b"));
    }

    #[test]
    fn test_swap() {
        let changes = diff_items(&strings(&["a", "b"]), &strings(&["b", "a"]));
        assert_eq!(describe(&changes), vec!["set 0 <- 1", "set 1 <- 0"]);
    }

    #[test]
    fn test_duplicates_are_claimed_once() {
        let changes = diff_items(&strings(&["a", "b"]), &strings(&["b", "b", "a"]));
        assert_eq!(describe(&changes), vec!["set 0", "set 2 <- 0"]);
    }

    #[test]
    fn test_entries() {
        let old = vec![("one".into(), Value::from(true)), ("two".into(), Value::from(false))];
        let new = vec![("two".into(), Value::from(true)), ("three".into(), Value::Null)];
        let changes = diff_entries(&old, &new);
        assert_eq!(describe(&changes), vec!["set two", "set three", "delete one"]);
        assert_eq!(changes[0].old_value, Value::from(false));
    }

    #[test]
    fn test_reinserted_key_is_moved() {
        let entries = |keys: &[&str]| -> Vec<(CompactString, Value)> {
            keys.iter().map(|k| ((*k).into(), Value::from(*k))).collect()
        };
        let changes = diff_entries(&entries(&["x", "y", "z"]), &entries(&["x", "z", "y"]));
        assert_eq!(describe(&changes), vec!["set z <- z", "set y <- y"]);

        let changes = diff_entries(&entries(&["a", "b", "c"]), &entries(&["a", "c", "d"]));
        assert_eq!(describe(&changes), vec!["set d", "delete b"]);
    }

    #[test]
    fn test_snapshot_of_primitive_is_empty() {
        assert!(Snapshot::capture(&Value::from(1)).is_none());
    }
}
