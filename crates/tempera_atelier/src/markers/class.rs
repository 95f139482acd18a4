//! `*class="path"` and `*class="name: path"`.

use tempera_carton::{CompactString, IndexSet};

use super::{Binding, Marker, UpdateContext};
use crate::changelog::{ChangeKind, Changelog, Key};
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::value::Value;

pub(super) fn create(binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
    Ok(Some(Box::new(ClassMarker {
        single: binding.name_arg().map(CompactString::from),
        applied: IndexSet::default(),
    })))
}

/// With a name, toggles that class on truthiness. Without one, the value is
/// a class set: an object of `name: flag`, an array or a space separated
/// string of names. Classes written in the markup are left alone unless the
/// set names them.
struct ClassMarker {
    single: Option<CompactString>,
    applied: IndexSet<CompactString>,
}

impl Marker for ClassMarker {
    fn update(
        &mut self,
        cx: &mut UpdateContext<'_>,
        value: &Value,
        changelog: &Changelog,
    ) -> Result<()> {
        let node = cx.node;
        let document = cx.document();
        if let Some(name) = &self.single {
            document.toggle_class(node, name, value.is_truthy());
            return Ok(());
        }

        if let (Changelog::Modify { changes }, Value::Object(object)) = (changelog, value) {
            for change in changes {
                let Key::Name(name) = change.target() else {
                    continue;
                };
                let on = change.kind != ChangeKind::Delete && object.get(name).is_truthy();
                self.toggle(document, node, name, on);
            }
            return Ok(());
        }

        let wanted = class_names(value)?;
        let stale: Vec<_> = self.applied.difference(&wanted).cloned().collect();
        for name in stale {
            self.toggle(document, node, &name, false);
        }
        for name in &wanted {
            self.toggle(document, node, name, true);
        }
        Ok(())
    }
}

impl ClassMarker {
    fn toggle(&mut self, document: &mut Document, node: NodeId, name: &str, on: bool) {
        document.toggle_class(node, name, on);
        if on {
            self.applied.insert(name.into());
        } else {
            self.applied.shift_remove(name);
        }
    }
}

fn class_names(value: &Value) -> Result<IndexSet<CompactString>> {
    let mut names = IndexSet::default();
    match value {
        Value::Object(object) => {
            for (name, flag) in object.entries() {
                if flag.is_truthy() {
                    names.insert(name);
                }
            }
        }
        Value::Array(array) => {
            for item in array.items().iter().filter(|item| !item.is_nullish()) {
                names.extend(
                    item.to_display_string()
                        .split_whitespace()
                        .map(CompactString::from),
                );
            }
        }
        Value::String(text) => {
            names.extend(text.split_whitespace().map(CompactString::from));
        }
        Value::Null | Value::Undefined => {}
        other => {
            return Err(Error::type_error(format!(
                "class set must be an object, array or string, got {}",
                other.type_name()
            )));
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_names() {
        let names = class_names(&Value::from("a  b")).unwrap();
        assert_eq!(names.len(), 2);
        let names = class_names(&Value::from(vec!["x y", "z"])).unwrap();
        assert!(names.contains("y") && names.contains("z"));
        assert!(class_names(&Value::from(3)).is_err());
    }
}
