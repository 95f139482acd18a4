//! `*style="path"` and `*style="property: path"`.

use tempera_carton::{CompactString, IndexSet};

use super::{Binding, Marker, UpdateContext};
use crate::changelog::{ChangeKind, Changelog, Key};
use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::value::Value;

pub(super) fn create(binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
    Ok(Some(Box::new(StyleMarker {
        single: binding.name_arg().map(CompactString::from),
        applied: IndexSet::default(),
    })))
}

struct StyleMarker {
    single: Option<CompactString>,
    applied: IndexSet<CompactString>,
}

impl Marker for StyleMarker {
    fn update(
        &mut self,
        cx: &mut UpdateContext<'_>,
        value: &Value,
        changelog: &Changelog,
    ) -> Result<()> {
        let node = cx.node;
        let document = cx.document();
        if let Some(property) = &self.single {
            document.set_style(node, property, declaration(value).as_deref());
            return Ok(());
        }

        let object = match value {
            Value::Object(object) => object,
            Value::Null | Value::Undefined => {
                for property in std::mem::take(&mut self.applied) {
                    document.set_style(node, &property, None);
                }
                return Ok(());
            }
            other => {
                return Err(Error::type_error(format!(
                    "style map must be an object, got {}",
                    other.type_name()
                )));
            }
        };

        if let Changelog::Modify { changes } = changelog {
            for change in changes {
                let Key::Name(property) = change.target() else {
                    continue;
                };
                let declared = match change.kind {
                    ChangeKind::Delete => None,
                    _ => declaration(&object.get(property)),
                };
                self.apply(document, node, property, declared);
            }
            return Ok(());
        }

        let entries = object.entries();
        let stale: Vec<_> = self
            .applied
            .iter()
            .filter(|property| !object.contains_key(property))
            .cloned()
            .collect();
        for property in stale {
            self.apply(document, node, &property, None);
        }
        for (property, value) in entries {
            self.apply(document, node, &property, declaration(&value));
        }
        Ok(())
    }
}

impl StyleMarker {
    fn apply(
        &mut self,
        document: &mut Document,
        node: NodeId,
        property: &str,
        value: Option<CompactString>,
    ) {
        document.set_style(node, property, value.as_deref());
        match value {
            Some(_) => {
                self.applied.insert(property.into());
            }
            None => {
                self.applied.shift_remove(property);
            }
        }
    }
}

/// Nullish, `false` and empty strings clear the declaration.
fn declaration(value: &Value) -> Option<CompactString> {
    match value {
        Value::Null | Value::Undefined | Value::Bool(false) => None,
        other => Some(other.to_display_string()).filter(|text| !text.is_empty()),
    }
}
