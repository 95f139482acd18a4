//! `*attr="name: path"`.

use tempera_carton::CompactString;

use super::{Binding, Marker, UpdateContext};
use crate::changelog::Changelog;
use crate::error::Result;
use crate::value::Value;

pub(super) fn create(binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
    let name = binding.require_name()?;
    Ok(Some(Box::new(AttrMarker { name })))
}

/// `false` and nullish remove the attribute, `true` sets it empty, anything
/// else sets its display string.
struct AttrMarker {
    name: CompactString,
}

impl Marker for AttrMarker {
    fn update(&mut self, cx: &mut UpdateContext<'_>, value: &Value, _: &Changelog) -> Result<()> {
        let node = cx.node;
        let document = cx.document();
        match value {
            Value::Bool(false) | Value::Null | Value::Undefined => {
                document.remove_attribute(node, &self.name)
            }
            Value::Bool(true) => document.set_attribute(node, &self.name, ""),
            other => document.set_attribute(node, &self.name, &other.to_display_string()),
        }
        Ok(())
    }
}
