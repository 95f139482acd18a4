//! `.name="path"` and `*prop="name: path"`.

use tempera_carton::CompactString;

use super::{Binding, Marker, UpdateContext};
use crate::changelog::Changelog;
use crate::error::Result;
use crate::value::Value;

pub(super) fn create(binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
    let name = binding.require_name()?;
    Ok(Some(Box::new(PropMarker { name })))
}

/// Assigns a live element property. `textContent` and `innerText` replace
/// the element's children with a text node instead.
struct PropMarker {
    name: CompactString,
}

impl Marker for PropMarker {
    fn update(&mut self, cx: &mut UpdateContext<'_>, value: &Value, _: &Changelog) -> Result<()> {
        let node = cx.node;
        let document = cx.document();
        match self.name.as_str() {
            "textContent" | "innerText" => {
                let text = if value.is_nullish() {
                    CompactString::default()
                } else {
                    value.to_display_string()
                };
                document.replace_children_with_text(node, &text);
            }
            name => document.set_property(node, name, value.clone()),
        }
        Ok(())
    }
}
