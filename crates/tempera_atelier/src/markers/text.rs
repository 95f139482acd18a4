//! `{{ path }}` and `*text="path"`.

use super::{Binding, Marker, UpdateContext};
use crate::changelog::Changelog;
use crate::dom::NodeKind;
use crate::error::Result;
use crate::value::Value;

pub(super) fn create(_binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
    Ok(Some(Box::new(TextMarker)))
}

/// Writes the display string of its value; nullish renders as empty text.
struct TextMarker;

impl Marker for TextMarker {
    fn update(&mut self, cx: &mut UpdateContext<'_>, value: &Value, _: &Changelog) -> Result<()> {
        let text = if value.is_nullish() {
            Default::default()
        } else {
            value.to_display_string()
        };
        let node = cx.node;
        let document = cx.document();
        match document.get(node).map(|n| &n.kind) {
            Some(NodeKind::Element(_)) => document.replace_children_with_text(node, &text),
            _ => document.set_text(node, &text),
        }
        Ok(())
    }
}
