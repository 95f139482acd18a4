//! `*on="click: save"`.

use std::rc::Rc;

use super::{Binding, Marker};
use crate::dom::{Document, Event};
use crate::error::Result;
use crate::expression::Env;

/// Adds a listener that calls the bound function with the event and the
/// locals visible from the node. Nothing to update afterwards.
pub(super) fn create(binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
    let event = binding.require_name()?;
    let expression = binding.expression.clone();
    let context = binding.context.clone();
    binding.document.add_listener(
        binding.node,
        &event,
        Rc::new(move |document: &Document, event: &Event| {
            expression
                .call(Env::new(document, &context), vec![event.to_value()])
                .map(|_| ())
        }),
    );
    Ok(None)
}
