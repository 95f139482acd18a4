//! `*value="path"`: two-way binding of form controls.
//!
//! The control's state is written from the bound value on every change, and
//! the listener writes user edits back through the expression (running the
//! filters in reverse). An edit written back is remembered so the update it
//! triggers does not rewrite the control with the value it just produced.

use std::cell::RefCell;
use std::rc::Rc;

use tempera_carton::CompactString;

use super::{Binding, Marker, UpdateContext};
use crate::changelog::Changelog;
use crate::dom::{Document, Event, NodeId};
use crate::error::{Error, Result};
use crate::expression::{Env, Expression};
use crate::value::{Array, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Text,
    Checkbox,
    Radio,
    Select { multiple: bool },
}

impl Control {
    fn detect(document: &Document, node: NodeId) -> Result<Self> {
        let element = document
            .element(node)
            .ok_or_else(|| Error::type_error("'value' binds form controls only"))?;
        match element.tag.as_str() {
            "input" => Ok(match element.attribute("type").as_deref() {
                Some("checkbox") => Self::Checkbox,
                Some("radio") => Self::Radio,
                _ => Self::Text,
            }),
            "textarea" => Ok(Self::Text),
            "select" => Ok(Self::Select {
                multiple: element.attribute("multiple").is_some(),
            }),
            tag => Err(Error::type_error(format!(
                "'value' binds form controls only, not <{tag}>"
            ))),
        }
    }

    fn events(self) -> &'static [&'static str] {
        match self {
            Self::Text => &["input", "change"],
            Self::Checkbox | Self::Radio | Self::Select { .. } => &["change"],
        }
    }
}

type Pending = Rc<RefCell<Option<Value>>>;

pub(super) fn create(binding: &mut Binding<'_>) -> Result<Option<Box<dyn Marker>>> {
    let node = binding.node;
    let control = Control::detect(binding.document, node)?;
    let pending = Pending::default();

    for event in control.events() {
        let expression = binding.expression.clone();
        let context = binding.context.clone();
        let pending = pending.clone();
        binding.document.add_listener(
            node,
            event,
            Rc::new(move |document: &Document, _: &Event| {
                let env = Env::new(document, &context);
                if let Some(value) = read_control(document, node, control, &expression, env)? {
                    *pending.borrow_mut() = Some(value.clone());
                    expression.set(env, value, true)?;
                }
                Ok(())
            }),
        );
    }

    Ok(Some(Box::new(FormBinding {
        control,
        pending,
        primed: false,
    })))
}

struct FormBinding {
    control: Control,
    pending: Pending,
    primed: bool,
}

impl Marker for FormBinding {
    fn update(&mut self, cx: &mut UpdateContext<'_>, value: &Value, _: &Changelog) -> Result<()> {
        let node = cx.node;
        if !std::mem::replace(&mut self.primed, true) && value.is_undefined() {
            // Seed an unset path from the markup state of the control.
            let initial = read_control(&cx.tree.document, node, self.control, cx.expression, cx.env())?;
            if let Some(initial) = initial {
                cx.expression.set(cx.env(), initial, false)?;
            }
            return Ok(());
        }
        if let Some(written) = self.pending.borrow_mut().take() {
            if written.same_value(value) {
                return Ok(());
            }
        }
        write_control(cx.document(), node, self.control, value)
    }
}

/// Current control state as a value to write back, or `None` when there is
/// nothing to write (an unchecked radio, a checkbox array edited in place).
fn read_control(
    document: &Document,
    node: NodeId,
    control: Control,
    expression: &Expression,
    env: Env<'_>,
) -> Result<Option<Value>> {
    match control {
        Control::Text => {
            let value = document.property(node, "value");
            Ok(Some(if value.is_nullish() {
                Value::from("")
            } else {
                Value::from(value.to_display_string())
            }))
        }
        Control::Checkbox => {
            let checked = document.property(node, "checked").is_truthy();
            let Some(member) = document.attribute(node, "value") else {
                return Ok(Some(Value::Bool(checked)));
            };
            match expression.get(env)? {
                Value::Array(array) => {
                    let position = position_of(&array, &member);
                    match (checked, position) {
                        (true, None) => array.push(Value::from(member)),
                        (false, Some(index)) => {
                            array.remove(index);
                        }
                        _ => {}
                    }
                    Ok(None)
                }
                Value::Null | Value::Undefined => Ok(Some(Value::from(if checked {
                    vec![Value::from(member)]
                } else {
                    Vec::new()
                }))),
                other => Err(Error::type_error(format!(
                    "a checkbox with a value binds to an array, got {}",
                    other.type_name()
                ))),
            }
        }
        Control::Radio => {
            if !document.property(node, "checked").is_truthy() {
                return Ok(None);
            }
            let value = document
                .attribute(node, "value")
                .unwrap_or_else(|| CompactString::from("on"));
            Ok(Some(Value::from(value)))
        }
        Control::Select { multiple: false } => Ok(Some(
            options(document, node)
                .into_iter()
                .find(|&option| document.property(option, "selected").is_truthy())
                .map_or(Value::Null, |option| Value::from(option_value(document, option))),
        )),
        Control::Select { multiple: true } => Ok(Some(Value::from(
            options(document, node)
                .into_iter()
                .filter(|&option| document.property(option, "selected").is_truthy())
                .map(|option| Value::from(option_value(document, option)))
                .collect::<Vec<_>>(),
        ))),
    }
}

fn write_control(document: &mut Document, node: NodeId, control: Control, value: &Value) -> Result<()> {
    match control {
        Control::Text => {
            let text = if value.is_nullish() {
                CompactString::default()
            } else {
                value.to_display_string()
            };
            document.set_property(node, "value", Value::from(text));
        }
        Control::Checkbox => {
            let checked = match document.attribute(node, "value") {
                None => value.is_truthy(),
                Some(member) => match value {
                    Value::Array(array) => position_of(array, &member).is_some(),
                    Value::Null | Value::Undefined => false,
                    other => {
                        return Err(Error::type_error(format!(
                            "a checkbox with a value binds to an array, got {}",
                            other.type_name()
                        )));
                    }
                },
            };
            document.set_property(node, "checked", Value::Bool(checked));
        }
        Control::Radio => {
            let own = document
                .attribute(node, "value")
                .unwrap_or_else(|| CompactString::from("on"));
            let checked = !value.is_nullish() && value.to_display_string() == own;
            document.set_property(node, "checked", Value::Bool(checked));
        }
        Control::Select { multiple } => {
            let selected = |text: &str| -> Result<bool> {
                match value {
                    Value::Array(array) if multiple => Ok(position_of(array, text).is_some()),
                    Value::Null | Value::Undefined => Ok(false),
                    other if multiple => Err(Error::type_error(format!(
                        "a multiple select binds to an array, got {}",
                        other.type_name()
                    ))),
                    other => Ok(other.to_display_string() == text),
                }
            };
            for option in options(document, node) {
                let on = selected(&option_value(document, option))?;
                document.set_property(option, "selected", Value::Bool(on));
            }
        }
    }
    Ok(())
}

fn options(document: &Document, select: NodeId) -> Vec<NodeId> {
    document.find_elements(select, "option")
}

/// An option's `value` attribute, or its trimmed text.
fn option_value(document: &Document, option: NodeId) -> CompactString {
    document
        .attribute(option, "value")
        .unwrap_or_else(|| document.text_content(option).trim().into())
}

fn position_of(array: &Array, member: &str) -> Option<usize> {
    array
        .items()
        .iter()
        .position(|item| item.to_display_string() == member)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(document: &mut Document, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = document.create_element(tag);
        for (name, value) in attributes {
            document.set_attribute(id, name, value);
        }
        let root = document.root();
        document.append_child(root, id);
        id
    }

    #[test]
    fn test_detect() {
        let mut doc = Document::new();
        let checkbox = element(&mut doc, "input", &[("type", "checkbox")]);
        let text = element(&mut doc, "textarea", &[]);
        let select = element(&mut doc, "select", &[("multiple", "")]);
        let div = element(&mut doc, "div", &[]);
        assert_eq!(Control::detect(&doc, checkbox).unwrap(), Control::Checkbox);
        assert_eq!(Control::detect(&doc, text).unwrap(), Control::Text);
        assert_eq!(
            Control::detect(&doc, select).unwrap(),
            Control::Select { multiple: true }
        );
        assert!(Control::detect(&doc, div).is_err());
    }

    #[test]
    fn test_write_select() {
        let mut doc = Document::new();
        let select = element(&mut doc, "select", &[]);
        let a = doc.create_element("option");
        doc.set_attribute(a, "value", "a");
        let b = doc.create_element("option");
        let label = doc.create_text(" b ");
        doc.append_child(b, label);
        doc.append_child(select, a);
        doc.append_child(select, b);

        write_control(&mut doc, select, Control::Select { multiple: false }, &Value::from("b"))
            .unwrap();
        assert_eq!(doc.property(a, "selected"), Value::Bool(false));
        assert_eq!(doc.property(b, "selected"), Value::Bool(true));

        let err = write_control(&mut doc, select, Control::Select { multiple: true }, &Value::from(1))
            .unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_write_radio() {
        let mut doc = Document::new();
        let radio = element(&mut doc, "input", &[("type", "radio"), ("value", "2")]);
        write_control(&mut doc, radio, Control::Radio, &Value::from(2)).unwrap();
        assert_eq!(doc.property(radio, "checked"), Value::Bool(true));
        write_control(&mut doc, radio, Control::Radio, &Value::Null).unwrap();
        assert_eq!(doc.property(radio, "checked"), Value::Bool(false));
    }
}
