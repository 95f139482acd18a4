//! Binding syntax inside marker attributes and interpolations.
//!
//! ```text
//! binding  := pair (";" pair)*
//! pair     := [arg ":"] expr
//! expr     := path ("|" filter)*
//! filter   := name [":" literal ("," literal)*]
//! ```
//!
//! A path starting with the local sentinel (`@item.name`) is local-scoped.
//! Separators inside quoted literals are ignored.

use tempera_carton::{smallvec, CompactString, SmallVec};

use crate::error::{Error, Result};
use crate::value::Value;

/// A filter name and its literal arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: CompactString,
    pub args: Vec<Value>,
}

/// An expression as written: path text, scope and filters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionSource {
    pub path: CompactString,
    pub local: bool,
    pub filters: Vec<FilterCall>,
}

/// One `arg: expression` pair of a binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingPair {
    pub arg: Option<CompactString>,
    pub expression: ExpressionSource,
}

/// Parse a full binding (`"click: save; keyup: check"`).
pub fn parse_binding(source: &str, sentinel: char) -> Result<SmallVec<[BindingPair; 1]>> {
    let mut pairs = smallvec![];
    for part in split_unquoted(source, ';') {
        if part.trim().is_empty() {
            continue;
        }
        pairs.push(parse_pair(part, sentinel)?);
    }
    if pairs.is_empty() {
        return Err(Error::syntax(format!("empty binding '{}'", source.trim())));
    }
    Ok(pairs)
}

fn parse_pair(source: &str, sentinel: char) -> Result<BindingPair> {
    if let Some((head, rest)) = split_once_unquoted(source, ':') {
        let head = head.trim();
        if !head.contains('|') && is_arg(head) {
            return Ok(BindingPair {
                arg: Some(head.into()),
                expression: parse_expression(rest, sentinel)?,
            });
        }
    }
    Ok(BindingPair {
        arg: None,
        expression: parse_expression(source, sentinel)?,
    })
}

/// Parse `path | filter: arg, arg | filter`.
pub fn parse_expression(source: &str, sentinel: char) -> Result<ExpressionSource> {
    let mut segments = split_unquoted(source, '|').into_iter();
    let head = segments.next().unwrap_or_default().trim();
    let (path, local) = match head.strip_prefix(sentinel) {
        Some(rest) => (rest.trim_start(), true),
        None => (head, false),
    };
    if path.is_empty() {
        return Err(Error::syntax(format!("missing path in '{}'", source.trim())));
    }

    let mut filters = Vec::new();
    for segment in segments {
        let (name, args) = match split_once_unquoted(segment, ':') {
            Some((name, args)) => (
                name.trim(),
                split_unquoted(args, ',').into_iter().map(parse_literal).collect(),
            ),
            None => (segment.trim(), Vec::new()),
        };
        if !is_arg(name) {
            return Err(Error::syntax(format!("invalid filter name '{name}'")));
        }
        filters.push(FilterCall {
            name: name.into(),
            args,
        });
    }

    Ok(ExpressionSource {
        path: path.into(),
        local,
        filters,
    })
}

/// Literal filter argument: quoted string, number, boolean, `null`,
/// `undefined`, or else the bare text.
pub fn parse_literal(source: &str) -> Value {
    let text = source.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = text.strip_prefix(quote).and_then(|t| t.strip_suffix(quote)) {
            return Value::from(inner);
        }
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        "undefined" => Value::Undefined,
        _ => text
            .parse::<f64>()
            .map(Value::Number)
            .unwrap_or_else(|_| Value::from(text)),
    }
}

fn is_arg(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn split_unquoted(source: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in source.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == separator => {
                parts.push(&source[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&source[start..]);
    parts
}

fn split_once_unquoted(source: &str, separator: char) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    for (i, c) in source.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == separator => return Some((&source[..i], &source[i + c.len_utf8()..])),
            None => {}
        }
    }
    None
}
