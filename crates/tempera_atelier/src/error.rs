//! Engine errors.
//!
//! Failures mirror the two classic script error families: a
//! [`Error::Reference`] for names that do not resolve (missing root property,
//! unknown marker, unknown filter, unknown sub-blueprint) and an
//! [`Error::Type`] for values of the wrong shape. Errors raised while a node
//! is compiled, instantiated or updated are wrapped in [`Error::AtNode`]
//! together with the node's opening tag.

use tempera_relief::MarkupError;
use thiserror::Error;

/// Broad error category, seen through node annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Reference,
    Type,
    Syntax,
    Markup,
    Config,
}

/// Errors produced by the engine
#[derive(Debug, Error)]
pub enum Error {
    /// A name did not resolve
    #[error("ReferenceError: {0}")]
    Reference(String),

    /// A value had the wrong shape
    #[error("TypeError: {0}")]
    Type(String),

    /// A binding or path expression could not be parsed
    #[error("SyntaxError: {0}")]
    Syntax(String),

    /// The template markup is malformed
    #[error("Failed to parse template: {0}")]
    Markup(#[from] MarkupError),

    /// Engine configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An error annotated with the node it happened at
    #[error("{source}\n    at {tag}")]
    AtNode { tag: String, source: Box<Error> },
}

impl Error {
    pub fn reference(message: impl Into<String>) -> Self {
        Self::Reference(message.into())
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    /// Category of the underlying error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Reference(_) => ErrorKind::Reference,
            Self::Type(_) => ErrorKind::Type,
            Self::Syntax(_) => ErrorKind::Syntax,
            Self::Markup(_) => ErrorKind::Markup,
            Self::Config(_) => ErrorKind::Config,
            Self::AtNode { source, .. } => source.kind(),
        }
    }

    /// Attach the opening tag of the node the error happened at.
    ///
    /// The innermost node wins: an already annotated error is returned as is.
    pub fn at_node(self, tag: impl Into<String>) -> Self {
        match self {
            annotated @ Self::AtNode { .. } => annotated,
            other => Self::AtNode {
                tag: tag.into(),
                source: Box::new(other),
            },
        }
    }

    /// Opening tag recorded by [`Error::at_node`], if any.
    pub fn node_tag(&self) -> Option<&str> {
        match self {
            Self::AtNode { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

/// Result alias used throughout the engine
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_sees_through_annotation() {
        let err = Error::reference("items is not defined").at_node("<li *foreach=\"items\">");
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.node_tag(), Some("<li *foreach=\"items\">"));
    }

    #[test]
    fn test_innermost_annotation_wins() {
        let err = Error::type_error("boom").at_node("<b>").at_node("<div>");
        assert_eq!(err.node_tag(), Some("<b>"));
    }

    #[test]
    fn test_display() {
        let err = Error::type_error("x is not a function").at_node("<button>");
        assert_eq!(err.to_string(), "TypeError: x is not a function\n    at <button>");
    }
}
