//! Markup diagnostics.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::SourceLocation;

/// Markup error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    EofInTag = 1,
    EofInComment = 2,
    MissingEndTagName = 3,
    MissingEndTag = 4,
    InvalidEndTag = 5,
    UnterminatedInterpolation = 6,
    MissingMarkerName = 7,
}

impl ErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            Self::EofInTag => "Unexpected EOF in tag.",
            Self::EofInComment => "Unexpected EOF in comment.",
            Self::MissingEndTagName => "End tag name was expected.",
            Self::MissingEndTag => "Element is missing end tag.",
            Self::InvalidEndTag => "Invalid end tag.",
            Self::UnterminatedInterpolation => "Interpolation end sign was not found.",
            Self::MissingMarkerName => "Marker attribute is missing its name.",
        }
    }
}

/// A markup error with its location in the template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} ({})", .code.message(), location_label(.loc))]
pub struct MarkupError {
    pub code: ErrorCode,
    pub loc: Option<SourceLocation>,
}

impl MarkupError {
    pub fn new(code: ErrorCode, loc: Option<SourceLocation>) -> Self {
        Self { code, loc }
    }
}

fn location_label(loc: &Option<SourceLocation>) -> String {
    match loc {
        Some(loc) => format!("{}:{}", loc.start.line, loc.start.column),
        None => "unknown location".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;

    #[test]
    fn test_error_messages() {
        assert!(!ErrorCode::EofInTag.message().is_empty());
        assert!(!ErrorCode::MissingEndTag.message().is_empty());
        assert!(!ErrorCode::MissingMarkerName.message().is_empty());
    }

    #[test]
    fn test_display_includes_position() {
        let loc = SourceLocation::new(Position::new(5, 2, 3), Position::new(9, 2, 7), "<div>");
        let err = MarkupError::new(ErrorCode::MissingEndTag, Some(loc));
        assert_eq!(err.to_string(), "Element is missing end tag. (2:3)");
    }
}
