//! Parser options.

use serde::{Deserialize, Serialize};
use tempera_carton::CompactString;

/// Whitespace handling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhitespaceStrategy {
    /// Condense whitespace (default)
    #[default]
    Condense,
    /// Preserve all whitespace
    Preserve,
}

/// Parser options
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Prefix that turns an attribute into a marker attribute (`*if`)
    pub marker_prefix: u8,
    /// Prefix of the property shorthand (`.value`)
    pub property_prefix: u8,
    /// Delimiters for interpolation (default: ["{{", "}}"])
    pub delimiters: (CompactString, CompactString),
    /// Whitespace handling
    pub whitespace: WhitespaceStrategy,
    /// Whether is a void tag
    pub is_void_tag: fn(&str) -> bool,
    /// Keep comments in the tree
    pub comments: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            marker_prefix: b'*',
            property_prefix: b'.',
            delimiters: (CompactString::from("{{"), CompactString::from("}}")),
            whitespace: WhitespaceStrategy::Condense,
            is_void_tag: tempera_carton::is_void_tag,
            comments: false,
        }
    }
}
