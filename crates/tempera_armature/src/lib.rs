//! Armature - The structural parser for Tempera templates.
//!
//! ```
//! use tempera_armature::parse;
//! use tempera_relief::MarkupNode;
//!
//! let (root, errors) = parse(r#"<ul><li *foreach="items">{{ @item }}</li></ul>"#);
//! assert!(errors.is_empty());
//! assert!(matches!(root.children[0], MarkupNode::Element(_)));
//! ```

pub mod parser;
pub mod tokenizer;

pub use parser::{parse, parse_with_options, Parser};
pub use tokenizer::{Callbacks, QuoteType, Tokenizer};
