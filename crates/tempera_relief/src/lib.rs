//! Relief - The markup AST for Tempera templates.
//!
//! The parser in `tempera_armature` produces these nodes; the template
//! compiler in `tempera_atelier` consumes them once and turns them into
//! blueprints, so every node here is plain owned data.

pub mod ast;
pub mod errors;
pub mod options;

pub use ast::*;
pub use errors::{ErrorCode, MarkupError};
pub use options::{ParserOptions, WhitespaceStrategy};
