//! Carton - The toolbox for Tempera.
//!
//! Shared collections and helpers used by every other Tempera crate, so that
//! the markup parser, the template compiler and the runtime agree on one set
//! of string, map and hashing types.
//!
//! # Example
//!
//! ```
//! use tempera_carton::{is_void_tag, CompactString, FxHashMap};
//!
//! let mut map: FxHashMap<CompactString, u32> = FxHashMap::default();
//! map.insert("items".into(), 1);
//! assert_eq!(map.get("items"), Some(&1));
//! assert!(is_void_tag("input"));
//! ```

pub mod dom_tag_config;
pub mod hash;

// Re-export compact_str::CompactString for convenience
pub use compact_str::CompactString;
pub use compact_str::ToCompactString;

// Re-export smallvec for stack-optimized collections
pub use smallvec::{smallvec, SmallVec};

// Re-export rustc-hash for fast hash maps/sets
pub use rustc_hash::{FxHashMap, FxHashSet};

// Ordered maps for insertion-ordered records
pub use indexmap::{IndexMap, IndexSet};

pub use dom_tag_config::*;
