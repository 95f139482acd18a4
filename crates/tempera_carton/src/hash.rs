//! Fast hashing utilities using xxHash3.
//!
//! Template sources are hashed to key the compiled blueprint cache, so a
//! source string is only ever compiled once.

use xxhash_rust::xxh3::xxh3_64;

/// Compute a 64-bit hash of the given string using xxHash3.
#[inline]
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consistency() {
        let content = "<li *foreach=\"items\">{{ @item }}</li>";
        assert_eq!(hash_str(content), hash_str(content));
    }

    #[test]
    fn test_hash_difference() {
        assert_ne!(hash_str("<p></p>"), hash_str("<p> </p>"));
    }
}
