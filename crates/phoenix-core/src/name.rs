//! Stable 32-bit name tokens.
//!
//! A [`Name`] is the FNV-1a hash of a string. Equality, ordering, and
//! hashing all operate on the integer, so names are cheap to copy and
//! compare and identical across builds and machines. In debug builds the
//! original text is kept in a side registry for inspection -- it is never
//! consulted by logic.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hash::{fnv1a32, FNV_BASIS_32};

// ---------------------------------------------------------------------------
// Name
// ---------------------------------------------------------------------------

/// A stable name token.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name(u32);

impl Name {
    /// The reserved "no name" token.
    pub const NONE: Name = Name(0);
    /// The hash of the empty string.
    pub const EMPTY: Name = Name(FNV_BASIS_32);

    /// Hash a string into a name. `const`, so it resolves at compile time
    /// for literals.
    pub const fn hashed(text: &str) -> Name {
        Name(fnv1a32(text.as_bytes()))
    }

    /// Hash a string into a name and, in debug builds, remember the text
    /// for diagnostics.
    pub fn new(text: &str) -> Name {
        let name = Self::hashed(text);
        #[cfg(debug_assertions)]
        debug_registry::record(name.0, text);
        name
    }

    /// Construct from an already-computed hash.
    #[inline]
    pub const fn from_hash(hash: u32) -> Name {
        Name(hash)
    }

    /// The underlying hash value.
    #[inline]
    pub const fn hash(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_none_or_empty(self) -> bool {
        self == Self::NONE || self == Self::EMPTY
    }

    /// Fold another name into this one, producing a combined stable token.
    #[inline]
    pub const fn combine(self, other: Name) -> Name {
        Name(crate::hash::fnv1a32_combine(self.0, other.0))
    }

    /// The registered debug text, if this build keeps it.
    pub fn debug_text(self) -> Option<String> {
        #[cfg(debug_assertions)]
        {
            debug_registry::lookup(self.0)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(debug_assertions)]
        if let Some(text) = debug_registry::lookup(self.0) {
            return write!(f, "Name({text:?})");
        }
        write!(f, "Name({:#010x})", self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(debug_assertions)]
        if let Some(text) = debug_registry::lookup(self.0) {
            return write!(f, "{text}");
        }
        write!(f, "{:#010x}", self.0)
    }
}

#[cfg(debug_assertions)]
mod debug_registry {
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};

    static REGISTRY: OnceLock<Mutex<HashMap<u32, String>>> = OnceLock::new();

    pub fn record(hash: u32, text: &str) {
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        if let Ok(mut map) = registry.lock() {
            map.entry(hash).or_insert_with(|| text.to_owned());
        }
    }

    pub fn lookup(hash: u32) -> Option<String> {
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        registry.lock().ok().and_then(|map| map.get(&hash).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_const_path() {
        assert_eq!(Name::new("transform"), Name::hashed("transform"));
        const N: Name = Name::hashed("physics");
        assert_eq!(Name::new("physics"), N);
    }

    #[test]
    fn specials() {
        assert!(Name::NONE.is_none());
        assert_eq!(Name::EMPTY, Name::hashed(""));
        assert!(Name::EMPTY.is_none_or_empty());
        assert!(!Name::hashed("x").is_none_or_empty());
        assert_eq!(Name::default(), Name::NONE);
    }

    #[test]
    fn distinct_strings_distinct_names() {
        assert_ne!(Name::hashed("body"), Name::hashed("transform"));
    }

    #[test]
    fn ordering_is_on_the_integer() {
        let mut names = vec![Name::hashed("c"), Name::hashed("a"), Name::hashed("b")];
        names.sort();
        let mut hashes: Vec<u32> = names.iter().map(|n| n.hash()).collect();
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);
        hashes.dedup();
        assert_eq!(hashes.len(), 3);
    }

    #[test]
    fn combine_is_stable_and_order_sensitive() {
        let a = Name::hashed("a");
        let b = Name::hashed("b");
        assert_eq!(a.combine(b), a.combine(b));
        assert_ne!(a.combine(b), b.combine(a));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn debug_text_is_recorded() {
        let n = Name::new("debug_text_probe");
        assert_eq!(n.debug_text().as_deref(), Some("debug_text_probe"));
    }

    #[test]
    fn serde_roundtrip() {
        let n = Name::hashed("session");
        let json = serde_json::to_string(&n).unwrap();
        let back: Name = serde_json::from_str(&json).unwrap();
        assert_eq!(n, back);
    }
}
