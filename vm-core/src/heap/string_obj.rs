//! The `String` heap kind: an immutable, length-prefixed byte string.
//!
//! Grounded on `original_source/include/nerangake/object/string.h`: byte
//! content, byte-wise equality, polynomial hash. The source stores raw
//! non-null-terminated bytes; this translation stores a `Box<str>` since
//! the loader-facing API (`VMState::push_string_constant`) takes Rust
//! `&str` constants rather than arbitrary loader-supplied byte buffers.

/// An immutable string.
#[derive(Debug, Clone, PartialEq)]
pub struct StringObj {
    bytes: Box<str>,
}

impl StringObj {
    /// Creates a new string object from owned content.
    #[must_use]
    pub fn new(s: impl Into<Box<str>>) -> Self {
        Self { bytes: s.into() }
    }

    /// The string's content.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.bytes
    }

    /// Byte length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the string is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The byte at `index`, if in range.
    #[must_use]
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.bytes.as_bytes().get(index).copied()
    }

    /// Byte-wise equality, per spec §4.1.
    #[must_use]
    pub fn content_eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }

    /// Polynomial hash over the UTF-8 bytes, matching the source's string
    /// hash strategy.
    #[must_use]
    pub fn polynomial_hash(&self) -> u32 {
        const MULTIPLIER: u32 = 31;
        self.bytes
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(MULTIPLIER).wrapping_add(u32::from(b)))
    }
}
