//! Interned string identifier.
//!
//! A `Name` is a 32-bit handle into the process-wide interner. Two names are
//! equal exactly when they were interned from equal text, so equality and
//! hashing never touch the characters.

use std::fmt;

use crate::interner::global_interner;

const SHARD_SHIFT: u32 = 28;

/// Handle to an interned string.
///
/// The top four bits select an interner shard and the low 28 bits index
/// into it. Ordering compares the packed handle rather than the text: it is
/// total and stable for the life of the process, which is what deterministic
/// iteration over symbol maps needs.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// The empty string, interned before anything else.
    pub const EMPTY: Name = Name(0);

    /// Largest index a single shard can hand out.
    pub const MAX_LOCAL: u32 = (1 << SHARD_SHIFT) - 1;

    pub const NUM_SHARDS: usize = 16;

    /// Pack a shard and local index.
    #[inline]
    pub const fn new(shard: u32, local: u32) -> Self {
        debug_assert!((shard as usize) < Self::NUM_SHARDS);
        debug_assert!(local <= Self::MAX_LOCAL);
        Name((shard << SHARD_SHIFT) | local)
    }

    /// Intern `text` in the process-wide interner.
    #[inline]
    pub fn intern(text: &str) -> Self {
        global_interner().intern(text)
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        global_interner().lookup(self)
    }

    /// Whether `needle` occurs in this name at or after byte offset `start`.
    ///
    /// Offsets past the end, or not on a character boundary, never match.
    pub fn includes(self, needle: &str, start: usize) -> bool {
        self.as_str()
            .get(start..)
            .is_some_and(|rest| rest.contains(needle))
    }

    #[inline]
    pub fn starts_with(self, prefix: &str) -> bool {
        self.as_str().starts_with(prefix)
    }

    #[inline]
    pub const fn shard(self) -> usize {
        (self.0 >> SHARD_SHIFT) as usize
    }

    #[inline]
    pub const fn local(self) -> usize {
        (self.0 & Self::MAX_LOCAL) as usize
    }

    /// The packed handle.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", self.as_str())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::intern(text)
    }
}

#[cfg(test)]
mod tests;
