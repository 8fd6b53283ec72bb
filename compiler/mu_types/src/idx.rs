//! Type handle.
//!
//! Every type lives in the `TypePool` and is referenced by a 32-bit index.
//! Builtin types and type patterns occupy fixed indices so hot paths can
//! compare against constants without a pool lookup.

use std::fmt;

/// A 32-bit index into the type pool.
///
/// Type identity is index identity: structural types (arrays, vectors,
/// function signatures) are deduplicated on construction, so two equal
/// handles always mean the same type and vice versa.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    // === Builtin types ===
    pub const VOID: Self = Self(0);
    pub const BOOL: Self = Self(1);
    pub const BYTE: Self = Self(2);
    pub const SHORT: Self = Self(3);
    pub const INT: Self = Self(4);
    pub const INT64: Self = Self(5);
    pub const FLOAT: Self = Self(6);
    pub const DOUBLE: Self = Self(7);
    pub const CHAR: Self = Self(8);
    pub const STRING: Self = Self(9);
    /// Type of the `nil` literal; accepted wherever a reference is.
    pub const NIL: Self = Self(10);
    /// Opaque host object wrapper.
    pub const OPAQUE: Self = Self(11);

    // === Type patterns ===
    /// `?` matches anything.
    pub const MATCH_ANYTHING: Self = Self(12);
    /// `?type` matches any type that is not itself a pattern.
    pub const MATCH_ANY_TYPE: Self = Self(13);
    /// `...` matches any number of trailing arguments of any type.
    pub const VARARG: Self = Self(14);
    pub const MATCH_ANY_CLASS: Self = Self(15);
    pub const MATCH_ANY_INTERFACE: Self = Self(16);
    pub const MATCH_ANY_CLASS_OR_INTERFACE: Self = Self(17);
    pub const MATCH_ANY_DYNAMIC_ARRAY: Self = Self(18);
    pub const MATCH_ANY_FIXED_ARRAY: Self = Self(19);
    pub const MATCH_ANY_FUNCTION: Self = Self(20);
    pub const MATCH_ANY_VARIANT: Self = Self(21);
    pub const MATCH_NON_PRIMITIVE: Self = Self(22);
    pub const MATCH_BOOL_REP: Self = Self(23);
    pub const MATCH_OPAQUE: Self = Self(24);

    /// First index handed out for types created after pool construction.
    pub const FIRST_DYNAMIC: u32 = 25;

    /// Sentinel for "no type".
    pub const NONE: Self = Self(u32::MAX);

    /// Create an index from a raw u32 value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Position in the pool's arena.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is one of the builtin types or patterns.
    #[inline]
    pub const fn is_builtin(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }

    /// Check if this is the NONE sentinel.
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "TypeId::NONE")
        } else {
            write!(f, "TypeId({})", self.0)
        }
    }
}

impl Default for TypeId {
    fn default() -> Self {
        Self::NONE
    }
}
