//! Arena handles for runtime entities.
//!
//! Symbols, functions, modifiers and heap objects live in arenas owned by a
//! single table each; everything else refers to them through these handles.

use std::fmt;

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create a handle from an arena index.
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Create a handle from a `usize` arena position.
            ///
            /// # Panics
            /// Panics if the position does not fit in 32 bits.
            #[inline]
            pub fn from_usize(index: usize) -> Self {
                match u32::try_from(index) {
                    Ok(raw) => Self(raw),
                    Err(_) => panic!(concat!(stringify!($name), " arena exceeded u32 range")),
                }
            }

            /// Index into the owning arena.
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Raw u32 value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_index!(
    /// Handle to a symbol in the symbol table.
    SymbolId
);

define_index!(
    /// Handle to a function or construct in the function table.
    FunctionId
);

define_index!(
    /// Handle to a registered type modifier.
    ModifierId
);

define_index!(
    /// Slot holding a global (static) variable's value inside a process.
    GlobalSlot
);

/// Handle to a heap object.
///
/// The generation distinguishes successive occupants of a reused heap slot,
/// so a handle kept past its object's reclamation is detected instead of
/// silently reaching the slot's next occupant.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Create a handle for a slot and generation.
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the heap.
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Generation of the slot this handle was issued for.
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Encode as a non-zero 64-bit word, used for pointer fields in object
    /// storage (zero is reserved for nil).
    #[inline]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64 + 1)
    }

    /// Decode a pointer word; zero decodes to `None` (nil).
    #[inline]
    pub const fn from_bits(bits: u64) -> Option<Self> {
        if bits == 0 {
            return None;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "each half of the word is exactly 32 bits"
        )]
        let index = ((bits & 0xFFFF_FFFF) as u32).wrapping_sub(1);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "each half of the word is exactly 32 bits"
        )]
        let generation = (bits >> 32) as u32;
        Some(Self { index, generation })
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({}v{})", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_bits_round_trip() {
        let id = ObjectId::new(0, 0);
        assert_ne!(id.to_bits(), 0);
        assert_eq!(ObjectId::from_bits(id.to_bits()), Some(id));

        let id = ObjectId::new(41, 7);
        assert_eq!(ObjectId::from_bits(id.to_bits()), Some(id));
        assert_eq!(ObjectId::from_bits(0), None);
    }

    #[test]
    fn test_index_handles() {
        let id = SymbolId::from_usize(12);
        assert_eq!(id.index(), 12);
        assert_eq!(format!("{id:?}"), "SymbolId(12)");
    }
}
