//! Mu IR - shared identity types for the Mu runtime.
//!
//! This crate contains the leaf data structures every other runtime crate
//! builds on:
//! - `Name`: interned identifiers with handle equality
//! - `StringInterner`: the sharded, lock-guarded intern table
//! - Arena handles (`SymbolId`, `FunctionId`, `ObjectId`, ...) used instead
//!   of pointers between symbols, types, functions and heap objects
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: identifiers become `Name(u32)`, compared in O(1)
//! - **Handles, not pointers**: every cross reference is a `u32` index into
//!   an arena owned by exactly one table

/// Compile-time assertion that a type has a specific size.
///
/// Used to prevent accidental size regressions in frequently-copied handles.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod ids;
mod interner;
mod name;

pub use ids::{FunctionId, GlobalSlot, ModifierId, ObjectId, SymbolId};
pub use interner::{global_interner, InternError, StringInterner};
pub use name::Name;

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{FunctionId, Name, ObjectId, SymbolId};
    static_assert_size!(Name, 4);
    static_assert_size!(SymbolId, 4);
    static_assert_size!(FunctionId, 4);
    static_assert_size!(ObjectId, 8);
}
