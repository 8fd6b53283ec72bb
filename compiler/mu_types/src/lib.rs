//! Mu Types - the type system of the Mu runtime.
//!
//! Every type in a context lives in one [`TypePool`] and is referenced by a
//! [`TypeId`]. The pool covers:
//!
//! - **Primitives** with fixed machine representations (GC-atomic)
//! - **Classes** with single inheritance, frozen into a field layout
//! - **Interfaces** and their per-class vtables ([`InterfaceImp`])
//! - **Variants**, arrays, vectors and function signatures
//! - **Patterns** (`?`, `?dyn_array`, `'T`, ...) used by overload resolution
//! - **Modifiers** that transform a base type, memoized per base
//!
//! Instances are plain byte buffers; [`TypePool::construct_instance`],
//! [`TypePool::copy_instance`] and [`TypePool::trace_pointers`] are the only
//! code that knows how a type's bytes are laid out.

mod class;
mod error;
mod idx;
mod instance;
mod kind;
mod machine_rep;
mod modifier;
mod pattern;
mod pool;
mod value;

pub use class::InterfaceImp;
pub use error::TypeError;
pub use idx::TypeId;
pub use instance::VARIANT_PAYLOAD_OFFSET;
pub use kind::{
    ClassData, ClassLayout, Field, FieldSlot, FunctionSignature, InterfaceData, InterfaceMethod,
    Method, TypeEntry, TypeKind, VariantData, VariantTag,
};
pub use machine_rep::{align_up, MachineRep};
pub use modifier::{ModifierKind, TypeModifier};
pub use pattern::{Bindings, MatchRank, MatchResult, TypePattern};
pub use pool::{PoolSnapshot, TypePool};
pub use value::{Value, VectorValue};

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::TypeId;
    mu_ir::static_assert_size!(TypeId, 4);
}
