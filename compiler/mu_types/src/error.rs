//! Type system errors.

use mu_ir::Name;

use crate::{MachineRep, Value};

/// Errors raised while defining types, freezing classes, applying
/// modifiers or reading and writing instance storage.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("no such type {0}")]
    UnknownType(u32),

    #[error("type pool has no type handles left")]
    PoolExhausted,

    #[error("no such type modifier {0}")]
    UnknownModifier(u32),

    #[error("`{0}` is not a class")]
    NotAClass(Name),

    #[error("`{0}` is not an interface")]
    NotAnInterface(Name),

    #[error("class `{0}` is frozen and can no longer be changed")]
    ClassFrozen(Name),

    #[error("class `{class}` already has a field named `{field}`")]
    DuplicateField { class: Name, field: Name },

    #[error("class `{0}` inherits from itself")]
    CyclicInheritance(Name),

    #[error("class `{class}` is missing method `{method}` required by interface `{interface}`")]
    MissingInterfaceMethod {
        class: Name,
        interface: Name,
        method: Name,
    },

    #[error("`{method}` in interface `{interface}` must take the interface as its first parameter")]
    InterfaceSignature { interface: Name, method: Name },

    #[error("type modifier `{modifier}` cannot be applied to `{base}`")]
    ModifierNotApplicable { modifier: Name, base: Name },

    #[error("class `{0}` must be frozen before its instances are used")]
    NotFrozen(Name),

    #[error("cannot store {value:?} as {rep:?}")]
    RepMismatch { rep: MachineRep, value: Value },

    #[error("instance storage too small: need {needed} bytes, have {available}")]
    StorageTooSmall { needed: usize, available: usize },
}
