//! Symbol table errors.

use mu_ir::Name;
use mu_types::TypeError;

/// Binding-time failures of the symbol table.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SymbolError {
    #[error("`{name}` is already defined in `{scope}`")]
    Duplicate { name: Name, scope: String },

    #[error("`{name}` already has an overload with this signature in `{scope}`")]
    DuplicateOverload { name: Name, scope: String },

    #[error("symbols cannot be added to `{0}`")]
    InvalidScope(Name),

    #[error("no such symbol {0}")]
    UnknownSymbol(u32),

    #[error("unresolved symbol `{0}`")]
    Unresolved(String),

    #[error("`{0}` is not a function")]
    NotAFunction(Name),

    #[error("no overload of `{name}` accepts ({args})")]
    NoMatchingOverload { name: Name, args: String },

    #[error("call to `{name}` is ambiguous between {}", candidates.join(" and "))]
    Ambiguous { name: Name, candidates: Vec<String> },

    #[error(transparent)]
    Type(#[from] TypeError),
}
