//! Mu Symbols - the namespace hierarchy of a Mu context.
//!
//! Every nameable entity (namespaces, modules, types, functions,
//! parameters, globals, modifiers) is a [`Symbol`] in one [`SymbolTable`],
//! rooted at a single global scope. Lookup walks outward from a scope;
//! functions sharing a name are collected as an overload set and narrowed
//! by [`SymbolTable::resolve_overload`].

mod error;
mod overload;
mod symbol;
mod table;

pub use error::SymbolError;
pub use overload::{Resolved, Selected};
pub use symbol::{Symbol, SymbolKind};
pub use table::{SymbolTable, TableSnapshot};
