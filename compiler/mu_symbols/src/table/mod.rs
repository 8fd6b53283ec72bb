//! The symbol tree.
//!
//! Symbols live in one arena indexed by [`SymbolId`]; the global scope is
//! always `SymbolId(0)`. A symbol's `scope` back-reference and its parent's
//! child list are written together by [`SymbolTable::add_symbol`], the only
//! way to insert, so they can never disagree and the tree stays acyclic.
//!
//! # Lookup
//!
//! Unqualified lookup starts at a scope and at each step looks at:
//! 1. the scope's own children,
//! 2. children of its searchable namespaces and modules (how loaded
//!    modules' functions become visible from the global scope),
//!
//! then moves to the next searchable ancestor. Functions found along the
//! way accumulate into one overload set. The first non-function match ends
//! the walk, and shadows outer symbols if no functions were found first.

use mu_ir::{Name, SymbolId};
use mu_types::{TypeId, TypePool};
use smallvec::SmallVec;

use crate::{Symbol, SymbolError, SymbolKind};

/// Arena of all symbols in a context.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    separator: String,
}

/// A saved table state that [`SymbolTable::rollback`] can return to.
///
/// Symbols are only ever appended, so the saved state is the arena length.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TableSnapshot {
    len: usize,
}

/// Candidate set returned by lookup.
pub type Candidates = SmallVec<[SymbolId; 4]>;

impl SymbolTable {
    /// The root of every symbol chain.
    pub const GLOBAL: SymbolId = SymbolId::new(0);

    /// Create a table holding only the global scope. `separator` joins
    /// qualified names (`"."` gives `math.area`).
    pub fn new(separator: impl Into<String>) -> Self {
        let global = Symbol::new(Name::intern("__global__"), None, SymbolKind::Namespace);
        Self {
            symbols: vec![global],
            separator: separator.into(),
        }
    }

    #[inline]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    #[inline]
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.index())
    }

    /// Look up a symbol, failing on an unknown handle.
    pub fn symbol(&self, id: SymbolId) -> Result<&Symbol, SymbolError> {
        self.get(id).ok_or(SymbolError::UnknownSymbol(id.raw()))
    }

    /// Name of a symbol, or the empty name for an unknown handle.
    pub fn name(&self, id: SymbolId) -> Name {
        self.get(id).map_or(Name::EMPTY, |s| s.name)
    }

    /// Insert `name` as a child of `parent`.
    ///
    /// Functions may share a name with other functions as long as their
    /// signatures differ. Any other name collision in the same scope is an
    /// error.
    pub fn add_symbol(
        &mut self,
        parent: SymbolId,
        name: Name,
        kind: SymbolKind,
    ) -> Result<SymbolId, SymbolError> {
        let scope = self.symbol(parent)?;
        if !scope.kind.is_scope() {
            return Err(SymbolError::InvalidScope(scope.name));
        }

        for &existing in scope.lookup_local(name) {
            let existing = self.symbol(existing)?;
            match (existing.kind, kind) {
                (
                    SymbolKind::Function { signature: a, .. },
                    SymbolKind::Function { signature: b, .. },
                ) => {
                    if a == b {
                        return Err(SymbolError::DuplicateOverload {
                            name,
                            scope: self.qualified_name(parent),
                        });
                    }
                }
                _ => {
                    return Err(SymbolError::Duplicate {
                        name,
                        scope: self.qualified_name(parent),
                    });
                }
            }
        }

        let id = SymbolId::from_usize(self.symbols.len());
        self.symbols.push(Symbol::new(name, Some(parent), kind));
        if let Some(scope) = self.symbols.get_mut(parent.index()) {
            scope.push_child(name, id);
        }
        tracing::debug!(symbol = %name, scope = %self.name(parent), ?kind, "symbol added");
        Ok(id)
    }

    /// Like [`SymbolTable::add_symbol`], with an explicit searchable flag
    /// for scopes such as private namespaces.
    pub fn add_scope(
        &mut self,
        parent: SymbolId,
        name: Name,
        kind: SymbolKind,
        searchable: bool,
    ) -> Result<SymbolId, SymbolError> {
        let id = self.add_symbol(parent, name, kind)?;
        if let Some(symbol) = self.symbols.get_mut(id.index()) {
            symbol.searchable = searchable;
        }
        Ok(id)
    }

    /// Scopes enclosing `id`, nearest first, ending with the global scope.
    pub fn ancestors(&self, id: SymbolId) -> impl Iterator<Item = SymbolId> + '_ {
        std::iter::successors(self.get(id).and_then(|s| s.scope), move |&s| {
            self.get(s).and_then(|s| s.scope)
        })
    }

    /// Name of `id` qualified by its enclosing scopes, global excluded.
    pub fn qualified_name(&self, id: SymbolId) -> String {
        if id == Self::GLOBAL {
            return self.name(id).as_str().to_owned();
        }
        let mut parts: Vec<&str> = self
            .ancestors(id)
            .filter(|&s| s != Self::GLOBAL)
            .map(|s| self.name(s).as_str())
            .collect();
        parts.reverse();
        parts.push(self.name(id).as_str());
        parts.join(&self.separator)
    }

    /// Resolve an unqualified or qualified name as seen from `scope`.
    ///
    /// Returns every matching function for a function name, or the single
    /// visible symbol otherwise. Empty when nothing matches.
    pub fn resolve(&self, scope: SymbolId, name: &str) -> Candidates {
        if !self.separator.is_empty() && name.contains(self.separator.as_str()) {
            let parts: Vec<&str> = name.split(self.separator.as_str()).collect();
            let found = self.resolve_path(scope, &parts);
            if !found.is_empty() {
                return found;
            }
            // Type names such as `vector float[4]` or `(int;math.T)` may
            // contain the separator without being qualified.
        }
        existing_name(name).map_or_else(Candidates::new, |name| self.resolve_name(scope, name))
    }

    /// Resolve a single interned name as seen from `scope`.
    pub fn resolve_name(&self, scope: SymbolId, name: Name) -> Candidates {
        let mut found = Candidates::new();
        let mut current = Some(scope);
        let mut first = true;

        while let Some(s) = current {
            let Some(symbol) = self.get(s) else {
                break;
            };
            if first || symbol.searchable {
                for id in self.visible_in(symbol, name) {
                    match self.get(id).map(|sym| sym.kind.is_function()) {
                        Some(true) => {
                            if !found.contains(&id) {
                                found.push(id);
                            }
                        }
                        Some(false) => {
                            if found.is_empty() {
                                found.push(id);
                            }
                            return found;
                        }
                        None => {}
                    }
                }
            }
            first = false;
            current = symbol.scope;
        }
        found
    }

    /// Symbols named `name` directly in `symbol` or one level down in its
    /// searchable namespaces and modules.
    fn visible_in(&self, symbol: &Symbol, name: Name) -> Candidates {
        let mut ids: Candidates = symbol.lookup_local(name).iter().copied().collect();
        for &child in symbol.children() {
            if let Some(child) = self.get(child) {
                if child.searchable && child.kind.is_open_namespace() {
                    ids.extend(child.lookup_local(name).iter().copied());
                }
            }
        }
        ids
    }

    fn resolve_path(&self, scope: SymbolId, parts: &[&str]) -> Candidates {
        let Some((first, rest)) = parts.split_first() else {
            return Candidates::new();
        };
        let Some(first) = existing_name(first) else {
            return Candidates::new();
        };
        let mut current = self.resolve_name(scope, first);
        for part in rest {
            let Some(part) = existing_name(part) else {
                return Candidates::new();
            };
            current = current
                .iter()
                .filter_map(|&s| self.get(s))
                .flat_map(|s| s.lookup_local(part).iter().copied())
                .collect();
            if current.is_empty() {
                break;
            }
        }
        current
    }

    /// Resolve a fully qualified name from the global scope.
    pub fn lookup_qualified(&self, name: &str) -> Candidates {
        self.resolve(Self::GLOBAL, name)
    }

    /// Resolve `name` from `scope`, expecting a type.
    pub fn resolve_type(&self, scope: SymbolId, name: &str) -> Result<TypeId, SymbolError> {
        self.resolve(scope, name)
            .iter()
            .find_map(|&id| self.get(id).and_then(Symbol::as_type))
            .ok_or_else(|| SymbolError::Unresolved(name.to_owned()))
    }

    /// Register `ty` under its pool name in `scope`.
    pub fn add_type(
        &mut self,
        scope: SymbolId,
        types: &TypePool,
        ty: TypeId,
    ) -> Result<SymbolId, SymbolError> {
        self.add_symbol(scope, types.name(ty), SymbolKind::Type(ty))
    }

    // === Snapshots ===

    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            len: self.symbols.len(),
        }
    }

    /// Restore a saved state, discarding every symbol added since.
    ///
    /// Newer symbols are unlinked newest first; each is then the last
    /// child its parent gained.
    pub fn rollback(&mut self, snapshot: TableSnapshot) {
        tracing::debug!(
            discarded = self.symbols.len().saturating_sub(snapshot.len),
            "rolling back symbol table"
        );
        while self.symbols.len() > snapshot.len.max(1) {
            let Some(symbol) = self.symbols.pop() else {
                break;
            };
            if let Some(parent) = symbol.scope.and_then(|p| self.symbols.get_mut(p.index())) {
                parent.pop_child(symbol.name);
            }
        }
    }
}

/// Lookups never intern: a name nobody interned cannot match a symbol.
fn existing_name(text: &str) -> Option<Name> {
    mu_ir::global_interner().get(text)
}
