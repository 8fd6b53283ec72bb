//! Symbols.

use mu_ir::{FunctionId, GlobalSlot, ModifierId, Name, SymbolId};
use mu_types::TypeId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// What a symbol names.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    /// A pure scope. The global scope is one.
    Namespace,
    /// A loaded module's scope.
    Module,
    /// A type; classes hold their methods and fields as children.
    Type(TypeId),
    /// A function or construct, overloadable by signature.
    Function {
        function: FunctionId,
        signature: TypeId,
        /// Arguments without a default value.
        min_args: usize,
    },
    /// A parameter, addressed by position in its function's frame.
    Parameter { index: usize, ty: TypeId },
    /// A static variable stored in a per-process slot.
    Global { slot: GlobalSlot, ty: TypeId },
    TypeModifier(ModifierId),
    /// A keyword qualifying how a parameter is passed.
    ParameterModifier,
}

impl SymbolKind {
    #[inline]
    pub fn is_function(&self) -> bool {
        matches!(self, SymbolKind::Function { .. })
    }

    /// Whether the symbol may own children.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            SymbolKind::Namespace
                | SymbolKind::Module
                | SymbolKind::Type(_)
                | SymbolKind::Function { .. }
        )
    }

    /// Scopes unqualified lookup looks inside when passing their parent.
    pub(crate) fn is_open_namespace(&self) -> bool {
        matches!(self, SymbolKind::Namespace | SymbolKind::Module)
    }
}

/// A named entity in the symbol tree.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: Name,
    /// Owning scope; `None` only for the global scope.
    pub scope: Option<SymbolId>,
    /// Whether unqualified lookup passes through this scope.
    pub searchable: bool,
    pub kind: SymbolKind,
    children: Vec<SymbolId>,
    by_name: FxHashMap<Name, SmallVec<[SymbolId; 2]>>,
}

impl Symbol {
    pub(crate) fn new(name: Name, scope: Option<SymbolId>, kind: SymbolKind) -> Self {
        Self {
            name,
            scope,
            searchable: kind.is_scope(),
            kind,
            children: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }

    /// Children in insertion order.
    #[inline]
    pub fn children(&self) -> &[SymbolId] {
        &self.children
    }

    /// Children named `name`, in insertion order.
    pub fn lookup_local(&self, name: Name) -> &[SymbolId] {
        self.by_name.get(&name).map_or(&[], |ids| ids.as_slice())
    }

    pub(crate) fn push_child(&mut self, name: Name, child: SymbolId) {
        self.children.push(child);
        self.by_name.entry(name).or_default().push(child);
    }

    /// Undo the most recent [`Symbol::push_child`], which added `name`.
    pub(crate) fn pop_child(&mut self, name: Name) {
        self.children.pop();
        if let Some(ids) = self.by_name.get_mut(&name) {
            ids.pop();
            if ids.is_empty() {
                self.by_name.remove(&name);
            }
        }
    }

    /// The function a function symbol binds.
    pub fn function(&self) -> Option<FunctionId> {
        match self.kind {
            SymbolKind::Function { function, .. } => Some(function),
            _ => None,
        }
    }

    /// The type a type symbol names.
    pub fn as_type(&self) -> Option<TypeId> {
        match self.kind {
            SymbolKind::Type(ty) => Some(ty),
            _ => None,
        }
    }
}
