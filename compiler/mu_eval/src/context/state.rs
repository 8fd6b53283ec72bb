//! The mutable half of a context: every type, symbol, function and global
//! declaration, guarded together by the context's lock.

use std::sync::Arc;

use mu_ir::{FunctionId, GlobalSlot, ModifierId, Name, SymbolId};
use mu_symbols::{SymbolError, SymbolKind, SymbolTable, TableSnapshot};
use mu_types::{
    Method, PoolSnapshot, TypeError, TypeId, TypeModifier, TypePool, Value, VariantTag,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::function::{Function, FunctionBody, FunctionBuilder, FunctionTable, Param};
use crate::{BindError, Node};

/// A static variable. Each process holds its own value, starting at
/// `initial`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlobalDecl {
    pub name: Name,
    pub ty: TypeId,
    pub initial: Value,
}

/// Types, symbols, functions and globals of one context.
#[derive(Clone, Debug)]
pub struct ContextState {
    pub(crate) types: TypePool,
    pub(crate) symbols: SymbolTable,
    pub(crate) functions: FunctionTable,
    pub(crate) globals: Vec<GlobalDecl>,
    type_symbols: FxHashMap<TypeId, SymbolId>,
    pub(crate) modules: FxHashMap<Name, SymbolId>,
    /// Functions below this index keep their old body in `replaced` when
    /// a new one is installed. `None` when no snapshot is open.
    body_floor: Option<usize>,
    replaced: Vec<(FunctionId, FunctionBody)>,
}

/// Saved state that [`ContextState::rollback`] restores.
///
/// Everything here is a length: definitions are appended, and the few
/// in-place edits are journaled until the snapshot is closed with
/// [`ContextState::commit`] or [`ContextState::rollback`].
#[derive(Debug)]
#[must_use]
pub struct StateSnapshot {
    types: PoolSnapshot,
    symbols: TableSnapshot,
    functions: usize,
    globals: usize,
    replaced: usize,
    outer: Option<usize>,
}

impl ContextState {
    pub fn new(separator: &str) -> Self {
        Self {
            types: TypePool::new(),
            symbols: SymbolTable::new(separator),
            functions: FunctionTable::new(),
            globals: Vec::new(),
            type_symbols: FxHashMap::default(),
            modules: FxHashMap::default(),
            body_floor: None,
            replaced: Vec::new(),
        }
    }

    #[inline]
    pub fn types(&self) -> &TypePool {
        &self.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypePool {
        &mut self.types
    }

    #[inline]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    #[inline]
    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn function(&self, id: FunctionId) -> Result<&Function, BindError> {
        self.functions.function(id)
    }

    /// Display name of a function, qualified by its scope when registered.
    pub fn function_name(&self, id: FunctionId) -> String {
        match self.functions.get(id) {
            Some(Function {
                symbol: Some(symbol),
                ..
            }) => self.symbols.qualified_name(*symbol),
            Some(f) => f.name.as_str().to_owned(),
            None => format!("<function {}>", id.raw()),
        }
    }

    /// Symbol naming `ty`, if it has been registered in some scope.
    pub fn type_symbol(&self, ty: TypeId) -> Option<SymbolId> {
        self.type_symbols.get(&ty).copied()
    }

    pub fn resolve_type(&self, scope: SymbolId, name: &str) -> Result<TypeId, BindError> {
        Ok(self.symbols.resolve_type(scope, name)?)
    }

    /// Scope symbol of a loaded module.
    pub fn module(&self, name: &str) -> Option<SymbolId> {
        let name = mu_ir::global_interner().get(name)?;
        self.modules.get(&name).copied()
    }

    pub fn global(&self, slot: GlobalSlot) -> Option<&GlobalDecl> {
        self.globals.get(slot.index())
    }

    // === Scopes and types ===

    /// Add a namespace under `parent`.
    pub fn define_namespace(
        &mut self,
        parent: SymbolId,
        name: &str,
        searchable: bool,
    ) -> Result<SymbolId, BindError> {
        Ok(self
            .symbols
            .add_scope(parent, Name::intern(name), SymbolKind::Namespace, searchable)?)
    }

    /// Register `ty` under its name in `scope`.
    pub fn add_type_symbol(&mut self, scope: SymbolId, ty: TypeId) -> Result<SymbolId, BindError> {
        let symbol = self.symbols.add_type(scope, &self.types, ty)?;
        self.type_symbols.entry(ty).or_insert(symbol);
        Ok(symbol)
    }

    /// Declare a class in `scope`. Fields and methods are added before
    /// [`ContextState::freeze_class`].
    pub fn define_class(
        &mut self,
        scope: SymbolId,
        name: &str,
        super_class: Option<TypeId>,
    ) -> Result<TypeId, BindError> {
        if let Some(base) = super_class {
            if self.types.class(base).is_none() {
                return Err(TypeError::NotAClass(self.types.name(base)).into());
            }
        }
        let ty = self.types.add_class(Name::intern(name), super_class)?;
        self.add_type_symbol(scope, ty)?;
        Ok(ty)
    }

    pub fn add_field(&mut self, class: TypeId, name: &str, ty: TypeId) -> Result<(), BindError> {
        Ok(self.types.add_field(class, Name::intern(name), ty)?)
    }

    pub fn implement_interface(&mut self, class: TypeId, interface: TypeId) -> Result<(), BindError> {
        Ok(self.types.add_class_interface(class, interface)?)
    }

    pub fn freeze_class(&mut self, class: TypeId) -> Result<(), BindError> {
        Ok(self.types.freeze_class(class)?)
    }

    pub fn define_interface(&mut self, scope: SymbolId, name: &str) -> Result<TypeId, BindError> {
        let ty = self.types.add_interface(Name::intern(name))?;
        self.add_type_symbol(scope, ty)?;
        Ok(ty)
    }

    /// Append method `name(params...) -> ret` to an interface; the
    /// receiver is implied. Returns the method's vtable slot.
    pub fn declare_interface_method(
        &mut self,
        interface: TypeId,
        name: &str,
        params: &[TypeId],
        ret: TypeId,
    ) -> Result<usize, BindError> {
        let mut full: SmallVec<[TypeId; 4]> = SmallVec::with_capacity(params.len() + 1);
        full.push(interface);
        full.extend_from_slice(params);
        let signature = self.types.function(&full, ret)?;
        Ok(self
            .types
            .add_interface_method(interface, Name::intern(name), signature)?)
    }

    pub fn define_variant(
        &mut self,
        scope: SymbolId,
        name: &str,
        tags: &[(&str, TypeId)],
    ) -> Result<TypeId, BindError> {
        let tags = tags
            .iter()
            .map(|&(tag, payload)| VariantTag {
                name: Name::intern(tag),
                payload,
            })
            .collect();
        let ty = self.types.add_variant(Name::intern(name), tags)?;
        self.add_type_symbol(scope, ty)?;
        Ok(ty)
    }

    /// Declare a named host type whose instances wrap Rust values.
    pub fn define_opaque(&mut self, scope: SymbolId, name: &str) -> Result<TypeId, BindError> {
        let ty = self.types.add_opaque(Name::intern(name))?;
        self.add_type_symbol(scope, ty)?;
        Ok(ty)
    }

    pub fn add_type_modifier(
        &mut self,
        scope: SymbolId,
        modifier: TypeModifier,
    ) -> Result<ModifierId, BindError> {
        let name = modifier.name;
        let id = self.types.add_modifier(modifier);
        self.symbols
            .add_symbol(scope, name, SymbolKind::TypeModifier(id))?;
        Ok(id)
    }

    pub fn add_parameter_modifier(&mut self, scope: SymbolId, name: &str) -> Result<SymbolId, BindError> {
        Ok(self
            .symbols
            .add_symbol(scope, Name::intern(name), SymbolKind::ParameterModifier)?)
    }

    /// Declare a static variable in `scope`.
    pub fn define_global(
        &mut self,
        scope: SymbolId,
        name: &str,
        ty: TypeId,
        initial: Value,
    ) -> Result<GlobalSlot, BindError> {
        let name = Name::intern(name);
        let slot = GlobalSlot::from_usize(self.globals.len());
        self.symbols
            .add_symbol(scope, name, SymbolKind::Global { slot, ty })?;
        self.globals.push(GlobalDecl { name, ty, initial });
        Ok(slot)
    }

    // === Functions ===

    /// Register a function in `scope` (or in its class, for methods).
    pub fn define_function(
        &mut self,
        scope: SymbolId,
        builder: FunctionBuilder,
    ) -> Result<FunctionId, BindError> {
        let FunctionBuilder {
            name,
            mut params,
            variadic,
            ret,
            attributes,
            body,
            method_of,
        } = builder;

        if let Some(first_default) = params.iter().position(|p| p.default.is_some()) {
            if let Some(bad) = params[first_default..].iter().find(|p| p.default.is_none()) {
                return Err(BindError::DefaultOrder {
                    function: name,
                    param: bad.name,
                });
            }
        }

        let parent = match method_of {
            Some(class) => {
                if self.types.class(class).is_none() {
                    return Err(TypeError::NotAClass(self.types.name(class)).into());
                }
                if self.types.is_frozen(class) {
                    return Err(TypeError::ClassFrozen(self.types.name(class)).into());
                }
                params.insert(
                    0,
                    Param {
                        name: Name::intern("this"),
                        ty: class,
                        default: None,
                    },
                );
                self.type_symbol(class)
                    .ok_or_else(|| BindError::NotAType(self.types.name(class).as_str().to_owned()))?
            }
            None => scope,
        };

        for (i, p) in params.iter().enumerate() {
            if params[..i].iter().any(|q| q.name == p.name) {
                return Err(SymbolError::Duplicate {
                    name: p.name,
                    scope: name.as_str().to_owned(),
                }
                .into());
            }
        }

        let mut sig: SmallVec<[TypeId; 4]> = params.iter().map(|p| p.ty).collect();
        if variadic {
            sig.push(TypeId::VARARG);
        }
        let signature = self.types.function(&sig, ret)?;
        let id = FunctionId::from_usize(self.functions.len());

        let mut function = Function {
            name,
            symbol: None,
            params,
            variadic,
            ret,
            signature,
            attributes,
            body,
            owner: method_of,
        };
        let symbol = self.symbols.add_symbol(
            parent,
            name,
            SymbolKind::Function {
                function: id,
                signature,
                min_args: function.min_args(),
            },
        )?;
        for (index, p) in function.params.iter().enumerate() {
            self.symbols
                .add_symbol(symbol, p.name, SymbolKind::Parameter { index, ty: p.ty })?;
        }
        if let Some(class) = method_of {
            self.types.add_method(
                class,
                Method {
                    name,
                    signature,
                    function: id,
                },
            )?;
        }

        function.symbol = Some(symbol);
        let pushed = self.functions.push(function);
        debug_assert_eq!(pushed, id);
        tracing::debug!(
            function = %self.symbols.qualified_name(symbol),
            signature = %self.types.name(signature),
            "function defined"
        );
        Ok(id)
    }

    /// Install an interpreted body.
    pub(crate) fn set_tree_body(
        &mut self,
        function: FunctionId,
        root: Node,
        locals: Arc<[Value]>,
    ) -> Result<(), BindError> {
        let f = self
            .functions
            .get_mut(function)
            .ok_or(BindError::UnknownFunction(function.raw()))?;
        let old = std::mem::replace(
            &mut f.body,
            FunctionBody::Tree {
                root: Arc::new(root),
                locals,
            },
        );
        if self.body_floor.is_some_and(|floor| function.index() < floor) {
            self.replaced.push((function, old));
        }
        Ok(())
    }

    // === Snapshots ===

    /// Open a snapshot of the current state. Snapshots nest.
    pub fn snapshot(&mut self) -> StateSnapshot {
        let snapshot = StateSnapshot {
            types: self.types.snapshot(),
            symbols: self.symbols.snapshot(),
            functions: self.functions.len(),
            globals: self.globals.len(),
            replaced: self.replaced.len(),
            outer: self.body_floor,
        };
        self.body_floor = Some(self.functions.len());
        snapshot
    }

    /// Keep everything defined since `snapshot` was taken.
    pub fn commit(&mut self, snapshot: StateSnapshot) {
        self.types.commit(snapshot.types);
        self.body_floor = snapshot.outer;
        if snapshot.outer.is_none() {
            self.replaced.clear();
        }
    }

    /// Discard everything defined since `snapshot` was taken.
    pub fn rollback(&mut self, snapshot: StateSnapshot) {
        self.types.rollback(snapshot.types);
        self.symbols.rollback(snapshot.symbols);
        let replaced = self.replaced.split_off(snapshot.replaced.min(self.replaced.len()));
        for (function, body) in replaced.into_iter().rev() {
            if let Some(f) = self.functions.get_mut(function) {
                f.body = body;
            }
        }
        self.functions.truncate(snapshot.functions);
        self.globals.truncate(snapshot.globals);
        let symbols = self.symbols.len();
        self.type_symbols.retain(|_, symbol| symbol.index() < symbols);
        self.modules.retain(|_, scope| scope.index() < symbols);
        self.body_floor = snapshot.outer;
        if snapshot.outer.is_none() {
            self.replaced.clear();
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;
