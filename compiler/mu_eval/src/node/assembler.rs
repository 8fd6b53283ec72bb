//! Building bound node trees from names.
//!
//! The assembler resolves every name against the symbol table as the tree
//! is built: calls go through overload resolution (defaults are appended
//! for omitted trailing arguments), variables become frame or global slot
//! references, and fields become byte offsets into the frozen layout.

use std::sync::Arc;

use mu_ir::{FunctionId, Name, SymbolId};
use mu_symbols::{Resolved, SymbolError, SymbolKind};
use mu_types::{Bindings, TypeError, TypeId, TypeKind, Value};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{CompiledUnit, Node, NodeKind};
use crate::{BindError, ContextState};

/// Binds expressions for one top-level unit or one function body.
pub struct NodeAssembler<'s> {
    state: &'s mut ContextState,
    scope: SymbolId,
    function: Option<FunctionId>,
    params: Vec<(Name, TypeId)>,
    scopes: Vec<FxHashMap<Name, (usize, TypeId)>>,
    locals: Vec<TypeId>,
}

impl<'s> NodeAssembler<'s> {
    /// Assemble a top-level unit whose names resolve from `scope`.
    pub fn new(state: &'s mut ContextState, scope: SymbolId) -> Self {
        Self {
            state,
            scope,
            function: None,
            params: Vec::new(),
            scopes: vec![FxHashMap::default()],
            locals: Vec::new(),
        }
    }

    /// Assemble the body of a declared function. Its parameters are in
    /// scope, and names resolve from the function's own symbol outward.
    pub fn for_function(state: &'s mut ContextState, function: FunctionId) -> Result<Self, BindError> {
        let f = state.functions.function(function)?;
        let scope = f.symbol.ok_or(BindError::UnknownFunction(function.raw()))?;
        let params = f.params.iter().map(|p| (p.name, p.ty)).collect();
        Ok(Self {
            state,
            scope,
            function: Some(function),
            params,
            scopes: vec![FxHashMap::default()],
            locals: Vec::new(),
        })
    }

    #[inline]
    pub fn state(&mut self) -> &mut ContextState {
        self.state
    }

    #[inline]
    pub fn scope(&self) -> SymbolId {
        self.scope
    }

    // === Leaves ===

    /// A scalar constant. Object handles cannot be embedded: a tree is not
    /// a GC root.
    pub fn constant(&mut self, value: Value) -> Result<Node, BindError> {
        let ty = match value {
            Value::Void => TypeId::VOID,
            Value::Bool(_) => TypeId::BOOL,
            Value::Byte(_) => TypeId::BYTE,
            Value::Short(_) => TypeId::SHORT,
            Value::Int(_) => TypeId::INT,
            Value::Int64(_) => TypeId::INT64,
            Value::Float(_) => TypeId::FLOAT,
            Value::Double(_) => TypeId::DOUBLE,
            Value::Char(_) => TypeId::CHAR,
            Value::Vector(v) => self.state.types.vector(TypeId::FLOAT, v.dim())?,
            Value::Object(None) => TypeId::NIL,
            Value::Object(Some(_)) => {
                return Err(BindError::Rejected(
                    "object handles cannot be embedded in a node tree".to_owned(),
                ))
            }
        };
        Ok(Node::leaf(NodeKind::Constant(value), ty))
    }

    pub fn string(&self, text: &str) -> Node {
        Node::leaf(NodeKind::StringLiteral(Arc::from(text)), TypeId::STRING)
    }

    pub fn nil(&self) -> Node {
        Node::leaf(NodeKind::Constant(Value::NIL), TypeId::NIL)
    }

    /// A stand-in for argument `index` of a template tree, erased later
    /// with [`Node::erase_placements`].
    pub fn placement(&self, index: usize, ty: TypeId) -> Node {
        Node::leaf(NodeKind::Placement(index), ty)
    }

    // === Variables ===

    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop_scope(&mut self) -> Result<(), BindError> {
        if self.scopes.len() <= 1 {
            return Err(BindError::ScopeUnderflow);
        }
        self.scopes.pop();
        Ok(())
    }

    /// Declare a local in the innermost scope and return its slot.
    pub fn declare_local(&mut self, name: &str, ty: TypeId) -> Result<usize, BindError> {
        let name = Name::intern(name);
        let slot = self.locals.len();
        let Some(scope) = self.scopes.last_mut() else {
            return Err(BindError::ScopeUnderflow);
        };
        if scope.contains_key(&name) {
            return Err(SymbolError::Duplicate {
                name,
                scope: "local scope".to_owned(),
            }
            .into());
        }
        scope.insert(name, (slot, ty));
        self.locals.push(ty);
        Ok(slot)
    }

    /// Reference to a local, parameter or global, innermost first.
    pub fn variable(&self, name: &str) -> Result<Node, BindError> {
        match self.lookup_variable(name)? {
            Variable::Local(slot, ty) => Ok(Node::leaf(NodeKind::Local(slot), ty)),
            Variable::Parameter(index, ty) => Ok(Node::leaf(NodeKind::Parameter(index), ty)),
            Variable::Global(slot, ty) => Ok(Node::leaf(NodeKind::Global(slot), ty)),
        }
    }

    /// Store `value` into a local or global. Parameters are read-only.
    pub fn assign(&mut self, name: &str, value: Node) -> Result<Node, BindError> {
        let (kind, ty) = match self.lookup_variable(name)? {
            Variable::Local(slot, ty) => (NodeKind::AssignLocal(slot), ty),
            Variable::Global(slot, ty) => (NodeKind::AssignGlobal(slot), ty),
            Variable::Parameter(..) => return Err(BindError::ImmutableParameter(name.to_owned())),
        };
        self.check_assignable(name, ty, value.ty)?;
        Ok(Node::new(kind, ty, vec![value]))
    }

    fn lookup_variable(&self, name: &str) -> Result<Variable, BindError> {
        let unknown = || BindError::UnknownName(name.to_owned());
        if let Some(key) = mu_ir::global_interner().get(name) {
            for scope in self.scopes.iter().rev() {
                if let Some(&(slot, ty)) = scope.get(&key) {
                    return Ok(Variable::Local(slot, ty));
                }
            }
            if let Some(index) = self.params.iter().rposition(|&(n, _)| n == key) {
                return Ok(Variable::Parameter(index, self.params[index].1));
            }
        }
        let symbols = &self.state.symbols;
        let found = symbols.resolve(self.scope, name);
        let kind = found
            .first()
            .and_then(|&id| symbols.get(id))
            .map(|s| s.kind)
            .ok_or_else(unknown)?;
        match kind {
            SymbolKind::Global { slot, ty } => Ok(Variable::Global(slot, ty)),
            _ => Err(unknown()),
        }
    }

    fn check_assignable(&self, name: &str, target: TypeId, value: TypeId) -> Result<(), BindError> {
        let types = &self.state.types;
        if types.match_type(target, value, &mut Bindings::new()).is_match() {
            Ok(())
        } else {
            Err(BindError::AssignmentType {
                name: name.to_owned(),
                ty: types.name(target),
                value: types.name(value),
            })
        }
    }

    // === Calls ===

    /// Call the overload of `name` visible from this scope that best fits
    /// `args`. Construct calls keep their operands unevaluated.
    pub fn call(&mut self, name: &str, args: Vec<Node>) -> Result<Node, BindError> {
        let candidates = self.state.symbols.resolve(self.scope, name);
        let arg_types: SmallVec<[TypeId; 4]> = args.iter().map(|a| a.ty).collect();
        let resolved = self.state.symbols.resolve_overload(
            &mut self.state.types,
            Name::intern(name),
            &candidates,
            &arg_types,
        )?;
        self.bind_resolved(&resolved, args)
    }

    /// Call a specific function, still checking the arguments against its
    /// signature.
    pub fn call_function(&mut self, function: FunctionId, args: Vec<Node>) -> Result<Node, BindError> {
        let f = self.state.functions.function(function)?;
        let (name, symbol) = (f.name, f.symbol);
        let symbol = symbol.ok_or(BindError::UnknownFunction(function.raw()))?;
        let arg_types: SmallVec<[TypeId; 4]> = args.iter().map(|a| a.ty).collect();
        let resolved = self.state.symbols.resolve_overload(
            &mut self.state.types,
            name,
            &[symbol],
            &arg_types,
        )?;
        self.bind_resolved(&resolved, args)
    }

    /// Call method `name` on `receiver`.
    ///
    /// Interface receivers dispatch through the vtable slot of the matching
    /// interface method. Class receivers pick an overload among the
    /// methods of the static class and its superclasses, then re-dispatch
    /// on the runtime class when evaluated.
    pub fn method_call(
        &mut self,
        receiver: Node,
        name: &str,
        args: Vec<Node>,
    ) -> Result<Node, BindError> {
        let recv_ty = receiver.ty;
        let method = Name::intern(name);
        let no_such_method = |state: &ContextState| BindError::NoSuchMethod {
            ty: state.types.name(recv_ty),
            method: name.to_owned(),
        };

        if self.state.types.interface(recv_ty).is_some() {
            let (slot, ret) = self
                .interface_slot(recv_ty, method, &args)
                .ok_or_else(|| no_such_method(self.state))?;
            let mut children = Vec::with_capacity(args.len() + 1);
            children.push(receiver);
            children.extend(args);
            return Ok(Node::new(
                NodeKind::InterfaceCall {
                    interface: recv_ty,
                    slot,
                },
                ret,
                children,
            ));
        }

        let chain = self
            .state
            .types
            .inheritance_chain(recv_ty)
            .map_err(|_| no_such_method(self.state))?;
        let mut candidates: SmallVec<[SymbolId; 4]> = SmallVec::new();
        for class in chain {
            let Some(symbol) = self.state.type_symbol(class).and_then(|s| self.state.symbols.get(s))
            else {
                continue;
            };
            candidates.extend(symbol.lookup_local(method).iter().copied());
        }
        if candidates.is_empty() {
            return Err(no_such_method(self.state));
        }

        let mut arg_types: SmallVec<[TypeId; 4]> = SmallVec::with_capacity(args.len() + 1);
        arg_types.push(recv_ty);
        arg_types.extend(args.iter().map(|a| a.ty));
        let resolved =
            self.state
                .symbols
                .resolve_overload(&mut self.state.types, method, &candidates, &arg_types)?;

        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(receiver);
        full.extend(args);
        let mut node = self.bind_resolved(&resolved, full)?;
        if let NodeKind::Call(function) = node.kind {
            node.kind = NodeKind::VirtualCall(function);
        }
        Ok(node)
    }

    fn interface_slot(&self, interface: TypeId, method: Name, args: &[Node]) -> Option<(usize, TypeId)> {
        let types = &self.state.types;
        let data = types.interface(interface)?;
        data.methods.iter().enumerate().find_map(|(slot, m)| {
            if m.name != method {
                return None;
            }
            let sig = types.function_signature(m.signature)?;
            if sig.params.len() != args.len() + 1 {
                return None;
            }
            let mut bindings = Bindings::new();
            let fits = sig.params[1..]
                .iter()
                .zip(args)
                .all(|(&formal, arg)| types.match_type(formal, arg.ty, &mut bindings).is_match());
            fits.then_some((slot, sig.ret))
        })
    }

    fn bind_resolved(&mut self, resolved: &Resolved, mut args: Vec<Node>) -> Result<Node, BindError> {
        let function = self.state.functions.function(resolved.function)?;
        let construct = function.is_construct();
        let defaults: SmallVec<[(Value, TypeId); 2]> = function
            .params
            .iter()
            .skip(args.len())
            .map_while(|p| p.default.map(|d| (d, p.ty)))
            .collect();
        for (value, ty) in defaults {
            args.push(Node::leaf(NodeKind::Constant(value), ty));
        }
        let kind = if construct {
            NodeKind::Construct(resolved.function)
        } else {
            NodeKind::Call(resolved.function)
        };
        Ok(Node::new(kind, resolved.return_type, args))
    }

    // === Objects ===

    /// Allocate a zeroed instance. Classes must be frozen.
    pub fn new_object(&mut self, ty: TypeId) -> Result<Node, BindError> {
        let types = &self.state.types;
        match types.kind(ty) {
            Some(TypeKind::Class(_)) => {
                types.layout(ty)?;
            }
            Some(
                TypeKind::DynamicArray { .. }
                | TypeKind::FixedArray { .. }
                | TypeKind::Variant(_)
                | TypeKind::String,
            ) => {}
            Some(_) => {
                return Err(BindError::Rejected(format!(
                    "values of type {} are not heap objects",
                    types.name(ty)
                )))
            }
            None => return Err(TypeError::UnknownType(ty.raw()).into()),
        }
        Ok(Node::leaf(NodeKind::New(ty), ty))
    }

    /// Load field `name` of a class instance.
    pub fn field(&mut self, object: Node, name: &str) -> Result<Node, BindError> {
        let slot = self.field_slot(object.ty, name)?;
        Ok(Node::new(
            NodeKind::Field {
                offset: slot.offset,
                rep: slot.rep,
            },
            slot.ty,
            vec![object],
        ))
    }

    /// Store `value` into field `name`; evaluates to `value`.
    pub fn set_field(&mut self, object: Node, name: &str, value: Node) -> Result<Node, BindError> {
        let slot = self.field_slot(object.ty, name)?;
        self.check_assignable(name, slot.ty, value.ty)?;
        Ok(Node::new(
            NodeKind::AssignField {
                offset: slot.offset,
                rep: slot.rep,
            },
            slot.ty,
            vec![object, value],
        ))
    }

    fn field_slot(&self, class: TypeId, name: &str) -> Result<mu_types::FieldSlot, BindError> {
        let types = &self.state.types;
        let layout = types.layout(class)?;
        mu_ir::global_interner()
            .get(name)
            .and_then(|n| layout.field(n))
            .copied()
            .ok_or_else(|| BindError::NoSuchField {
                ty: types.name(class),
                field: name.to_owned(),
            })
    }

    // === Finishing ===

    /// Seal a top-level unit. Placement parameters must all be erased.
    pub fn finish(self, root: Node) -> Result<CompiledUnit, BindError> {
        if let Some(index) = root.find_placement() {
            return Err(BindError::UnerasedPlacement { index });
        }
        let locals = self.initial_locals();
        Ok(CompiledUnit::new(root, locals))
    }

    /// Install `root` as the body of the function this assembler was
    /// created for.
    pub fn finish_function(self, root: Node) -> Result<FunctionId, BindError> {
        let Some(function) = self.function else {
            return Err(BindError::Rejected(
                "assembler is not building a function body".to_owned(),
            ));
        };
        if let Some(index) = root.find_placement() {
            return Err(BindError::UnerasedPlacement { index });
        }
        let locals = self.initial_locals();
        self.state.set_tree_body(function, root, locals)?;
        Ok(function)
    }

    /// Locals start at their representation's zero value.
    fn initial_locals(&self) -> Arc<[Value]> {
        self.locals
            .iter()
            .map(|&ty| self.state.types.machine_rep(ty).default_value())
            .collect()
    }
}

enum Variable {
    Local(usize, TypeId),
    Parameter(usize, TypeId),
    Global(mu_ir::GlobalSlot, TypeId),
}
