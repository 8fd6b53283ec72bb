//! Functions and constructs.
//!
//! A [`Function`] is anything a call node can invoke: a native Rust
//! closure, an interpreted node tree, or a construct. Constructs receive
//! their operands unevaluated (per [`OperandMode`]) and decide themselves
//! which to evaluate and how often, which is how `if`, `while` and `&&`
//! are ordinary library functions rather than evaluator special cases.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use mu_ir::{FunctionId, Name, SymbolId};
use mu_types::{TypeId, Value};
use smallvec::SmallVec;

use crate::{BindError, EvalResult, Evaluator, Node, Operands};

bitflags! {
    /// Properties a front-end or optimizer may rely on.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FunctionAttributes: u16 {
        /// Spelled as an operator (`+`, `<`).
        const OPERATOR = 1 << 0;
        /// Operator declared as a class member.
        const MEMBER_OPERATOR = 1 << 1;
        const COMMUTATIVE = 1 << 2;
        /// Converts its single argument to another type.
        const CAST = 1 << 3;
        /// A cast that may lose information.
        const LOSSY = 1 << 4;
        /// Result depends only on the arguments.
        const MAPPED = 1 << 5;
        const NO_SIDE_EFFECTS = 1 << 6;
        const NATIVE = 1 << 7;
        /// Returned reference is retained for the caller.
        const RETAINING = 1 << 8;
        /// Receiver is the first parameter.
        const METHOD = 1 << 9;
        /// Synthesized by the runtime rather than declared.
        const GENERATED = 1 << 10;
        const CONSTRUCT = 1 << 11;

        const PURE = Self::MAPPED.bits() | Self::NO_SIDE_EFFECTS.bits();
    }
}

impl FunctionAttributes {
    #[inline]
    pub fn is_pure(self) -> bool {
        self.contains(Self::PURE)
    }

    #[inline]
    pub fn is_native(self) -> bool {
        self.contains(Self::NATIVE)
    }

    #[inline]
    pub fn is_construct(self) -> bool {
        self.contains(Self::CONSTRUCT)
    }

    #[inline]
    pub fn is_method(self) -> bool {
        self.contains(Self::METHOD)
    }
}

/// How a construct receives one operand.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperandMode {
    /// Evaluated before the construct runs, like a function argument.
    Eager,
    /// Evaluated at most once, on demand.
    Lazy,
    /// Evaluated anew on every request.
    Repeated,
}

/// Host implementation of a function. Arguments arrive in declaration
/// order with defaults already filled in.
pub type NativeFn = Arc<dyn Fn(&mut Evaluator<'_>, &[Value]) -> EvalResult + Send + Sync>;

/// Host implementation of a construct.
pub type ConstructFn = Arc<dyn Fn(&mut Operands<'_, '_>) -> EvalResult + Send + Sync>;

/// What running a function does.
#[derive(Clone)]
pub enum FunctionBody {
    Native(NativeFn),
    Construct {
        run: ConstructFn,
        /// Mode per operand; the last one repeats for variadic constructs.
        modes: SmallVec<[OperandMode; 4]>,
    },
    /// Interpreted body and the initial values of its local slots.
    Tree { root: Arc<Node>, locals: Arc<[Value]> },
    /// Declared, body not yet supplied.
    Abstract,
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(_) => f.write_str("Native"),
            Self::Construct { modes, .. } => f.debug_tuple("Construct").field(modes).finish(),
            Self::Tree { locals, .. } => f
                .debug_struct("Tree")
                .field("locals", &locals.len())
                .finish(),
            Self::Abstract => f.write_str("Abstract"),
        }
    }
}

/// A declared parameter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Name,
    pub ty: TypeId,
    /// Filled in when the caller omits this and every later argument.
    pub default: Option<Value>,
}

/// A callable entity.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Name,
    /// Symbol naming this function; set once registered.
    pub symbol: Option<SymbolId>,
    pub params: Vec<Param>,
    /// Accepts any number of arguments after `params`.
    pub variadic: bool,
    pub ret: TypeId,
    /// Function type `(ret;params...)`.
    pub signature: TypeId,
    pub attributes: FunctionAttributes,
    pub body: FunctionBody,
    /// Class whose method this is.
    pub owner: Option<TypeId>,
}

impl Function {
    /// Parameters a caller must supply.
    pub fn min_args(&self) -> usize {
        self.params.iter().take_while(|p| p.default.is_none()).count()
    }

    pub fn is_construct(&self) -> bool {
        matches!(self.body, FunctionBody::Construct { .. })
    }

    /// Evaluation mode of construct operand `index`; `Eager` for ordinary
    /// functions.
    pub fn operand_mode(&self, index: usize) -> OperandMode {
        match &self.body {
            FunctionBody::Construct { modes, .. } => modes
                .get(index)
                .or_else(|| modes.last())
                .copied()
                .unwrap_or(OperandMode::Eager),
            _ => OperandMode::Eager,
        }
    }
}

/// Every function in a context, indexed by [`FunctionId`].
#[derive(Clone, Debug, Default)]
pub struct FunctionTable {
    functions: Vec<Function>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    #[inline]
    pub fn get(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// Look up a function, failing on an unknown handle.
    pub fn function(&self, id: FunctionId) -> Result<&Function, BindError> {
        self.get(id).ok_or(BindError::UnknownFunction(id.raw()))
    }

    pub(crate) fn get_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(id.index())
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.functions.truncate(len);
    }

    pub(crate) fn push(&mut self, function: Function) -> FunctionId {
        let id = FunctionId::from_usize(self.functions.len());
        self.functions.push(function);
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FunctionId::from_usize(i), f))
    }
}

/// Declares a function.
///
/// ```text
/// FunctionBuilder::new("area")
///     .param("w", TypeId::FLOAT)
///     .param_with_default("h", TypeId::FLOAT, Value::Float(1.0))
///     .returns(TypeId::FLOAT)
///     .native(|_, args| ...)
/// ```
///
/// Registered with [`ContextState::define_function`](crate::ContextState::define_function).
#[derive(Clone, Debug)]
pub struct FunctionBuilder {
    pub(crate) name: Name,
    pub(crate) params: Vec<Param>,
    pub(crate) variadic: bool,
    pub(crate) ret: TypeId,
    pub(crate) attributes: FunctionAttributes,
    pub(crate) body: FunctionBody,
    pub(crate) method_of: Option<TypeId>,
}

impl FunctionBuilder {
    /// A function named `name` returning void with an abstract body.
    pub fn new(name: &str) -> Self {
        Self {
            name: Name::intern(name),
            params: Vec::new(),
            variadic: false,
            ret: TypeId::VOID,
            attributes: FunctionAttributes::empty(),
            body: FunctionBody::Abstract,
            method_of: None,
        }
    }

    #[must_use]
    pub fn param(mut self, name: &str, ty: TypeId) -> Self {
        self.params.push(Param {
            name: Name::intern(name),
            ty,
            default: None,
        });
        self
    }

    #[must_use]
    pub fn param_with_default(mut self, name: &str, ty: TypeId, default: Value) -> Self {
        self.params.push(Param {
            name: Name::intern(name),
            ty,
            default: Some(default),
        });
        self
    }

    /// Accept any number of further arguments (`...`).
    #[must_use]
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    #[must_use]
    pub fn returns(mut self, ty: TypeId) -> Self {
        self.ret = ty;
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: FunctionAttributes) -> Self {
        self.attributes |= attributes;
        self
    }

    /// Make this a method of `class`. A `this` parameter of the class type
    /// is prepended when the function is defined.
    #[must_use]
    pub fn method_of(mut self, class: TypeId) -> Self {
        self.method_of = Some(class);
        self.attributes |= FunctionAttributes::METHOD;
        self
    }

    #[must_use]
    pub fn native<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut Evaluator<'_>, &[Value]) -> EvalResult + Send + Sync + 'static,
    {
        self.body = FunctionBody::Native(Arc::new(f));
        self.attributes |= FunctionAttributes::NATIVE;
        self
    }

    pub fn name(&self) -> Name {
        self.name
    }
}

/// Declares a construct: a function whose operands are handed over
/// unevaluated.
#[derive(Debug)]
pub struct ConstructBuilder {
    inner: FunctionBuilder,
    modes: SmallVec<[OperandMode; 4]>,
}

impl ConstructBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            inner: FunctionBuilder::new(name).attributes(FunctionAttributes::CONSTRUCT),
            modes: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn operand(mut self, name: &str, ty: TypeId, mode: OperandMode) -> Self {
        self.inner = self.inner.param(name, ty);
        self.modes.push(mode);
        self
    }

    /// Accept any number of further operands, each passed with `mode`.
    #[must_use]
    pub fn variadic(mut self, mode: OperandMode) -> Self {
        self.inner = self.inner.variadic();
        self.modes.push(mode);
        self
    }

    #[must_use]
    pub fn returns(mut self, ty: TypeId) -> Self {
        self.inner = self.inner.returns(ty);
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: FunctionAttributes) -> Self {
        self.inner = self.inner.attributes(attributes);
        self
    }

    /// Finish with the construct's implementation.
    pub fn build<F>(mut self, run: F) -> FunctionBuilder
    where
        F: Fn(&mut Operands<'_, '_>) -> EvalResult + Send + Sync + 'static,
    {
        self.inner.body = FunctionBody::Construct {
            run: Arc::new(run),
            modes: self.modes,
        };
        self.inner.attributes |= FunctionAttributes::NATIVE;
        self.inner
    }
}
