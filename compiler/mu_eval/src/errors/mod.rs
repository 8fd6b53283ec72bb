//! Error types for binding, module loading, heap access and evaluation.
//!
//! # Categories
//!
//! - [`BindError`]: problems found while assembling node trees (unknown
//!   names, ambiguous overloads, un-erased placement parameters).
//! - [`ModuleError`]: a module failed to load; the context is rolled back.
//! - [`HeapError`]: host-facing heap misuse (unbalanced release, stale
//!   handles). Returned to the host, never raised into Mu code.
//! - [`EvalError`]: runtime failures. Factory functions (e.g.
//!   [`division_by_zero()`]) are the public way to build them; the kind
//!   decides whether a `try` construct may catch the error.

use std::fmt;

use mu_ir::{Name, ObjectId};
use mu_symbols::SymbolError;
use mu_types::{TypeError, Value};

/// Result of evaluating a node or calling a function.
pub type EvalResult = Result<Value, EvalError>;

// Bind-time errors

/// Errors raised while turning names and arguments into a node tree.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BindError {
    #[error(transparent)]
    Symbol(#[from] SymbolError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("placement parameter {index} was never substituted")]
    UnerasedPlacement { index: usize },

    #[error("placement parameter {index} has no argument ({available} given)")]
    PlacementOutOfRange { index: usize, available: usize },

    #[error("no local, parameter or global named `{0}`")]
    UnknownName(String),

    #[error("parameter `{param}` of `{function}` needs a default: it follows a defaulted parameter")]
    DefaultOrder { function: Name, param: Name },

    #[error("parameter `{0}` cannot be assigned")]
    ImmutableParameter(String),

    #[error("cannot assign {value} to `{name}` of type {ty}")]
    AssignmentType { name: String, ty: Name, value: Name },

    #[error("`{0}` is not a type")]
    NotAType(String),

    #[error("type {ty} has no field `{field}`")]
    NoSuchField { ty: Name, field: String },

    #[error("type {ty} has no method `{method}`")]
    NoSuchMethod { ty: Name, method: String },

    #[error("no function {0}")]
    UnknownFunction(u32),

    #[error("local scope stack is empty")]
    ScopeUnderflow,

    #[error("{0}")]
    Rejected(String),
}

// Module errors

/// Errors raised while loading a module into a context.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ModuleError {
    #[error("no module named `{0}` is registered")]
    Unknown(String),

    #[error("a module named `{0}` is already registered")]
    AlreadyRegistered(String),

    #[error("module dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("module `{module}` failed to initialize: {source}")]
    Initialization {
        module: String,
        #[source]
        source: BindError,
    },
}

// Heap errors

/// Host-facing heap errors.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum HeapError {
    #[error("object {0:?} was used after it was reclaimed")]
    UseAfterFree(ObjectId),

    #[error("{0:?} does not refer to a heap slot")]
    InvalidHandle(ObjectId),

    #[error("object {0:?} is not externally retained")]
    NotRetained(ObjectId),

    #[error("heap has no free slot handles left")]
    Exhausted,

    #[error("type {0} has no heap instances")]
    NotInstantiable(Name),

    #[error("object {object:?} does not hold {expected}")]
    WrongPayload {
        object: ObjectId,
        expected: &'static str,
    },

    #[error(transparent)]
    Type(#[from] TypeError),
}

// Runtime errors

/// Typed runtime error category.
#[derive(Clone, Debug, PartialEq)]
pub enum EvalErrorKind {
    // Arithmetic
    DivisionByZero,
    ModuloByZero,

    // Raised by Mu code
    Raised { message: String },

    // Values
    TypeMismatch { expected: String, got: String },
    NilReference { operation: String },
    IndexOutOfBounds { index: i64, len: usize },
    NoImplementation { class: String, interface: String },
    AbstractFunction { name: String },
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    // Fatal
    UseAfterFree { object: ObjectId },
    Aborted,
    PlacementParameter { index: usize },
    StackOverflow { depth: usize },

    Custom { message: String },
}

impl EvalErrorKind {
    /// Whether the `try` construct may handle this error.
    ///
    /// Fatal kinds mean the thread's state can no longer be trusted and
    /// always unwind to the host.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            Self::UseAfterFree { .. }
                | Self::Aborted
                | Self::PlacementParameter { .. }
                | Self::StackOverflow { .. }
        )
    }
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::ModuloByZero => write!(f, "modulo by zero"),
            Self::Raised { message } => write!(f, "{message}"),
            Self::TypeMismatch { expected, got } => {
                write!(f, "type mismatch: expected {expected}, got {got}")
            }
            Self::NilReference { operation } => write!(f, "nil reference in {operation}"),
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            Self::NoImplementation { class, interface } => {
                write!(f, "class `{class}` does not implement `{interface}`")
            }
            Self::AbstractFunction { name } => write!(f, "function `{name}` has no body"),
            Self::ArityMismatch {
                function,
                expected,
                got,
            } => write!(f, "`{function}` expects {expected} arguments, got {got}"),
            Self::UseAfterFree { object } => {
                write!(f, "object {object:?} used after it was reclaimed")
            }
            Self::Aborted => write!(f, "evaluation aborted by host"),
            Self::PlacementParameter { index } => {
                write!(f, "placement parameter {index} reached evaluation")
            }
            Self::StackOverflow { depth } => {
                write!(f, "maximum call depth of {depth} exceeded")
            }
            Self::Custom { message } => write!(f, "{message}"),
        }
    }
}

/// A single frame in an evaluation backtrace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BacktraceFrame {
    /// Qualified function name.
    pub name: String,
}

/// Snapshot of a thread's active function chain at an error site, innermost
/// call first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EvalBacktrace {
    frames: Vec<BacktraceFrame>,
}

impl EvalBacktrace {
    pub fn new(frames: Vec<BacktraceFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[BacktraceFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

impl fmt::Display for EvalBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        writeln!(f, "stack backtrace:")?;
        for (i, frame) in self.frames.iter().enumerate() {
            writeln!(f, "  {i}: {}", frame.name)?;
        }
        Ok(())
    }
}

/// Runtime error.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    /// Human-readable message; equals `kind.to_string()` for errors made by
    /// the factory functions.
    pub message: String,
    /// Function chain at the point the error left its innermost call.
    pub backtrace: Option<EvalBacktrace>,
}

impl EvalError {
    /// Create an error with a free-form message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: EvalErrorKind::Custom {
                message: message.clone(),
            },
            message,
            backtrace: None,
        }
    }

    pub(crate) fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            backtrace: None,
        }
    }

    #[must_use]
    pub fn with_backtrace(mut self, backtrace: EvalBacktrace) -> Self {
        self.backtrace = Some(backtrace);
        self
    }

    #[inline]
    pub fn is_catchable(&self) -> bool {
        self.kind.is_catchable()
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

impl From<HeapError> for EvalError {
    fn from(err: HeapError) -> Self {
        match err {
            HeapError::UseAfterFree(object) | HeapError::InvalidHandle(object) => {
                use_after_free(object)
            }
            HeapError::WrongPayload { expected, .. } => type_mismatch(expected, "another object"),
            other => EvalError::new(other.to_string()),
        }
    }
}

impl From<BindError> for EvalError {
    fn from(err: BindError) -> Self {
        EvalError::new(err.to_string())
    }
}

impl From<TypeError> for EvalError {
    fn from(err: TypeError) -> Self {
        EvalError::new(err.to_string())
    }
}

// Factory functions

#[cold]
pub fn division_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero)
}

#[cold]
pub fn modulo_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::ModuloByZero)
}

/// An exception raised by Mu code.
#[cold]
pub fn raised(message: impl Into<String>) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Raised {
        message: message.into(),
    })
}

#[cold]
pub fn type_mismatch(expected: &str, got: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::TypeMismatch {
        expected: expected.to_owned(),
        got: got.to_owned(),
    })
}

#[cold]
pub fn nil_reference(operation: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NilReference {
        operation: operation.to_owned(),
    })
}

#[cold]
pub fn index_out_of_bounds(index: i64, len: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IndexOutOfBounds { index, len })
}

#[cold]
pub fn no_implementation(class: &str, interface: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoImplementation {
        class: class.to_owned(),
        interface: interface.to_owned(),
    })
}

#[cold]
pub fn abstract_function(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::AbstractFunction {
        name: name.to_owned(),
    })
}

#[cold]
pub fn arity_mismatch(function: &str, expected: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArityMismatch {
        function: function.to_owned(),
        expected,
        got,
    })
}

#[cold]
pub fn use_after_free(object: ObjectId) -> EvalError {
    tracing::error!(?object, "use of reclaimed object");
    EvalError::from_kind(EvalErrorKind::UseAfterFree { object })
}

#[cold]
pub fn aborted() -> EvalError {
    EvalError::from_kind(EvalErrorKind::Aborted)
}

#[cold]
pub fn placement_parameter(index: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::PlacementParameter { index })
}

#[cold]
pub fn stack_overflow(depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::StackOverflow { depth })
}

#[cfg(test)]
mod tests;
