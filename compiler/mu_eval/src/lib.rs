//! Mu Eval - the execution half of the Mu runtime.
//!
//! A host builds a [`Context`], loads native modules into it, binds node
//! trees with a [`NodeAssembler`], and evaluates them on a [`Thread`]
//! inside a [`Process`].
//!
//! # Architecture
//!
//! - [`Context`]: shared definitions (types, symbols, functions, globals)
//!   behind one read-write lock, with transactional module loading
//! - [`Process`]: an isolated [`Heap`] plus global values; processes run in
//!   parallel against one context
//! - [`Thread`]: evaluation stack and call frames; every stack slot is a
//!   collection root
//! - [`Evaluator`]: the tree walker, including virtual and interface
//!   dispatch and construct operands ([`Operands`])
//! - [`Heap`]: mark-and-sweep collection with generation-checked handles
//!   and [`ExternalRoots`] for host retain/release
//!
//! The base module (types, control-flow constructs, primitive operators,
//! strings and dynamic arrays) is installed into every context's global
//! scope.

mod base;
mod config;
mod context;
pub mod errors;
mod eval;
mod function;
mod heap;
mod node;
mod print_handler;
mod process;

use std::sync::Once;

pub use config::{EvalLimits, GcConfig};
pub use context::{
    Context, ContextBuilder, ContextState, FnModule, GlobalDecl, ModuleBuilder, NativeModule,
    StateSnapshot,
};
pub use errors::{
    BacktraceFrame, BindError, EvalBacktrace, EvalError, EvalErrorKind, EvalResult, HeapError,
    ModuleError,
};
pub use eval::{Evaluator, Operands};
pub use function::{
    ConstructBuilder, ConstructFn, Function, FunctionAttributes, FunctionBody, FunctionBuilder,
    FunctionTable, NativeFn, OperandMode, Param,
};
pub use heap::{ExternalRoots, GcBarrier, GcStats, Heap, ObjectHeader};
pub use node::{CompiledUnit, Node, NodeAssembler, NodeKind};
pub use print_handler::{
    buffer_handler, silent_handler, stdout_handler, BufferPrintHandler, PrintHandlerImpl,
    SharedPrintHandler,
};
pub use process::{AbortHandle, Process, Thread, ThreadState};

// The pieces of the lower crates every host needs.
pub use mu_ir::{FunctionId, GlobalSlot, Name, ObjectId, SymbolId};
pub use mu_symbols::SymbolTable;
pub use mu_types::{TypeId, Value};

static TRACING_INIT: Once = Once::new();

/// Install a hierarchical tracing subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set, and only the first call has any
/// effect, so tests and hosts may call it freely.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            let tree = tracing_tree::HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true);
            // Another subscriber may already be installed by the host.
            let _ = tracing_subscriber::registry().with(tree).with(filter).try_init();
        }
    });
}
