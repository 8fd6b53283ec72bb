//! Processes and threads.
//!
//! A [`Process`] owns a heap and the values of the context's globals; it
//! is the unit of isolation, so separate processes may evaluate in
//! parallel against one shared context. A [`Thread`] owns an evaluation
//! stack and call frames and runs code inside one process at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mu_ir::{FunctionId, GlobalSlot};
use mu_types::{TypePool, Value};

use crate::{
    CompiledUnit, Context, ContextState, EvalErrorKind, EvalLimits, EvalResult, Evaluator,
    ExternalRoots, Heap, HeapError,
};

/// Heap, globals and external roots of one isolated evaluation domain.
pub struct Process {
    context: Arc<Context>,
    pub(crate) heap: Heap,
    pub(crate) globals: Vec<Value>,
}

impl Process {
    pub fn new(context: &Arc<Context>) -> Self {
        Self {
            context: Arc::clone(context),
            heap: Heap::new(context.gc_config().clone()),
            globals: Vec::new(),
        }
    }

    #[inline]
    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    #[inline]
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Handle for retaining and releasing from any OS thread.
    pub fn external_roots(&self) -> ExternalRoots {
        self.heap.external_roots().clone()
    }

    /// Keep `value`'s object alive until a matching [`Process::release`].
    /// Scalars and nil are ignored.
    pub fn retain(&self, value: Value) -> Result<(), HeapError> {
        let Some(object) = value.as_object() else {
            return Ok(());
        };
        self.heap.type_of(object)?;
        self.heap.external_roots().retain(object);
        Ok(())
    }

    pub fn release(&self, value: Value) -> Result<(), HeapError> {
        let Some(object) = value.as_object() else {
            return Ok(());
        };
        self.heap.external_roots().release(object).map(|_| ())
    }

    pub fn new_string(&mut self, text: impl Into<String>) -> Result<Value, HeapError> {
        Ok(Value::Object(Some(self.heap.allocate_string(text)?)))
    }

    /// Text of a string object.
    pub fn text(&self, value: Value) -> Option<&str> {
        self.heap.text(value.as_object()?).ok()
    }

    /// Current value of a global in this process.
    pub fn global(&self, slot: GlobalSlot) -> Option<Value> {
        self.globals.get(slot.index()).copied().or_else(|| {
            self.context
                .read()
                .global(slot)
                .map(|decl| decl.initial)
        })
    }

    /// Collect now, with only globals and external roots as roots.
    ///
    /// Must not be called while a thread of this process is running; the
    /// borrow checker enforces this since running takes `&mut Process`.
    pub fn collect_garbage(&mut self) -> usize {
        let context = Arc::clone(&self.context);
        let state = context.read();
        self.sync_globals(&state);
        self.heap.collect(state.types(), self.globals.iter().copied())
    }

    pub(crate) fn collect_with_stack(&mut self, types: &TypePool, stack: &[Value]) -> usize {
        let roots = stack.iter().chain(&self.globals).copied();
        self.heap.collect(types, roots)
    }

    /// Give globals declared since the last run their initial values.
    pub(crate) fn sync_globals(&mut self, state: &ContextState) {
        let known = self.globals.len();
        if let Some(new) = state.globals.get(known..) {
            self.globals.extend(new.iter().map(|decl| decl.initial));
        }
    }
}

/// Lets the host stop a running thread from another OS thread. The
/// thread fails with `Aborted` at its next node boundary.
///
/// A request only reaches the run in progress: starting a run clears
/// whatever was requested while the thread was idle.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Consume a pending abort request.
    pub(crate) fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Where a thread is in its lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ThreadState {
    Idle,
    Running,
    /// The last run produced a value.
    Returned,
    /// The last run ended with an error.
    Raised,
}

/// One activation on a thread.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Frame {
    /// `None` for a top-level unit.
    pub(crate) function: Option<FunctionId>,
    pub(crate) base: usize,
    pub(crate) params: usize,
    /// Construct activations do not own variables: operands still refer
    /// to the enclosing frame's parameters and locals.
    pub(crate) transparent: bool,
}

/// An evaluation stack and its call frames.
pub struct Thread {
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) abort: AbortHandle,
    pub(crate) limits: EvalLimits,
    state: ThreadState,
}

impl Thread {
    pub fn new(process: &Process) -> Self {
        Self {
            stack: Vec::new(),
            frames: Vec::new(),
            abort: AbortHandle::default(),
            limits: process.context().limits(),
            state: ThreadState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Values currently on the evaluation stack.
    #[inline]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Active frames, constructs included.
    #[inline]
    pub fn call_depth(&self) -> usize {
        self.frames.len()
    }

    /// Evaluate a bound unit.
    ///
    /// A returned object is only guaranteed to survive until the next
    /// evaluation in `process`; retain it to keep it longer.
    #[tracing::instrument(level = "debug", skip_all, fields(nodes = unit.root().size()))]
    pub fn run(&mut self, process: &mut Process, unit: &CompiledUnit) -> EvalResult {
        self.enter(process, |ev| ev.run_unit(unit))
    }

    /// Invoke `function` with `args`, filling omitted trailing arguments
    /// from their defaults.
    pub fn call(&mut self, process: &mut Process, function: FunctionId, args: &[Value]) -> EvalResult {
        self.enter(process, |ev| ev.call(function, args))
    }

    fn enter(
        &mut self,
        process: &mut Process,
        body: impl FnOnce(&mut Evaluator<'_>) -> EvalResult,
    ) -> EvalResult {
        let context = Arc::clone(process.context());
        let state = context.read();
        process.sync_globals(&state);

        self.abort.clear();
        self.state = ThreadState::Running;
        let base = self.stack.len();
        let result = {
            let mut ev = Evaluator::new(&state, &context, process, self);
            body(&mut ev)
        };
        self.stack.truncate(base);
        self.frames.clear();

        self.state = match &result {
            Ok(_) => ThreadState::Returned,
            Err(err) => {
                if err.kind == EvalErrorKind::Aborted {
                    tracing::warn!("run aborted by host");
                } else {
                    tracing::debug!(error = %err, "run failed");
                }
                ThreadState::Raised
            }
        };
        result
    }
}
