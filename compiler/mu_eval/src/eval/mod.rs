//! The node evaluator.
//!
//! An [`Evaluator`] walks bound node trees for one `run` or `call` on a
//! thread. It holds the context's read guard for its whole lifetime, so
//! the symbol table, type pool and function table cannot change under it.
//!
//! # Calling convention
//!
//! Arguments are evaluated left to right and pushed onto the thread's
//! stack, then a [`Frame`] is pushed that starts at the first argument.
//! Tree bodies push their locals right after the arguments. Leaving the
//! frame truncates the stack back to its base.
//!
//! Everything on the stack is a collection root. Collection only happens
//! at a safe point: on function entry once all arguments are pushed, and
//! on construct entry once all eager operands are pushed. Natives that
//! hold a fresh object across a nested call must [`Evaluator::protect`] it.
//!
//! # Constructs
//!
//! A construct gets its operand nodes unevaluated through [`Operands`].
//! Its frame is transparent: parameter and local references inside the
//! operands still resolve against the enclosing function's frame.

use mu_ir::{FunctionId, GlobalSlot};
use mu_stack::ensure_sufficient_stack;
use mu_types::{TypeId, TypePool, Value};
use smallvec::SmallVec;

use crate::errors::{
    abstract_function, aborted, arity_mismatch, index_out_of_bounds, nil_reference,
    no_implementation, placement_parameter, stack_overflow, type_mismatch,
};
use crate::function::{Function, FunctionBody, OperandMode};
use crate::process::Frame;
use crate::{
    BacktraceFrame, CompiledUnit, Context, ContextState, EvalBacktrace, EvalError, EvalResult,
    Heap, Node, NodeKind, Process, Thread,
};

/// Most frames recorded in an error backtrace.
const MAX_BACKTRACE_FRAMES: usize = 64;

/// Evaluation state for one run on one thread.
pub struct Evaluator<'a> {
    state: &'a ContextState,
    context: &'a Context,
    process: &'a mut Process,
    thread: &'a mut Thread,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        state: &'a ContextState,
        context: &'a Context,
        process: &'a mut Process,
        thread: &'a mut Thread,
    ) -> Self {
        Self {
            state,
            context,
            process,
            thread,
        }
    }

    // === Host-facing accessors ===

    #[inline]
    pub fn state(&self) -> &'a ContextState {
        self.state
    }

    #[inline]
    pub fn types(&self) -> &'a TypePool {
        self.state.types()
    }

    #[inline]
    pub fn context(&self) -> &'a Context {
        self.context
    }

    #[inline]
    pub fn process(&self) -> &Process {
        &*self.process
    }

    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.process.heap
    }

    #[inline]
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.process.heap
    }

    /// Write to the context's print sink.
    pub fn print(&self, text: &str) {
        self.context.print_handler().print(text);
    }

    pub fn println(&self, text: &str) {
        self.context.print_handler().println(text);
    }

    pub fn new_string(&mut self, text: impl Into<String>) -> EvalResult {
        Ok(self.process.new_string(text)?)
    }

    /// Text of a string object.
    pub fn text(&self, value: Value) -> Result<&str, EvalError> {
        let object = value
            .as_object()
            .ok_or_else(|| nil_reference("string access"))?;
        Ok(self.process.heap.text(object)?)
    }

    /// Allocate a zeroed instance of `ty`.
    pub fn allocate(&mut self, ty: TypeId) -> EvalResult {
        let object = self.process.heap.allocate(self.state.types(), ty)?;
        Ok(Value::Object(Some(object)))
    }

    /// Allocate a dynamic array of `len` zeroed elements.
    pub fn allocate_array(&mut self, ty: TypeId, len: usize) -> EvalResult {
        let object = self
            .process
            .heap
            .allocate_array(self.state.types(), ty, len)?;
        Ok(Value::Object(Some(object)))
    }

    /// Keep `value` rooted until the current native call or construct
    /// returns.
    pub fn protect(&mut self, value: Value) {
        self.thread.stack.push(value);
    }

    /// Call `function` from native code. Omitted trailing arguments are
    /// filled from their defaults.
    pub fn call(&mut self, function: FunctionId, args: &[Value]) -> EvalResult {
        let state = self.state;
        let f = state.function(function)?;
        let fixed = f.params.len();
        if args.len() < f.min_args() || (!f.variadic && args.len() > fixed) {
            let err = arity_mismatch(&state.function_name(function), fixed, args.len());
            return Err(self.attach_backtrace(err));
        }

        let base = self.thread.stack.len();
        self.thread.stack.extend_from_slice(args);
        let defaults = f.params.iter().skip(args.len()).filter_map(|p| p.default);
        self.thread.stack.extend(defaults);
        self.invoke(function, base)
    }

    /// Functions active on this thread, innermost first.
    pub fn backtrace(&self) -> EvalBacktrace {
        let frames = self
            .thread
            .frames
            .iter()
            .rev()
            .filter_map(|frame| frame.function)
            .take(MAX_BACKTRACE_FRAMES)
            .map(|function| BacktraceFrame {
                name: self.state.function_name(function),
            })
            .collect();
        EvalBacktrace::new(frames)
    }

    // === Entry points ===

    pub(crate) fn run_unit(&mut self, unit: &CompiledUnit) -> EvalResult {
        let base = self.thread.stack.len();
        self.push_frame(Frame {
            function: None,
            base,
            params: 0,
            transparent: false,
        })?;
        self.thread.stack.extend_from_slice(unit.locals());
        let result = self.eval(unit.root());
        self.leave_frame(base, result)
    }

    /// Evaluate one node, checking for a host abort first.
    pub(crate) fn eval(&mut self, node: &Node) -> EvalResult {
        if self.thread.abort.take() {
            return Err(self.attach_backtrace(aborted()));
        }
        ensure_sufficient_stack(|| self.eval_node(node))
    }

    fn eval_node(&mut self, node: &Node) -> EvalResult {
        tracing::trace!(kind = ?node.kind, "eval");
        match &node.kind {
            NodeKind::Constant(value) => Ok(*value),
            NodeKind::StringLiteral(text) => self.new_string(text.as_ref()),
            NodeKind::Call(function) => {
                let base = self.push_args(&node.children)?;
                self.invoke(*function, base)
            }
            NodeKind::Construct(function) => self.run_construct(*function, &node.children),
            NodeKind::VirtualCall(function) => {
                let base = self.push_args(&node.children)?;
                let class = self.receiver_class(base, "method call")?;
                let state = self.state;
                let f = state.function(*function)?;
                let target = state
                    .types()
                    .lookup_method(class, f.name, f.signature)
                    .unwrap_or(*function);
                self.invoke(target, base)
            }
            NodeKind::InterfaceCall { interface, slot } => {
                let base = self.push_args(&node.children)?;
                let class = self.receiver_class(base, "interface call")?;
                let types = self.state.types();
                let Some(target) = types
                    .interface_imp(class, *interface)
                    .and_then(|imp| imp.function(*slot))
                else {
                    self.thread.stack.truncate(base);
                    let err = no_implementation(
                        types.name(class).as_str(),
                        types.name(*interface).as_str(),
                    );
                    return Err(self.attach_backtrace(err));
                };
                self.invoke(target, base)
            }
            NodeKind::Parameter(index) => {
                let frame = self.variable_frame()?;
                if *index >= frame.params {
                    return Err(bad_slot("parameter", *index));
                }
                self.stack_slot(frame.base + index)
            }
            NodeKind::Local(index) => {
                let frame = self.variable_frame()?;
                self.stack_slot(frame.base + frame.params + index)
            }
            NodeKind::AssignLocal(index) => {
                let value = self.eval_child(node, 0)?;
                let frame = self.variable_frame()?;
                let slot = self
                    .thread
                    .stack
                    .get_mut(frame.base + frame.params + index)
                    .ok_or_else(|| bad_slot("local", *index))?;
                *slot = value;
                Ok(value)
            }
            NodeKind::Global(slot) => self.global(*slot).copied(),
            NodeKind::AssignGlobal(slot) => {
                let value = self.eval_child(node, 0)?;
                *self.global(*slot)? = value;
                Ok(value)
            }
            NodeKind::Field { offset, rep } => {
                let object = self.eval_child(node, 0)?;
                let object = object
                    .as_object()
                    .ok_or_else(|| nil_reference("field access"))?;
                Ok(self.process.heap.load_field(object, *offset, *rep)?)
            }
            NodeKind::AssignField { offset, rep } => {
                let mark = self.thread.stack.len();
                let object = self.eval_child(node, 0)?;
                self.protect(object);
                let value = self.eval_child(node, 1);
                self.thread.stack.truncate(mark);
                let value = value?;
                let object = object
                    .as_object()
                    .ok_or_else(|| nil_reference("field assignment"))?;
                self.process
                    .heap
                    .store_field(object, *offset, *rep, value)?;
                Ok(value)
            }
            NodeKind::New(ty) => self.allocate(*ty),
            NodeKind::Placement(index) => Err(self.attach_backtrace(placement_parameter(*index))),
        }
    }

    fn eval_child(&mut self, node: &Node, index: usize) -> EvalResult {
        let Some(child) = node.children.get(index) else {
            return Err(bad_slot("operand", index));
        };
        self.eval(child)
    }

    // === Calls ===

    /// Evaluate `args` onto the stack; returns the base of the new frame.
    fn push_args(&mut self, args: &[Node]) -> Result<usize, EvalError> {
        let base = self.thread.stack.len();
        for arg in args {
            match self.eval(arg) {
                Ok(value) => self.thread.stack.push(value),
                Err(err) => {
                    self.thread.stack.truncate(base);
                    return Err(err);
                }
            }
        }
        Ok(base)
    }

    /// Runtime class of the receiver at `base`.
    fn receiver_class(&mut self, base: usize, operation: &str) -> Result<TypeId, EvalError> {
        let receiver = self.thread.stack.get(base).copied().and_then(Value::as_object);
        let class = match receiver {
            Some(object) => self.process.heap.type_of(object).map_err(EvalError::from),
            None => Err(nil_reference(operation)),
        };
        class.map_err(|err| {
            self.thread.stack.truncate(base);
            self.attach_backtrace(err)
        })
    }

    /// Run `function` on the arguments already pushed from `base`.
    fn invoke(&mut self, function: FunctionId, base: usize) -> EvalResult {
        let state = self.state;
        let f = match state.function(function) {
            Ok(f) => f,
            Err(err) => {
                self.thread.stack.truncate(base);
                return Err(err.into());
            }
        };

        if let FunctionBody::Construct { .. } = f.body {
            // Called with values: hand them over as already-evaluated operands.
            let nodes: Vec<Node> = self.thread.stack[base..]
                .iter()
                .zip(
                    f.params
                        .iter()
                        .map(|p| p.ty)
                        .chain(std::iter::repeat(TypeId::MATCH_ANYTHING)),
                )
                .map(|(&value, ty)| Node::leaf(NodeKind::Constant(value), ty))
                .collect();
            let result = self.run_construct(function, &nodes);
            self.thread.stack.truncate(base);
            return result;
        }

        let params = self.thread.stack.len() - base;
        if let Err(err) = self.push_frame(Frame {
            function: Some(function),
            base,
            params,
            transparent: false,
        }) {
            self.thread.stack.truncate(base);
            return Err(err);
        }
        self.safe_point();

        let result = match &f.body {
            FunctionBody::Native(native) => {
                let args: SmallVec<[Value; 8]> = SmallVec::from_slice(&self.thread.stack[base..]);
                native(self, &args)
            }
            FunctionBody::Tree { root, locals } => {
                self.thread.stack.extend_from_slice(locals);
                self.eval(root)
            }
            FunctionBody::Abstract => Err(abstract_function(&state.function_name(function))),
            FunctionBody::Construct { .. } => Err(EvalError::new("construct reached a call frame")),
        };
        self.leave_frame(base, result)
    }

    fn run_construct(&mut self, function: FunctionId, nodes: &[Node]) -> EvalResult {
        let state = self.state;
        let f = state.function(function)?;
        let FunctionBody::Construct { run, .. } = &f.body else {
            return Err(EvalError::new(format!(
                "`{}` is not a construct",
                state.function_name(function)
            )));
        };

        let base = self.thread.stack.len();
        self.push_frame(Frame {
            function: Some(function),
            base,
            params: 0,
            transparent: true,
        })?;

        let mut values: SmallVec<[Option<Value>; 4]> = SmallVec::from_elem(None, nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if f.operand_mode(i) != OperandMode::Eager {
                continue;
            }
            match self.eval(node) {
                Ok(value) => {
                    self.thread.stack.push(value);
                    values[i] = Some(value);
                }
                Err(err) => return self.leave_frame(base, Err(err)),
            }
        }
        self.safe_point();

        let result = {
            let mut operands = Operands {
                ev: &mut *self,
                nodes,
                function: f,
                values,
            };
            run(&mut operands)
        };
        self.leave_frame(base, result)
    }

    // === Frames ===

    fn push_frame(&mut self, frame: Frame) -> Result<(), EvalError> {
        let max = self.thread.limits.max_call_depth;
        if self.thread.frames.len() >= max {
            tracing::warn!(depth = max, "call depth limit reached");
            return Err(self.attach_backtrace(stack_overflow(max)));
        }
        self.thread.frames.push(frame);
        Ok(())
    }

    fn leave_frame(&mut self, base: usize, result: EvalResult) -> EvalResult {
        let result = result.map_err(|err| self.attach_backtrace(err));
        self.thread.frames.pop();
        self.thread.stack.truncate(base);
        result
    }

    /// Record the active chain on an error that has none yet.
    fn attach_backtrace(&self, err: EvalError) -> EvalError {
        if err.backtrace.is_some() || self.thread.frames.is_empty() {
            return err;
        }
        err.with_backtrace(self.backtrace())
    }

    /// The innermost frame that owns parameters and locals.
    fn variable_frame(&self) -> Result<Frame, EvalError> {
        self.thread
            .frames
            .iter()
            .rev()
            .find(|frame| !frame.transparent)
            .copied()
            .ok_or_else(|| EvalError::new("variable reference outside of any frame"))
    }

    fn stack_slot(&self, index: usize) -> EvalResult {
        self.thread
            .stack
            .get(index)
            .copied()
            .ok_or_else(|| bad_slot("stack", index))
    }

    fn global(&mut self, slot: GlobalSlot) -> Result<&mut Value, EvalError> {
        self.process
            .globals
            .get_mut(slot.index())
            .ok_or_else(|| bad_slot("global", slot.index()))
    }

    fn safe_point(&mut self) {
        if self.process.heap.needs_collection() {
            let reclaimed = self
                .process
                .collect_with_stack(self.state.types(), &self.thread.stack);
            tracing::debug!(reclaimed, "collected at safe point");
        }
    }
}

#[cold]
fn bad_slot(what: &str, index: usize) -> EvalError {
    EvalError::new(format!("invalid {what} slot {index}"))
}

/// The operands of a running construct.
///
/// Eager operands are already evaluated. Lazy operands are evaluated on
/// first request and cached. Repeated operands are evaluated again on
/// every request and their values are not kept rooted.
pub struct Operands<'e, 'a> {
    ev: &'e mut Evaluator<'a>,
    nodes: &'e [Node],
    function: &'a Function,
    values: SmallVec<[Option<Value>; 4]>,
}

impl<'a> Operands<'_, 'a> {
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The construct being run.
    #[inline]
    pub fn function(&self) -> &'a Function {
        self.function
    }

    pub fn mode(&self, index: usize) -> OperandMode {
        self.function.operand_mode(index)
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Static type of operand `index`.
    pub fn ty(&self, index: usize) -> Option<TypeId> {
        self.nodes.get(index).map(|n| n.ty)
    }

    /// Value of operand `index`, evaluating it if its mode requires.
    pub fn eval(&mut self, index: usize) -> EvalResult {
        let Some(node) = self.nodes.get(index) else {
            return Err(index_out_of_bounds(
                i64::try_from(index).unwrap_or(i64::MAX),
                self.nodes.len(),
            ));
        };
        if let Some(value) = self.values.get(index).copied().flatten() {
            return Ok(value);
        }
        let value = self.ev.eval(node)?;
        if self.mode(index) != OperandMode::Repeated {
            self.ev.protect(value);
            if let Some(cached) = self.values.get_mut(index) {
                *cached = Some(value);
            }
        }
        Ok(value)
    }

    /// Evaluate operand `index` as a condition.
    pub fn eval_bool(&mut self, index: usize) -> Result<bool, EvalError> {
        let value = self.eval(index)?;
        value
            .as_bool()
            .ok_or_else(|| type_mismatch("bool", &value.to_string()))
    }

    /// The evaluator running this construct.
    pub fn evaluator(&mut self) -> &mut Evaluator<'a> {
        self.ev
    }
}
