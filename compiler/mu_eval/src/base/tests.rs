use std::sync::Arc;

use mu_ir::GlobalSlot;
use mu_symbols::SymbolKind;
use pretty_assertions::assert_eq;

use super::*;
use crate::{
    buffer_handler, BindError, Context, EvalErrorKind, Node, NodeAssembler, Process,
    SharedPrintHandler, Thread,
};

const GLOBAL: SymbolId = SymbolTable::GLOBAL;

fn context() -> (Arc<Context>, SharedPrintHandler) {
    let out = buffer_handler();
    let context = Context::builder()
        .print_handler(Arc::clone(&out))
        .build()
        .unwrap();
    (context, out)
}

/// Compile and run a unit in a fresh process, returning the process so
/// globals can be inspected.
fn run<F>(context: &Arc<Context>, body: F) -> (Process, EvalResult)
where
    F: FnOnce(&mut NodeAssembler<'_>) -> Result<Node, BindError>,
{
    let unit = context.compile(GLOBAL, body).unwrap();
    let mut process = Process::new(context);
    let mut thread = Thread::new(&process);
    let result = thread.run(&mut process, &unit);
    (process, result)
}

fn global(context: &Context, name: &str, ty: TypeId, initial: Value) -> GlobalSlot {
    context
        .update(|state| state.define_global(GLOBAL, name, ty, initial))
        .unwrap()
}

#[test]
fn builtin_types_and_patterns_resolve_by_name() {
    let (context, _) = context();
    let state = context.read();
    assert_eq!(state.resolve_type(GLOBAL, "int").unwrap(), TypeId::INT);
    assert_eq!(state.resolve_type(GLOBAL, "string").unwrap(), TypeId::STRING);
    assert_eq!(
        state.resolve_type(GLOBAL, "?dyn_array").unwrap(),
        TypeId::MATCH_ANY_DYNAMIC_ARRAY
    );
    assert!(state.type_symbol(TypeId::DOUBLE).is_some());
}

#[test]
fn modifiers_are_registered() {
    let (context, _) = context();
    let state = context.read();
    let symbols = state.symbols();
    let kind = |name: &str| {
        let found = symbols.resolve(GLOBAL, name);
        symbols.get(found[0]).unwrap().kind
    };
    assert!(matches!(kind("vector"), SymbolKind::TypeModifier(_)));
    assert!(matches!(kind("array"), SymbolKind::TypeModifier(_)));
    assert!(matches!(kind("const"), SymbolKind::ParameterModifier));
}

#[test]
fn print_goes_to_the_context_sink() {
    let (context, out) = context();
    let (_, result) = run(&context, |a| {
        let text = a.string("hello");
        let number = a.constant(Value::Int(42))?;
        let nil = a.nil();
        let first = a.call("print", vec![text])?;
        let second = a.call("print", vec![number])?;
        let third = a.call("print", vec![nil])?;
        a.call("block", vec![first, second, third])
    });
    assert_eq!(result, Ok(Value::Void));
    assert_eq!(out.output(), "hello\n42\nnil\n");
}

#[test]
fn string_concatenation_and_size() {
    let (context, _) = context();
    let (_, result) = run(&context, |a| {
        let joined = a.call("+", vec![a.string("ab"), a.string("cdé")])?;
        a.call("size", vec![joined])
    });
    assert_eq!(result, Ok(Value::Int(5)));
}

#[test]
fn string_equality_compares_text() {
    let (context, _) = context();
    let (_, same) = run(&context, |a| a.call("==", vec![a.string("x"), a.string("x")]));
    assert_eq!(same, Ok(Value::Bool(true)));
    let (_, differ) = run(&context, |a| a.call("!=", vec![a.string("x"), a.string("y")]));
    assert_eq!(differ, Ok(Value::Bool(true)));
}

#[test]
fn to_string_formats_scalars() {
    let (context, _) = context();
    let slot = global(&context, "text", TypeId::STRING, Value::NIL);
    let (process, result) = run(&context, |a| {
        let seven = a.constant(Value::Int(7))?;
        let text = a.call("to_string", vec![seven])?;
        a.assign("text", text)
    });
    assert!(result.is_ok());
    let text = process.global(slot).unwrap();
    assert_eq!(process.text(text), Some("7"));
}

#[test]
fn raise_fails_with_message() {
    let (context, _) = context();
    let (_, result) = run(&context, |a| a.call("raise", vec![a.string("boom")]));
    let err = result.unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::Raised {
            message: "boom".to_owned()
        }
    );
    assert!(err.is_catchable());
}

#[test]
fn dynamic_arrays_push_index_and_set() {
    let (context, _) = context();
    let ints = context.update(|s| Ok(s.types_mut().dynamic_array(TypeId::INT)?)).unwrap();
    global(&context, "xs", ints, Value::NIL);
    let total = global(&context, "total", TypeId::INT, Value::Int(0));
    let len = global(&context, "len", TypeId::INT, Value::Int(0));

    let (process, result) = run(&context, |a| {
        let fresh = a.new_object(ints)?;
        let init = a.assign("xs", fresh)?;
        let mut steps = vec![init];
        for n in [1, 2] {
            let xs = a.variable("xs")?;
            let value = a.constant(Value::Int(n))?;
            steps.push(a.call("push", vec![xs, value])?);
        }
        let (xs, zero, five) = (
            a.variable("xs")?,
            a.constant(Value::Int(0))?,
            a.constant(Value::Int(5))?,
        );
        steps.push(a.call("set", vec![xs, zero, five])?);

        let first = {
            let (xs, i) = (a.variable("xs")?, a.constant(Value::Int(0))?);
            a.call("[]", vec![xs, i])?
        };
        let second = {
            let (xs, i) = (a.variable("xs")?, a.constant(Value::Int(1))?);
            a.call("[]", vec![xs, i])?
        };
        let sum = a.call("+", vec![first, second])?;
        steps.push(a.assign("total", sum)?);
        let xs = a.variable("xs")?;
        let size = a.call("size", vec![xs])?;
        steps.push(a.assign("len", size)?);
        a.call("block", steps)
    });

    assert_eq!(result, Ok(Value::Void));
    assert_eq!(process.global(total), Some(Value::Int(7)));
    assert_eq!(process.global(len), Some(Value::Int(2)));
}

#[test]
fn rejected_push_leaves_the_array_unchanged() {
    let (context, _) = context();
    let ints = context.update(|s| Ok(s.types_mut().dynamic_array(TypeId::INT)?)).unwrap();
    let push = context
        .resolve_function(GLOBAL, "push", &[ints, TypeId::INT])
        .unwrap();
    let mut process = Process::new(&context);
    let xs = {
        let state = context.read();
        process.heap_mut().allocate_array(state.types(), ints, 2).unwrap()
    };

    let mut thread = Thread::new(&process);
    let err = thread.call(&mut process, push, &[Value::Object(Some(xs)), Value::Float(1.5)]);
    assert!(err.is_err());
    assert_eq!(process.heap().elements(xs).unwrap().len(), 8);

    thread
        .call(&mut process, push, &[Value::Object(Some(xs)), Value::Int(7)])
        .unwrap();
    assert_eq!(process.heap().elements(xs).unwrap().len(), 12);
}

#[test]
fn array_index_is_bounds_checked() {
    let (context, _) = context();
    let ints = context.update(|s| Ok(s.types_mut().dynamic_array(TypeId::INT)?)).unwrap();
    let (_, result) = run(&context, |a| {
        let xs = a.new_object(ints)?;
        let i = a.constant(Value::Int(0))?;
        a.call("[]", vec![xs, i])
    });
    assert_eq!(
        result.unwrap_err().kind,
        EvalErrorKind::IndexOutOfBounds { index: 0, len: 0 }
    );
}

#[test]
fn reference_equality_is_identity() {
    let (context, _) = context();
    let ints = context.update(|s| Ok(s.types_mut().dynamic_array(TypeId::INT)?)).unwrap();
    let (_, result) = run(&context, |a| {
        let (x, y) = (a.new_object(ints)?, a.new_object(ints)?);
        a.call("==", vec![x, y])
    });
    assert_eq!(result, Ok(Value::Bool(false)));
}
