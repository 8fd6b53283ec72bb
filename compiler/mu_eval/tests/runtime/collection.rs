//! Garbage collection while trees are running.

use std::sync::Arc;

use mu_eval::{
    silent_handler, Context, EvalErrorKind, GcConfig, HeapError, Process, Thread, TypeId, Value,
};
use pretty_assertions::assert_eq;

use super::{compile, global, run};

/// A context that wants a collection every couple of allocations.
fn eager_gc_context() -> Arc<Context> {
    Context::builder()
        .print_handler(silent_handler())
        .gc(GcConfig {
            collection_threshold: 2,
            growth_factor: 1.0,
            enabled: true,
        })
        .build()
        .unwrap()
}

#[test]
fn reachable_objects_survive_collections_mid_run() {
    let context = eager_gc_context();
    let strings = context
        .update(|s| Ok(s.types_mut().dynamic_array(TypeId::STRING)?))
        .unwrap();
    let count = global(&context, "count", TypeId::INT, Value::Int(0));
    let first = global(&context, "first", TypeId::STRING, Value::NIL);

    // xs = new string[]; while (i < 40) { push(xs, to_string(i)); i = i + 1 }
    let unit = compile(&context, |a| {
        a.declare_local("xs", strings)?;
        a.declare_local("i", TypeId::INT)?;
        let made = a.new_object(strings)?;
        let init = a.assign("xs", made)?;
        let cond = {
            let i = a.variable("i")?;
            let limit = a.constant(Value::Int(40))?;
            a.call("<", vec![i, limit])?
        };
        let push = {
            let xs = a.variable("xs")?;
            let i = a.variable("i")?;
            let text = a.call("to_string", vec![i])?;
            a.call("push", vec![xs, text])?
        };
        let step = {
            let i = a.variable("i")?;
            let one = a.constant(Value::Int(1))?;
            let next = a.call("+", vec![i, one])?;
            a.assign("i", next)?
        };
        let body = a.call("block", vec![push, step])?;
        let looped = a.call("while", vec![cond, body])?;
        let size = {
            let xs = a.variable("xs")?;
            let size = a.call("size", vec![xs])?;
            a.assign("count", size)?
        };
        let head = {
            let xs = a.variable("xs")?;
            let zero = a.constant(Value::Int(0))?;
            let item = a.call("[]", vec![xs, zero])?;
            a.assign("first", item)?
        };
        a.call("block", vec![init, looped, size, head])
    });

    let (mut process, result) = run(&context, &unit);
    result.unwrap();
    assert!(process.heap().stats().collections > 0);
    assert_eq!(process.global(count), Some(Value::Int(40)));
    let head = process.global(first).unwrap();
    assert_eq!(process.text(head), Some("0"));

    // Globals keep the first string alive; the array itself is garbage now.
    process.collect_garbage();
    assert_eq!(process.heap().live_objects(), 1);
    assert_eq!(process.text(head), Some("0"));
}

#[test]
fn barrier_defers_collection() {
    let context = eager_gc_context();
    let mut process = Process::new(&context);
    let barrier = process.heap().barrier();
    let kept = process.new_string("a").unwrap();
    let _b = process.new_string("b").unwrap();
    let _c = process.new_string("c").unwrap();
    assert!(!process.heap().needs_collection());
    assert_eq!(process.collect_garbage(), 0);
    assert_eq!(process.text(kept), Some("a"));

    drop(barrier);
    assert!(process.heap().needs_collection());
    assert_eq!(process.collect_garbage(), 3);
}

#[test]
fn released_object_is_a_use_after_free_in_later_runs() {
    let context = super::context();
    let mut process = Process::new(&context);
    let stale = process.new_string("stale").unwrap();
    process.retain(stale).unwrap();
    process.release(stale).unwrap();
    assert_eq!(process.collect_garbage(), 1);
    let object = stale.as_object().unwrap();
    assert_eq!(process.retain(stale), Err(HeapError::UseAfterFree(object)));

    // A native handed the stale handle reports it and the run stops.
    let size = context
        .resolve_function(super::GLOBAL, "size", &[TypeId::STRING])
        .unwrap();
    let mut thread = Thread::new(&process);
    let err = thread.call(&mut process, size, &[stale]).unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::UseAfterFree { object });
    assert!(!err.kind.is_catchable());
}
