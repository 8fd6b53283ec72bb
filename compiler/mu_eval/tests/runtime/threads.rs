//! Host threads: aborting a run and sharing one context between
//! processes.

use std::time::Duration;

use mu_eval::{EvalErrorKind, Process, Thread, ThreadState, TypeId, Value};
use pretty_assertions::assert_eq;
use rayon::prelude::*;

use super::{compile, context, global, GLOBAL};

#[test]
fn abort_stops_an_endless_loop_from_another_thread() {
    let context = context();
    let spins = global(&context, "spins", TypeId::INT, Value::Int(0));
    // try(while(true, spins = spins + 1), block())
    let unit = compile(&context, |a| {
        let forever = a.constant(Value::Bool(true))?;
        let step = {
            let spins = a.variable("spins")?;
            let one = a.constant(Value::Int(1))?;
            let next = a.call("+", vec![spins, one])?;
            a.assign("spins", next)?
        };
        let looped = a.call("while", vec![forever, step])?;
        let handler = a.call("block", vec![])?;
        a.call("try", vec![looped, handler])
    });

    let mut process = Process::new(&context);
    let mut thread = Thread::new(&process);
    let handle = thread.abort_handle();
    let result = std::thread::scope(|scope| {
        scope.spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.abort();
        });
        thread.run(&mut process, &unit)
    });

    let err = result.unwrap_err();
    assert_eq!(err.kind, EvalErrorKind::Aborted);
    assert_eq!(thread.state(), ThreadState::Raised);
    assert!(matches!(process.global(spins), Some(Value::Int(n)) if n > 0));

    // The request was consumed; the thread is usable again.
    let quick = compile(&context, |a| a.constant(Value::Int(1)));
    assert_eq!(thread.run(&mut process, &quick), Ok(Value::Int(1)));
}

#[test]
fn processes_share_definitions_but_not_state() {
    let context = context();
    let acc = global(&context, "acc", TypeId::INT, Value::Int(0));

    let results: Vec<(i32, Option<Value>)> = (1..=16)
        .into_par_iter()
        .map(|n| {
            // acc = acc + n, three times
            let unit = context
                .compile(GLOBAL, |a| {
                    let mut steps = Vec::new();
                    for _ in 0..3 {
                        let current = a.variable("acc")?;
                        let amount = a.constant(Value::Int(n))?;
                        let sum = a.call("+", vec![current, amount])?;
                        steps.push(a.assign("acc", sum)?);
                    }
                    a.call("block", steps)
                })
                .unwrap();
            let mut process = Process::new(&context);
            let mut thread = Thread::new(&process);
            thread.run(&mut process, &unit).unwrap();
            (n, process.global(acc))
        })
        .collect();

    for (n, value) in results {
        assert_eq!(value, Some(Value::Int(3 * n)));
    }
}

#[test]
fn globals_defined_after_a_process_starts_are_visible() {
    let context = context();
    let mut process = Process::new(&context);
    let mut thread = Thread::new(&process);

    let late = global(&context, "late", TypeId::INT, Value::Int(11));
    assert_eq!(process.global(late), Some(Value::Int(11)));
    let unit = compile(&context, |a| {
        let current = a.variable("late")?;
        let one = a.constant(Value::Int(1))?;
        let next = a.call("+", vec![current, one])?;
        a.assign("late", next)
    });
    assert_eq!(thread.run(&mut process, &unit), Ok(Value::Int(12)));
    assert_eq!(process.global(late), Some(Value::Int(12)));
    assert_eq!(Process::new(&context).global(late), Some(Value::Int(11)));
}
