use super::*;
use pretty_assertions::assert_eq;

#[test]
fn factory_message_matches_kind() {
    let err = division_by_zero();
    assert_eq!(err.kind, EvalErrorKind::DivisionByZero);
    assert_eq!(err.message, "division by zero");
    assert_eq!(err.to_string(), "division by zero");
}

#[test]
fn raised_errors_are_catchable() {
    assert!(raised("boom").is_catchable());
    assert!(division_by_zero().is_catchable());
    assert!(nil_reference("field load").is_catchable());
}

#[test]
fn fatal_errors_are_not_catchable() {
    assert!(!use_after_free(ObjectId::new(3, 1)).is_catchable());
    assert!(!aborted().is_catchable());
    assert!(!placement_parameter(0).is_catchable());
    assert!(!stack_overflow(10).is_catchable());
}

#[test]
fn stale_handle_becomes_use_after_free() {
    let id = ObjectId::new(7, 2);
    let err = EvalError::from(HeapError::UseAfterFree(id));
    assert_eq!(err.kind, EvalErrorKind::UseAfterFree { object: id });
    assert!(!err.is_catchable());
}

#[test]
fn exhausted_heap_surfaces_as_an_error() {
    let err = EvalError::from(HeapError::Exhausted);
    assert_eq!(err.message, "heap has no free slot handles left");
    assert_eq!(
        BindError::from(TypeError::PoolExhausted).to_string(),
        "type pool has no type handles left"
    );
}

#[test]
fn backtrace_display_lists_frames_in_order() {
    let bt = EvalBacktrace::new(vec![
        BacktraceFrame {
            name: "inner".to_owned(),
        },
        BacktraceFrame {
            name: "outer".to_owned(),
        },
    ]);
    assert_eq!(bt.to_string(), "stack backtrace:\n  0: inner\n  1: outer\n");
    assert_eq!(EvalBacktrace::default().to_string(), "");
}

#[test]
fn dependency_cycle_names_the_path() {
    let err = ModuleError::DependencyCycle(vec!["a".into(), "b".into(), "a".into()]);
    assert_eq!(err.to_string(), "module dependency cycle: a -> b -> a");
}
