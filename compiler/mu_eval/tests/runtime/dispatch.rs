//! Virtual methods and interface dispatch.

use mu_eval::{
    BindError, Context, EvalErrorKind, FunctionBuilder, FunctionId, Name, NodeAssembler, Process,
    Thread, TypeId, Value,
};
use mu_types::TypeError;
use pretty_assertions::assert_eq;

use super::{compile, context, global, run, GLOBAL};

// -- Fixtures --

struct Shapes {
    shape: TypeId,
    square: TypeId,
}

/// `Shape` has a float `size` and an abstract `area`; `Square` overrides
/// `area` as `size * size`.
fn shapes(context: &Context) -> Shapes {
    context
        .update(|s| {
            let shape = s.define_class(GLOBAL, "Shape", None)?;
            s.add_field(shape, "size", TypeId::FLOAT)?;
            s.define_function(
                GLOBAL,
                FunctionBuilder::new("area").returns(TypeId::FLOAT).method_of(shape),
            )?;
            s.freeze_class(shape)?;

            let square = s.define_class(GLOBAL, "Square", Some(shape))?;
            let area = s.define_function(
                GLOBAL,
                FunctionBuilder::new("area").returns(TypeId::FLOAT).method_of(square),
            )?;
            s.freeze_class(square)?;

            // Field access needs the frozen layout, so the body comes last.
            let mut a = NodeAssembler::for_function(s, area)?;
            let lhs = {
                let this = a.variable("this")?;
                a.field(this, "size")?
            };
            let rhs = {
                let this = a.variable("this")?;
                a.field(this, "size")?
            };
            let body = a.call("*", vec![lhs, rhs])?;
            a.finish_function(body)?;
            Ok(Shapes { shape, square })
        })
        .unwrap()
}

struct Sizing {
    sized: TypeId,
    boxed: TypeId,
    plain: TypeId,
    measure: FunctionId,
}

/// Interface `Sized { extent() -> int }`, implemented by `Box` as
/// `w * 2`. `Plain` does not implement it. `measure(item: Sized)` calls
/// `item.extent()`.
fn sizing(context: &Context) -> Sizing {
    context
        .update(|s| {
            let sized = s.define_interface(GLOBAL, "Sized")?;
            s.declare_interface_method(sized, "extent", &[], TypeId::INT)?;

            let boxed = s.define_class(GLOBAL, "Box", None)?;
            s.add_field(boxed, "w", TypeId::INT)?;
            let extent = s.define_function(
                GLOBAL,
                FunctionBuilder::new("extent").returns(TypeId::INT).method_of(boxed),
            )?;
            s.implement_interface(boxed, sized)?;
            s.freeze_class(boxed)?;

            let plain = s.define_class(GLOBAL, "Plain", None)?;
            s.freeze_class(plain)?;

            let mut a = NodeAssembler::for_function(s, extent)?;
            let w = {
                let this = a.variable("this")?;
                a.field(this, "w")?
            };
            let two = a.constant(Value::Int(2))?;
            let body = a.call("*", vec![w, two])?;
            a.finish_function(body)?;

            let measure = s.define_function(
                GLOBAL,
                FunctionBuilder::new("measure")
                    .param("item", sized)
                    .returns(TypeId::INT),
            )?;
            let mut a = NodeAssembler::for_function(s, measure)?;
            let item = a.variable("item")?;
            let body = a.method_call(item, "extent", vec![])?;
            a.finish_function(body)?;

            Ok(Sizing {
                sized,
                boxed,
                plain,
                measure,
            })
        })
        .unwrap()
}

// -- Virtual methods --

#[test]
fn override_is_chosen_by_runtime_class() {
    let context = context();
    let Shapes { shape, square } = shapes(&context);
    global(&context, "s", shape, Value::NIL);
    let out = global(&context, "out", TypeId::FLOAT, Value::Float(0.0));

    let unit = compile(&context, |a| {
        let made = a.new_object(square)?;
        let store = a.assign("s", made)?;
        let size = {
            let target = a.variable("s")?;
            let three = a.constant(Value::Float(3.0))?;
            a.set_field(target, "size", three)?
        };
        let publish = {
            let target = a.variable("s")?;
            let area = a.method_call(target, "area", vec![])?;
            a.assign("out", area)?
        };
        a.call("block", vec![store, size, publish])
    });
    let (process, result) = run(&context, &unit);
    result.unwrap();
    assert_eq!(process.global(out), Some(Value::Float(9.0)));
}

#[test]
fn abstract_method_without_override_fails() {
    let context = context();
    let Shapes { shape, .. } = shapes(&context);
    let unit = compile(&context, |a| {
        let made = a.new_object(shape)?;
        a.method_call(made, "area", vec![])
    });
    let (_, result) = run(&context, &unit);
    let err = result.unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::AbstractFunction {
            name: "Shape.area".to_owned()
        }
    );
    assert!(err.kind.is_catchable());
}

#[test]
fn unknown_method_is_a_bind_error() {
    let context = context();
    let Shapes { square, .. } = shapes(&context);
    let err = context
        .compile(GLOBAL, |a| {
            let made = a.new_object(square)?;
            a.method_call(made, "perimeter", vec![])
        })
        .unwrap_err();
    assert_eq!(
        err,
        BindError::NoSuchMethod {
            ty: Name::intern("Square"),
            method: "perimeter".to_owned(),
        }
    );
}

// -- Interfaces --

#[test]
fn interface_calls_go_through_the_vtable() {
    let context = context();
    let Sizing { boxed, .. } = sizing(&context);
    global(&context, "b", boxed, Value::NIL);
    let out = global(&context, "out", TypeId::INT, Value::Int(0));

    let unit = compile(&context, |a| {
        let made = a.new_object(boxed)?;
        let store = a.assign("b", made)?;
        let width = {
            let target = a.variable("b")?;
            let five = a.constant(Value::Int(5))?;
            a.set_field(target, "w", five)?
        };
        let publish = {
            let target = a.variable("b")?;
            let measured = a.call("measure", vec![target])?;
            a.assign("out", measured)?
        };
        a.call("block", vec![store, width, publish])
    });
    let (process, result) = run(&context, &unit);
    result.unwrap();
    assert_eq!(process.global(out), Some(Value::Int(10)));
}

#[test]
fn class_without_the_interface_cannot_be_passed_when_bound() {
    let context = context();
    let Sizing { plain, .. } = sizing(&context);
    let err = context
        .compile(GLOBAL, |a| {
            let made = a.new_object(plain)?;
            a.call("measure", vec![made])
        })
        .unwrap_err();
    assert!(matches!(err, BindError::Symbol(_)));
}

#[test]
fn host_call_with_a_non_implementing_object_fails() {
    let context = context();
    let Sizing { plain, measure, .. } = sizing(&context);
    let mut process = Process::new(&context);
    let object = {
        let state = context.read();
        process.heap_mut().allocate(state.types(), plain).unwrap()
    };

    let mut thread = Thread::new(&process);
    let err = thread
        .call(&mut process, measure, &[Value::Object(Some(object))])
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::NoImplementation {
            class: "Plain".to_owned(),
            interface: "Sized".to_owned(),
        }
    );
    let frames: Vec<&str> = err
        .backtrace
        .as_ref()
        .unwrap()
        .frames()
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(frames, ["measure"]);
}

#[test]
fn freezing_checks_interface_methods() {
    let context = context();
    let Sizing { sized, .. } = sizing(&context);
    let err = context
        .update(|s| {
            let blob = s.define_class(GLOBAL, "Blob", None)?;
            s.implement_interface(blob, sized)?;
            s.freeze_class(blob)
        })
        .unwrap_err();
    assert_eq!(
        err,
        BindError::Type(TypeError::MissingInterfaceMethod {
            class: Name::intern("Blob"),
            interface: Name::intern("Sized"),
            method: Name::intern("extent"),
        })
    );
    // The failed update left nothing behind.
    assert!(context.read().resolve_type(GLOBAL, "Blob").is_err());
}

#[test]
fn vtable_entry_without_a_body_raises_when_called() {
    let context = context();
    let Sizing { measure, sized, .. } = sizing(&context);
    let ghost = context
        .update(|s| {
            let ghost = s.define_class(GLOBAL, "Ghost", None)?;
            s.define_function(
                GLOBAL,
                FunctionBuilder::new("extent").returns(TypeId::INT).method_of(ghost),
            )?;
            s.implement_interface(ghost, sized)?;
            s.freeze_class(ghost)?;
            Ok(ghost)
        })
        .unwrap();

    let caught = compile(&context, |a| {
        let made = a.new_object(ghost)?;
        let measured = a.call("measure", vec![made])?;
        let fallback = a.constant(Value::Int(-1))?;
        a.call("try", vec![measured, fallback])
    });
    let (_, result) = run(&context, &caught);
    assert_eq!(result, Ok(Value::Int(-1)));

    let mut process = Process::new(&context);
    let object = {
        let state = context.read();
        process.heap_mut().allocate(state.types(), ghost).unwrap()
    };
    let mut thread = Thread::new(&process);
    let err = thread
        .call(&mut process, measure, &[Value::Object(Some(object))])
        .unwrap_err();
    assert_eq!(
        err.kind,
        EvalErrorKind::AbstractFunction {
            name: "Ghost.extent".to_owned()
        }
    );
    assert!(err.kind.is_catchable());
}
