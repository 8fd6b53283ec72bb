//! Overload selection as seen by bound trees.

use mu_eval::{BindError, Context, FunctionBuilder, NodeKind, TypeId, Value};
use mu_symbols::SymbolError;
use pretty_assertions::assert_eq;

use super::{compile, context, run, GLOBAL};

/// Define a native overload of `name` over `params` that returns `tag`.
fn tagged(context: &Context, name: &str, params: &[TypeId], tag: i32) {
    context
        .update(|s| {
            let mut builder = FunctionBuilder::new(name).returns(TypeId::INT);
            for (i, &ty) in params.iter().enumerate() {
                builder = builder.param(&format!("p{i}"), ty);
            }
            s.define_function(GLOBAL, builder.native(move |_, _| Ok(Value::Int(tag))))
        })
        .unwrap();
}

fn call_with(context: &std::sync::Arc<Context>, name: &str, args: &[Value]) -> Value {
    let unit = compile(context, |a| {
        let nodes = args
            .iter()
            .map(|&v| a.constant(v))
            .collect::<Result<Vec<_>, _>>()?;
        a.call(name, nodes)
    });
    run(context, &unit).1.unwrap()
}

#[test]
fn argument_types_pick_the_overload() {
    let context = context();
    tagged(&context, "kind", &[TypeId::INT], 1);
    tagged(&context, "kind", &[TypeId::FLOAT], 2);
    tagged(&context, "kind", &[TypeId::MATCH_ANYTHING], 3);

    assert_eq!(call_with(&context, "kind", &[Value::Int(4)]), Value::Int(1));
    assert_eq!(call_with(&context, "kind", &[Value::Float(4.0)]), Value::Int(2));
    assert_eq!(call_with(&context, "kind", &[Value::Bool(true)]), Value::Int(3));
}

#[test]
fn most_derived_class_wins() {
    let context = context();
    let (animal, dog, cat) = context
        .update(|s| {
            let animal = s.define_class(GLOBAL, "Animal", None)?;
            s.freeze_class(animal)?;
            let dog = s.define_class(GLOBAL, "Dog", Some(animal))?;
            s.freeze_class(dog)?;
            let cat = s.define_class(GLOBAL, "Cat", Some(animal))?;
            s.freeze_class(cat)?;
            Ok((animal, dog, cat))
        })
        .unwrap();
    tagged(&context, "greet", &[animal], 1);
    tagged(&context, "greet", &[dog], 2);

    for (class, expected) in [(dog, 2), (cat, 1), (animal, 1)] {
        let unit = compile(&context, |a| {
            let made = a.new_object(class)?;
            a.call("greet", vec![made])
        });
        assert_eq!(run(&context, &unit).1, Ok(Value::Int(expected)));
    }
}

#[test]
fn crossed_patterns_are_ambiguous() {
    let context = context();
    tagged(&context, "pair", &[TypeId::INT, TypeId::MATCH_ANYTHING], 1);
    tagged(&context, "pair", &[TypeId::MATCH_ANYTHING, TypeId::INT], 2);

    let err = context
        .compile(GLOBAL, |a| {
            let (x, y) = (a.constant(Value::Int(1))?, a.constant(Value::Int(2))?);
            a.call("pair", vec![x, y])
        })
        .unwrap_err();
    let BindError::Symbol(SymbolError::Ambiguous { candidates, .. }) = err else {
        panic!("expected an ambiguous call, got {err:?}");
    };
    assert_eq!(candidates.len(), 2);

    // Exact on both sides is better than either.
    tagged(&context, "pair", &[TypeId::INT, TypeId::INT], 3);
    assert_eq!(
        call_with(&context, "pair", &[Value::Int(1), Value::Int(2)]),
        Value::Int(3)
    );
}

#[test]
fn type_variables_flow_into_the_result() {
    let context = context();
    let strings = context
        .update(|s| Ok(s.types_mut().dynamic_array(TypeId::STRING)?))
        .unwrap();

    let unit = compile(&context, |a| {
        let xs = a.new_object(strings)?;
        let index = a.constant(Value::Int(0))?;
        a.call("[]", vec![xs, index])
    });
    assert_eq!(unit.root().ty, TypeId::STRING);
    assert!(matches!(unit.root().kind, NodeKind::Call(_)));
}

#[test]
fn inconsistent_type_variables_do_not_match() {
    let context = context();
    let ints = context
        .update(|s| Ok(s.types_mut().dynamic_array(TypeId::INT)?))
        .unwrap();

    let err = context
        .compile(GLOBAL, |a| {
            let xs = a.new_object(ints)?;
            let text = a.string("nope");
            a.call("push", vec![xs, text])
        })
        .unwrap_err();
    assert!(matches!(
        err,
        BindError::Symbol(SymbolError::NoMatchingOverload { .. })
    ));
}

#[test]
fn a_name_that_is_not_a_function_cannot_be_called() {
    let context = context();
    let err = context
        .compile(GLOBAL, |a| a.call("int", vec![]))
        .unwrap_err();
    assert!(matches!(
        err,
        BindError::Symbol(SymbolError::NotAFunction(_))
    ));
}
