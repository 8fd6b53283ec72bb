use mu_types::TypeKind;
use pretty_assertions::assert_eq;

use super::*;
use crate::NodeKind;

fn state() -> ContextState {
    let mut state = ContextState::new(".");
    crate::base::install(&mut state).unwrap();
    state
}

fn noop(name: &str) -> FunctionBuilder {
    FunctionBuilder::new(name).native(|_, _| Ok(Value::Void))
}

#[test]
fn defaults_must_form_a_tail() {
    let mut state = state();
    let err = state
        .define_function(
            SymbolTable::GLOBAL,
            noop("bad")
                .param_with_default("a", TypeId::INT, Value::Int(1))
                .param("b", TypeId::INT),
        )
        .unwrap_err();
    assert_eq!(
        err,
        BindError::DefaultOrder {
            function: Name::intern("bad"),
            param: Name::intern("b"),
        }
    );
}

#[test]
fn parameter_names_are_unique() {
    let mut state = state();
    let err = state
        .define_function(
            SymbolTable::GLOBAL,
            noop("twice").param("x", TypeId::INT).param("x", TypeId::FLOAT),
        )
        .unwrap_err();
    assert!(matches!(err, BindError::Symbol(SymbolError::Duplicate { .. })));
}

#[test]
fn same_signature_twice_is_rejected() {
    let mut state = state();
    let scope = state.define_namespace(SymbolTable::GLOBAL, "util", true).unwrap();
    state.define_function(scope, noop("f").param("x", TypeId::INT)).unwrap();
    state.define_function(scope, noop("f").param("x", TypeId::FLOAT)).unwrap();
    let err = state
        .define_function(scope, noop("f").param("y", TypeId::INT))
        .unwrap_err();
    assert!(matches!(
        err,
        BindError::Symbol(SymbolError::DuplicateOverload { .. })
    ));
}

#[test]
fn function_names_are_qualified_by_scope() {
    let mut state = state();
    let util = state.define_namespace(SymbolTable::GLOBAL, "util", true).unwrap();
    let id = state.define_function(util, noop("clamp")).unwrap();
    assert_eq!(state.function_name(id), "util.clamp");
    assert_eq!(
        state.function_name(FunctionId::from_usize(state.functions().len() + 5)),
        format!("<function {}>", state.functions().len() + 5)
    );
}

#[test]
fn methods_gain_a_receiver_and_join_the_class() {
    let mut state = state();
    let shape = state.define_class(SymbolTable::GLOBAL, "Shape", None).unwrap();
    let area = state
        .define_function(
            SymbolTable::GLOBAL,
            FunctionBuilder::new("area")
                .returns(TypeId::FLOAT)
                .method_of(shape)
                .native(|_, _| Ok(Value::Float(0.0))),
        )
        .unwrap();
    state.freeze_class(shape).unwrap();

    let function = state.function(area).unwrap();
    assert_eq!(function.owner, Some(shape));
    assert_eq!(function.params.len(), 1);
    assert_eq!(function.params[0].name, Name::intern("this"));
    assert_eq!(function.params[0].ty, shape);
    assert_eq!(
        state.types().lookup_method(shape, Name::intern("area"), function.signature),
        Some(area)
    );
    assert_eq!(state.function_name(area), "Shape.area");
}

#[test]
fn methods_need_an_unfrozen_class() {
    let mut state = state();
    let err = state
        .define_function(SymbolTable::GLOBAL, noop("m").method_of(TypeId::INT))
        .unwrap_err();
    assert_eq!(err, BindError::Type(TypeError::NotAClass(Name::intern("int"))));

    let point = state.define_class(SymbolTable::GLOBAL, "Point", None).unwrap();
    state.freeze_class(point).unwrap();
    let symbols = state.symbols().len();
    let err = state
        .define_function(SymbolTable::GLOBAL, noop("late").method_of(point))
        .unwrap_err();
    assert_eq!(err, BindError::Type(TypeError::ClassFrozen(Name::intern("Point"))));
    // Rejected before anything is registered, even outside an update.
    assert_eq!(state.symbols().len(), symbols);
    assert!(state.symbols().lookup_qualified("Point.late").is_empty());
}

#[test]
fn super_class_must_be_a_class() {
    let mut state = state();
    let err = state
        .define_class(SymbolTable::GLOBAL, "Odd", Some(TypeId::STRING))
        .unwrap_err();
    assert!(matches!(err, BindError::Type(TypeError::NotAClass(_))));
}

#[test]
fn variants_opaques_and_interfaces_resolve_by_name() {
    let mut state = state();
    let token = state
        .define_variant(
            SymbolTable::GLOBAL,
            "Token",
            &[("Number", TypeId::INT), ("Word", TypeId::STRING)],
        )
        .unwrap();
    let file = state.define_opaque(SymbolTable::GLOBAL, "File").unwrap();
    let drawable = state.define_interface(SymbolTable::GLOBAL, "Drawable").unwrap();

    assert_eq!(state.resolve_type(SymbolTable::GLOBAL, "Token").unwrap(), token);
    assert_eq!(state.resolve_type(SymbolTable::GLOBAL, "File").unwrap(), file);
    assert_eq!(state.resolve_type(SymbolTable::GLOBAL, "Drawable").unwrap(), drawable);
    assert!(matches!(state.types().kind(token), Some(TypeKind::Variant(_))));
    assert!(matches!(state.types().kind(file), Some(TypeKind::Opaque)));
    assert!(state.type_symbol(file).is_some());
    assert!(state.type_symbol(drawable).is_some());
}

#[test]
fn interface_methods_take_the_next_slot() {
    let mut state = state();
    let drawable = state.define_interface(SymbolTable::GLOBAL, "Drawable").unwrap();
    let draw = state
        .declare_interface_method(drawable, "draw", &[], TypeId::VOID)
        .unwrap();
    let scale = state
        .declare_interface_method(drawable, "scale", &[TypeId::FLOAT], TypeId::VOID)
        .unwrap();
    assert_eq!((draw, scale), (0, 1));
    let err = state
        .declare_interface_method(TypeId::INT, "draw", &[], TypeId::VOID)
        .unwrap_err();
    assert!(matches!(err, BindError::Type(TypeError::NotAnInterface(_))));
}

#[test]
fn globals_keep_their_declaration() {
    let mut state = state();
    let slot = state
        .define_global(SymbolTable::GLOBAL, "limit", TypeId::INT, Value::Int(3))
        .unwrap();
    let decl = state.global(slot).unwrap();
    assert_eq!(decl.name, Name::intern("limit"));
    assert_eq!(decl.ty, TypeId::INT);
    assert_eq!(decl.initial, Value::Int(3));
    assert!(state
        .define_global(SymbolTable::GLOBAL, "limit", TypeId::INT, Value::Int(4))
        .is_err());
}

#[test]
fn rollback_discards_later_definitions() {
    let mut state = state();
    let types = state.types().len();
    let symbols = state.symbols().len();
    let functions = state.functions().len();
    let snapshot = state.snapshot();

    let class = state.define_class(SymbolTable::GLOBAL, "Temp", None).unwrap();
    state.add_field(class, "x", TypeId::INT).unwrap();
    state.define_function(SymbolTable::GLOBAL, noop("temp")).unwrap();
    let slot = state
        .define_global(SymbolTable::GLOBAL, "tmp", TypeId::INT, Value::Int(0))
        .unwrap();
    state.rollback(snapshot);

    assert_eq!(state.types().len(), types);
    assert_eq!(state.symbols().len(), symbols);
    assert_eq!(state.functions().len(), functions);
    assert!(state.global(slot).is_none());
    assert!(state.type_symbol(class).is_none());
    assert!(state.resolve_type(SymbolTable::GLOBAL, "Temp").is_err());
    // Names defined after the rollback reuse the discarded ids.
    assert_eq!(state.define_class(SymbolTable::GLOBAL, "Temp", None).unwrap(), class);
}

#[test]
fn rollback_reopens_classes_and_restores_bodies() {
    let mut state = state();
    let shape = state.define_class(SymbolTable::GLOBAL, "Shape", None).unwrap();
    let area = state
        .define_function(
            SymbolTable::GLOBAL,
            FunctionBuilder::new("area").returns(TypeId::FLOAT).method_of(shape),
        )
        .unwrap();
    let snapshot = state.snapshot();

    state.add_field(shape, "w", TypeId::FLOAT).unwrap();
    state.freeze_class(shape).unwrap();
    state
        .set_tree_body(
            area,
            Node::leaf(NodeKind::Constant(Value::Float(1.0)), TypeId::FLOAT),
            Arc::from(Vec::new()),
        )
        .unwrap();
    assert!(matches!(state.function(area).unwrap().body, FunctionBody::Tree { .. }));

    state.rollback(snapshot);
    assert!(!state.types().is_frozen(shape));
    assert!(state.types().class(shape).unwrap().fields.is_empty());
    assert!(matches!(state.function(area).unwrap().body, FunctionBody::Abstract));
    assert_eq!(state.function_name(area), "Shape.area");
}

#[test]
fn commit_keeps_later_definitions() {
    let mut state = state();
    let shape = state.define_class(SymbolTable::GLOBAL, "Shape", None).unwrap();
    let snapshot = state.snapshot();
    state.add_field(shape, "w", TypeId::FLOAT).unwrap();
    let helper = state.define_function(SymbolTable::GLOBAL, noop("helper")).unwrap();
    state.commit(snapshot);

    // A later rollback only reaches back to its own snapshot.
    let snapshot = state.snapshot();
    state.freeze_class(shape).unwrap();
    state.rollback(snapshot);

    assert_eq!(state.types().class(shape).unwrap().fields.len(), 1);
    assert!(!state.types().is_frozen(shape));
    assert_eq!(state.function_name(helper), "helper");
    assert!(state.replaced.is_empty());
}
