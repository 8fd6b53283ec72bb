use super::*;
use crate::{Method, ModifierKind};
use mu_ir::FunctionId;
use pretty_assertions::assert_eq;

#[test]
fn test_builtins_at_fixed_indices() {
    let pool = TypePool::new();
    assert_eq!(pool.len(), TypeId::FIRST_DYNAMIC as usize);
    assert_eq!(pool.name(TypeId::INT).as_str(), "int");
    assert_eq!(pool.name(TypeId::STRING).as_str(), "string");
    assert_eq!(pool.name(TypeId::VARARG).as_str(), "...");
    assert_eq!(pool.name(TypeId::MATCH_OPAQUE).as_str(), "?opaque");
    assert_eq!(pool.machine_rep(TypeId::DOUBLE), MachineRep::Double);
    assert_eq!(pool.machine_rep(TypeId::STRING), MachineRep::Pointer);
    assert!(pool.is_pattern(TypeId::MATCH_ANYTHING));
    assert!(!pool.is_pattern(TypeId::INT));
}

#[test]
fn test_structural_types_are_deduplicated() {
    let mut pool = TypePool::new();
    let a = pool.dynamic_array(TypeId::INT).unwrap();
    let b = pool.dynamic_array(TypeId::INT).unwrap();
    assert_eq!(a, b);
    assert_eq!(pool.name(a).as_str(), "int[]");

    let fixed = pool.fixed_array(TypeId::FLOAT, 3).unwrap();
    assert_eq!(pool.name(fixed).as_str(), "float[3]");
    assert_ne!(fixed, pool.fixed_array(TypeId::FLOAT, 4).unwrap());
}

#[test]
fn test_function_type_name_and_signature() {
    let mut pool = TypePool::new();
    let f = pool.function(&[TypeId::INT, TypeId::FLOAT], TypeId::BOOL).unwrap();
    assert_eq!(pool.name(f).as_str(), "(bool;int,float)");
    assert_eq!(f, pool.function(&[TypeId::INT, TypeId::FLOAT], TypeId::BOOL).unwrap());

    let sig = pool.function_signature(f).cloned();
    assert_eq!(
        sig.map(|s| (s.params.to_vec(), s.ret)),
        Some((vec![TypeId::INT, TypeId::FLOAT], TypeId::BOOL))
    );
}

#[test]
fn test_nominal_types_are_distinct() {
    let mut pool = TypePool::new();
    let name = Name::intern("Shape");
    let a = pool.add_class(name, None).unwrap();
    let b = pool.add_class(name, None).unwrap();
    assert_ne!(a, b);
    assert!(pool.class(a).is_some());
    assert!(pool.interface(a).is_none());
}

#[test]
fn test_unknown_handle() {
    let pool = TypePool::new();
    let bogus = TypeId::from_raw(9_999);
    assert!(pool.get(bogus).is_none());
    assert_eq!(pool.entry(bogus).err(), Some(TypeError::UnknownType(9_999)));
    assert_eq!(pool.name(bogus), Name::EMPTY);
}

#[test]
fn test_rollback_discards_later_types() {
    let mut pool = TypePool::new();
    let kept = pool.dynamic_array(TypeId::INT).unwrap();
    let snapshot = pool.snapshot();

    let class = pool.add_class(Name::intern("Transient"), None).unwrap();
    let array = pool.dynamic_array(TypeId::DOUBLE).unwrap();
    assert!(pool.get(class).is_some());

    pool.rollback(snapshot);
    assert!(pool.get(class).is_none());
    assert!(pool.get(array).is_none());
    assert_eq!(pool.dynamic_array(TypeId::INT).unwrap(), kept);
}

#[test]
fn test_rollback_reopens_class_frozen_since() {
    let mut pool = TypePool::new();
    let point = pool.add_class(Name::intern("Point"), None).unwrap();
    pool.add_field(point, Name::intern("x"), TypeId::FLOAT).unwrap();
    let snapshot = pool.snapshot();

    let shape = pool.add_interface(Name::intern("Shape")).unwrap();
    let area = pool.function(&[shape], TypeId::FLOAT).unwrap();
    pool.add_interface_method(shape, Name::intern("area"), area).unwrap();
    let point_area = pool.function(&[point], TypeId::FLOAT).unwrap();
    pool.add_field(point, Name::intern("y"), TypeId::FLOAT).unwrap();
    pool.add_class_interface(point, shape).unwrap();
    pool.add_method(
        point,
        Method {
            name: Name::intern("area"),
            signature: point_area,
            function: FunctionId::new(3),
        },
    )
    .unwrap();
    pool.freeze_class(point).unwrap();
    assert!(pool.interface_imp(point, shape).is_some());

    pool.rollback(snapshot);
    let data = pool.class(point).unwrap();
    assert!(!data.is_frozen());
    assert_eq!(data.fields.len(), 1);
    assert!(data.methods.is_empty() && data.interfaces.is_empty());
    assert!(pool.get(shape).is_none());
    assert!(pool.imps.is_empty());

    // Still open: more members can be added and the class frozen again.
    pool.add_field(point, Name::intern("z"), TypeId::FLOAT).unwrap();
    pool.freeze_class(point).unwrap();
    assert_eq!(pool.class(point).unwrap().fields.len(), 2);
}

#[test]
fn test_commit_keeps_edits_and_stops_journaling() {
    let mut pool = TypePool::new();
    let point = pool.add_class(Name::intern("Point"), None).unwrap();
    let snapshot = pool.snapshot();
    pool.add_field(point, Name::intern("x"), TypeId::INT).unwrap();
    assert_eq!(pool.journal.saved.len(), 1);

    pool.commit(snapshot);
    assert!(pool.journal.saved.is_empty());
    pool.add_field(point, Name::intern("y"), TypeId::INT).unwrap();
    assert!(pool.journal.saved.is_empty());
    assert_eq!(pool.class(point).unwrap().fields.len(), 2);
}

#[test]
fn test_rollback_forgets_modifier_results() {
    let mut pool = TypePool::new();
    let list = pool.add_modifier(TypeModifier::new(Name::intern("list"), ModifierKind::DynamicArrayOf));
    let ints = pool.apply_modifier(list, TypeId::INT).unwrap();
    let snapshot = pool.snapshot();
    let doubles = pool.apply_modifier(list, TypeId::DOUBLE).unwrap();
    assert_eq!(pool.modifier(list).map(TypeModifier::cached), Some(2));

    pool.rollback(snapshot);
    assert_eq!(pool.modifier(list).map(TypeModifier::cached), Some(1));
    assert_eq!(pool.apply_modifier(list, TypeId::INT).unwrap(), ints);
    assert_eq!(pool.apply_modifier(list, TypeId::DOUBLE).unwrap(), doubles);
}
