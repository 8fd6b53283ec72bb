use super::*;
use pretty_assertions::assert_eq;

use crate::MachineRep;

struct Shapes {
    pool: TypePool,
    shape: TypeId,
    circle: TypeId,
    area_sig: TypeId,
    name_sig: TypeId,
}

/// `interface Shape { float area(Shape); string name(Shape); }` and an
/// open class `Circle`.
fn shapes() -> Shapes {
    let mut pool = TypePool::new();
    let shape = pool.add_interface(Name::intern("Shape")).unwrap();
    let area_sig = pool.function(&[shape], TypeId::FLOAT).unwrap();
    let name_sig = pool.function(&[shape], TypeId::STRING).unwrap();
    pool.add_interface_method(shape, Name::intern("area"), area_sig).ok();
    pool.add_interface_method(shape, Name::intern("name"), name_sig).ok();

    let circle = pool.add_class(Name::intern("Circle"), None).unwrap();
    pool.add_class_interface(circle, shape).ok();
    Shapes {
        pool,
        shape,
        circle,
        area_sig,
        name_sig,
    }
}

fn add_method(pool: &mut TypePool, class: TypeId, name: &str, ret: TypeId, function: u32) {
    let sig = pool.function(&[class], ret).unwrap();
    pool.add_method(
        class,
        Method {
            name: Name::intern(name),
            signature: sig,
            function: FunctionId::new(function),
        },
    )
    .ok();
}

#[test]
fn test_layout_aligns_fields_after_super() {
    let mut pool = TypePool::new();
    let base = pool.add_class(Name::intern("Base"), None).unwrap();
    pool.add_field(base, Name::intern("flag"), TypeId::BOOL).ok();
    pool.add_field(base, Name::intern("count"), TypeId::INT).ok();

    let derived = pool.add_class(Name::intern("Derived"), Some(base)).unwrap();
    pool.add_field(derived, Name::intern("tag"), TypeId::BYTE).ok();
    pool.add_field(derived, Name::intern("total"), TypeId::DOUBLE).ok();

    assert_eq!(pool.freeze_class(derived), Ok(()));
    assert!(pool.is_frozen(base));

    let layout = pool.layout(derived).ok().cloned();
    let offsets: Vec<(&str, usize)> = layout
        .iter()
        .flat_map(|l| l.fields.iter().map(|f| (f.name.as_str(), f.offset)))
        .collect();
    assert_eq!(
        offsets,
        vec![("flag", 0), ("count", 4), ("tag", 8), ("total", 16)]
    );
    assert_eq!(layout.as_ref().map(|l| l.instance_size), Some(24));
    assert_eq!(layout.as_ref().map(|l| l.gc_atomic), Some(true));
    assert_eq!(
        layout.and_then(|l| l.field(Name::intern("count")).map(|f| f.rep)),
        Some(MachineRep::Int)
    );
}

#[test]
fn test_pointer_field_makes_class_traced() {
    let mut pool = TypePool::new();
    let node = pool.add_class(Name::intern("Node"), None).unwrap();
    pool.add_field(node, Name::intern("value"), TypeId::INT).ok();
    pool.add_field(node, Name::intern("next"), node).ok();
    pool.freeze_class(node).ok();
    assert!(!pool.is_gc_atomic(node));

    let leaf = pool.add_class(Name::intern("Leaf"), Some(node)).unwrap();
    pool.freeze_class(leaf).ok();
    assert!(!pool.is_gc_atomic(leaf), "pointer fields are inherited");
}

#[test]
fn test_frozen_class_rejects_changes() {
    let mut pool = TypePool::new();
    let class = pool.add_class(Name::intern("Sealed"), None).unwrap();
    pool.freeze_class(class).ok();
    assert_eq!(
        pool.add_field(class, Name::intern("late"), TypeId::INT),
        Err(TypeError::ClassFrozen(Name::intern("Sealed")))
    );
    assert_eq!(pool.freeze_class(class), Ok(()));
}

#[test]
fn test_duplicate_field() {
    let mut pool = TypePool::new();
    let class = pool.add_class(Name::intern("Point"), None).unwrap();
    pool.add_field(class, Name::intern("x"), TypeId::FLOAT).ok();
    assert!(matches!(
        pool.add_field(class, Name::intern("x"), TypeId::FLOAT),
        Err(TypeError::DuplicateField { .. })
    ));
}

#[test]
fn test_cyclic_inheritance_detected() {
    let mut pool = TypePool::new();
    let a = pool.add_class(Name::intern("A"), None).unwrap();
    let b = pool.add_class(Name::intern("B"), Some(a)).unwrap();
    pool.set_super_class(a, b).ok();
    assert_eq!(
        pool.freeze_class(b),
        Err(TypeError::CyclicInheritance(Name::intern("B")))
    );
    assert!(!pool.is_frozen(a));
    assert!(!pool.is_a(a, b), "cyclic chains are never subtypes");
}

#[test]
fn test_vtable_has_one_entry_per_interface_method() {
    let Shapes {
        mut pool,
        shape,
        circle,
        ..
    } = shapes();
    add_method(&mut pool, circle, "name", TypeId::STRING, 11);
    add_method(&mut pool, circle, "area", TypeId::FLOAT, 10);

    assert_eq!(pool.freeze_class(circle), Ok(()));
    let imp = pool.interface_imp(circle, shape).cloned();
    let num_functions = pool.interface(shape).map(InterfaceData::num_functions);
    assert_eq!(imp.as_ref().map(InterfaceImp::num_functions), num_functions);
    // Interface order, not declaration order.
    assert_eq!(
        imp.map(|i| i.functions().to_vec()),
        Some(vec![FunctionId::new(10), FunctionId::new(11)])
    );
}

#[test]
fn test_missing_interface_method_fails_freeze() {
    let Shapes {
        mut pool, circle, ..
    } = shapes();
    add_method(&mut pool, circle, "area", TypeId::FLOAT, 10);

    let result = pool.freeze_class(circle);
    assert_eq!(
        result,
        Err(TypeError::MissingInterfaceMethod {
            class: Name::intern("Circle"),
            interface: Name::intern("Shape"),
            method: Name::intern("name"),
        })
    );
    assert!(!pool.is_frozen(circle));
    assert!(pool.object_size(circle).is_err());
}

#[test]
fn test_wrong_return_type_does_not_implement() {
    let Shapes {
        mut pool, circle, ..
    } = shapes();
    add_method(&mut pool, circle, "area", TypeId::DOUBLE, 10);
    add_method(&mut pool, circle, "name", TypeId::STRING, 11);
    assert!(matches!(
        pool.freeze_class(circle),
        Err(TypeError::MissingInterfaceMethod { .. })
    ));
}

#[test]
fn test_subclass_inherits_interface_and_overrides() {
    let Shapes {
        mut pool,
        shape,
        circle,
        area_sig,
        name_sig,
    } = shapes();
    add_method(&mut pool, circle, "area", TypeId::FLOAT, 10);
    add_method(&mut pool, circle, "name", TypeId::STRING, 11);

    let ring = pool.add_class(Name::intern("Ring"), Some(circle)).unwrap();
    add_method(&mut pool, ring, "area", TypeId::FLOAT, 20);
    assert_eq!(pool.freeze_class(ring), Ok(()));

    assert!(pool.implements(ring, shape));
    let imp = pool.interface_imp(ring, shape).cloned();
    assert_eq!(
        imp.map(|i| i.functions().to_vec()),
        Some(vec![FunctionId::new(20), FunctionId::new(11)])
    );
    assert_eq!(
        pool.lookup_method(ring, Name::intern("name"), name_sig),
        Some(FunctionId::new(11))
    );
    assert_eq!(
        pool.lookup_method(circle, Name::intern("area"), area_sig),
        Some(FunctionId::new(10))
    );
}

#[test]
fn test_interface_method_requires_receiver() {
    let mut pool = TypePool::new();
    let iface = pool.add_interface(Name::intern("Named")).unwrap();
    let bad = pool.function(&[TypeId::INT], TypeId::STRING).unwrap();
    assert!(matches!(
        pool.add_interface_method(iface, Name::intern("name"), bad),
        Err(TypeError::InterfaceSignature { .. })
    ));
}
