use super::*;

#[test]
fn test_vector_modifier_memoizes() {
    let mut pool = TypePool::new();
    let vec4 = pool.add_modifier(TypeModifier::new(Name::intern("vector4"), ModifierKind::VectorOf(4)));

    let Ok(first) = pool.apply_modifier(vec4, TypeId::FLOAT) else {
        panic!("float takes the vector modifier");
    };
    assert_eq!(pool.apply_modifier(vec4, TypeId::FLOAT), Ok(first));
    assert_eq!(pool.name(first).as_str(), "vector float[4]");
    assert_eq!(pool.modifier(vec4).map(TypeModifier::cached), Some(1));
    assert_eq!(first, pool.vector(TypeId::FLOAT, 4).unwrap());
}

#[test]
fn test_vector_modifier_rejects_non_float() {
    let mut pool = TypePool::new();
    let vec3 = pool.add_modifier(TypeModifier::new(Name::intern("vector3"), ModifierKind::VectorOf(3)));
    assert_eq!(
        pool.apply_modifier(vec3, TypeId::INT),
        Err(TypeError::ModifierNotApplicable {
            modifier: Name::intern("vector3"),
            base: Name::intern("int"),
        })
    );
    assert_eq!(pool.modifier(vec3).map(TypeModifier::cached), Some(0));
}

#[test]
fn test_array_modifiers() {
    let mut pool = TypePool::new();
    let dynamic = pool.add_modifier(TypeModifier::new(Name::intern("[]"), ModifierKind::DynamicArrayOf));
    let fixed = pool.add_modifier(TypeModifier::new(Name::intern("[8]"), ModifierKind::FixedArrayOf(8)));

    let strings = pool.apply_modifier(dynamic, TypeId::STRING);
    assert_eq!(strings, Ok(pool.dynamic_array(TypeId::STRING).unwrap()));
    let bytes = pool.apply_modifier(fixed, TypeId::BYTE);
    assert_eq!(bytes.map(|ty| pool.name(ty).as_str()), Ok("byte[8]"));
    assert!(pool.apply_modifier(dynamic, TypeId::VOID).is_err());
}

#[test]
fn test_unknown_modifier() {
    let mut pool = TypePool::new();
    assert_eq!(
        pool.apply_modifier(ModifierId::new(3), TypeId::FLOAT),
        Err(TypeError::UnknownModifier(3))
    );
}
