use super::*;

#[test]
fn test_name_layout() {
    let name = Name::new(5, 1000);
    assert_eq!(name.shard(), 5);
    assert_eq!(name.local(), 1000);
}

#[test]
fn test_name_empty() {
    assert_eq!(Name::EMPTY.shard(), 0);
    assert_eq!(Name::EMPTY.local(), 0);
    assert_eq!(Name::intern(""), Name::EMPTY);
}

#[test]
fn test_name_hash() {
    use std::collections::HashSet;
    let mut set = HashSet::new();
    set.insert(Name::intern("area"));
    set.insert(Name::intern("area")); // duplicate
    set.insert(Name::intern("volume"));
    assert_eq!(set.len(), 2);
}

#[test]
fn test_name_ord_follows_handle() {
    let a = Name::new(0, 1);
    let b = Name::new(0, 2);
    assert!(a < b);

    let x = Name::intern("zeta_ordering");
    let y = Name::intern("alpha_ordering");
    assert_eq!(x.cmp(&y), x.raw().cmp(&y.raw()));
}

#[test]
fn test_includes() {
    let name = Name::intern("commands.setFrame");
    assert!(name.includes("commands", 0));
    assert!(name.includes("Frame", 9));
    assert!(!name.includes("commands", 1));
    assert!(!name.includes("x", 100));
    assert!(name.starts_with("commands."));
}

#[test]
fn test_display_round_trips_text() {
    let name = Name::intern("vector float[4]");
    assert_eq!(name.to_string(), "vector float[4]");
    assert_eq!(format!("{name:?}"), "Name(\"vector float[4]\")");
}
