use super::*;
use crate::types::{AccessorOf, MemberFlags, ParamInfo};

fn virtual_method(name: &str, params: Vec<ParamInfo>) -> MemberDecl {
    MemberDecl::method(name, params, TypeId::VOID).with_flags(MemberFlags::VIRTUAL)
}

#[test]
fn test_signature_key_distinguishes_overloads() {
    let a = SignatureKey::of(&virtual_method("Run", vec![])).expect("key");
    let b = SignatureKey::of(&virtual_method("Run", vec![ParamInfo::new("x", TypeId::INT)]))
        .expect("key");
    let c = SignatureKey::of(&virtual_method("Run", vec![]).with_generic_arity(1)).expect("key");
    assert_ne!(a, b);
    assert_ne!(a, c);

    // Parameter names do not matter.
    let d = SignatureKey::of(&virtual_method("Run", vec![ParamInfo::new("y", TypeId::INT)]))
        .expect("key");
    assert_eq!(b, d);
}

#[test]
fn test_signature_key_skips_accessors() {
    let getter = MemberDecl::method("get_Name", vec![], TypeId::STRING)
        .as_accessor_of(AccessorOf::Property("Name".to_string()));
    assert!(SignatureKey::of(&getter).is_none());
}

#[test]
fn test_indexer_keys_include_access_mode() {
    let params = vec![ParamInfo::new("i", TypeId::INT)];
    let rw = SignatureKey::of(&MemberDecl::indexer(params.clone(), TypeId::STRING)).expect("key");
    let ro = SignatureKey::of(
        &MemberDecl::indexer(params, TypeId::STRING).with_access_mode(true, false),
    )
    .expect("key");
    assert_ne!(rw, ro);
}

#[test]
fn test_most_derived_wins() {
    let mut table = OverrideTable::new();
    table.add_level(TypeId(20), 0, &[virtual_method("Go", vec![])]);
    table.add_level(
        TypeId(21),
        1,
        &[MemberDecl::method("Go", vec![], TypeId::VOID).with_flags(MemberFlags::OVERRIDE)],
    );
    table.add_level(
        TypeId(22),
        2,
        &[MemberDecl::method("Go", vec![], TypeId::VOID).with_flags(MemberFlags::OVERRIDE)],
    );
    assert_eq!(table.len(), 1);

    let resolved = table.resolve("Test").expect("resolves");
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].1.declaring_type, TypeId(22));
}

#[test]
fn test_static_members_ignored() {
    let mut table = OverrideTable::new();
    table.add_level(
        TypeId(20),
        0,
        &[MemberDecl::method("Create", vec![], TypeId::OBJECT).with_flags(MemberFlags::STATIC)],
    );
    assert!(table.is_empty());
}

#[test]
fn test_same_level_duplicate_is_invariant_violation() {
    let mut table = OverrideTable::new();
    table.add_level(
        TypeId(20),
        0,
        &[virtual_method("Go", vec![]), virtual_method("Go", vec![])],
    );
    let err = table.resolve("Broken").unwrap_err();
    assert!(matches!(err, SurfaceError::InvariantViolation { ref member, .. } if member == "Go"));
}

#[test]
fn test_property_type_change_is_invariant_violation() {
    let mut table = OverrideTable::new();
    table.add_level(TypeId(20), 0, &[MemberDecl::property("Value", TypeId::INT)]);
    table.add_level(TypeId(21), 1, &[MemberDecl::property("Value", TypeId::STRING)]);
    assert!(matches!(
        table.resolve("Broken"),
        Err(SurfaceError::InvariantViolation { .. })
    ));
}
