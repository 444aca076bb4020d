use super::*;
use crate::matcher::{ArgList, ArgMatcher};
use crate::tree::{MockNode, MockRef};
use crate::value::ObjectRef;
use dmx_common::UnmatchedCallPolicy;
use dmx_surface::{Accessibility, MemberDecl, MemberFlags, TypeDef};
use std::sync::Mutex;

struct Fixture {
    store: Arc<TypeStore>,
    service: TypeId,
}

/// `Service`: one virtual method with an out parameter, a virtual property,
/// a plain settable property, a plain method, an indexer and an event.
fn fixture() -> Fixture {
    let store = Arc::new(TypeStore::new());
    let service = store.register(TypeDef::class("Service").with_members([
        MemberDecl::method(
            "TryGet",
            vec![ParamInfo::new("key", TypeId::STRING), ParamInfo::out("value", TypeId::INT)],
            TypeId::BOOL,
        )
        .with_flags(MemberFlags::VIRTUAL),
        MemberDecl::method("Count", vec![], TypeId::INT).with_flags(MemberFlags::VIRTUAL),
        MemberDecl::method("Reset", vec![], TypeId::VOID).with_flags(MemberFlags::VIRTUAL),
        MemberDecl::method("Describe", vec![], TypeId::STRING),
        MemberDecl::property("Name", TypeId::STRING).with_flags(MemberFlags::VIRTUAL),
        MemberDecl::property("Label", TypeId::STRING),
        MemberDecl::indexer(vec![ParamInfo::new("i", TypeId::INT)], TypeId::STRING)
            .with_flags(MemberFlags::VIRTUAL),
        MemberDecl::event("Changed", vec![TypeId::INT]).with_flags(MemberFlags::VIRTUAL),
    ]));
    Fixture { store, service }
}

fn build(fx: &Fixture, node: MockRef, factory: &DispatchTableFactory) -> DynamicProxy {
    let surface = Arc::new(MemberSurface::compute(&fx.store, fx.service).expect("surface"));
    factory
        .build_proxy(surface, Dispatcher::new(node, Arc::clone(&fx.store)))
        .expect("proxy")
}

#[test]
fn test_arranged_method_with_out_parameter() {
    let fx = fixture();
    let node = MockNode::new();
    node.call("TryGet", vec![ArgMatcher::value("k"), ArgMatcher::any()])
        .unwrap()
        .out_name("value", 9)
        .unwrap()
        .returns(true)
        .unwrap();
    let proxy = build(&fx, node, &DispatchTableFactory::new());

    let mut args = [Value::from("k"), Value::from(0)];
    let result = proxy.invoke("TryGet", &[], &mut args).unwrap();
    assert_eq!(result, CallResult::Value(Value::Bool(true)));
    assert_eq!(args[1], Value::Int(9));
}

#[test]
fn test_void_and_return_type_checks() {
    let fx = fixture();
    let node = MockNode::new();
    node.call("Reset", ArgList::default()).unwrap();
    node.call("Count", ArgList::default()).unwrap().returns("many").unwrap();
    let proxy = build(&fx, node, &DispatchTableFactory::new());

    assert_eq!(proxy.invoke("Reset", &[], &mut []).unwrap(), CallResult::Void);
    assert!(matches!(
        proxy.invoke("Count", &[], &mut []),
        Err(DispatchError::ReturnMismatch { .. })
    ));
}

#[test]
fn test_fall_through_uses_base_or_default() {
    let fx = fixture();
    let node = MockNode::new();
    let dispatcher = Dispatcher::new(Arc::clone(&node), Arc::clone(&fx.store))
        .with_policy(UnmatchedCallPolicy::FallThrough);
    let surface = Arc::new(MemberSurface::compute(&fx.store, fx.service).unwrap());

    let plain = DispatchTableFactory::new()
        .build_proxy(Arc::clone(&surface), dispatcher.clone())
        .unwrap();
    assert_eq!(
        plain.invoke("Count", &[], &mut []).unwrap(),
        CallResult::Value(Value::Int(0))
    );

    let calls = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&calls);
    let based = DispatchTableFactory::new()
        .with_base_behavior(move |member, _| {
            log.lock().unwrap().push(member.to_string());
            Value::from(7)
        })
        .build_proxy(surface, dispatcher)
        .unwrap();
    assert_eq!(
        based.invoke("Count", &[], &mut []).unwrap(),
        CallResult::Value(Value::Int(7))
    );
    assert_eq!(*calls.lock().unwrap(), vec!["Count".to_string()]);
}

#[test]
fn test_non_overridable_members_are_not_intercepted() {
    let fx = fixture();
    let node = MockNode::new();
    node.call("Describe", ArgList::default()).unwrap().returns("arranged").unwrap();

    let proxy = build(
        &fx,
        node,
        &DispatchTableFactory::new().with_base_behavior(|_, _| Value::from("original")),
    );
    assert_eq!(
        proxy.invoke("Describe", &[], &mut []).unwrap(),
        CallResult::Value(Value::from("original"))
    );
    assert!(matches!(
        proxy.invoke("Missing", &[], &mut []),
        Err(DispatchError::UnknownMember { .. })
    ));
}

#[test]
fn test_settable_property_is_seeded_and_stored_locally() {
    let fx = fixture();
    let node = MockNode::new();
    node.set_property("Label", "seeded").unwrap();
    let proxy = build(&fx, Arc::clone(&node), &DispatchTableFactory::new());

    assert_eq!(
        proxy.get_property("Label").unwrap(),
        CallResult::Value(Value::from("seeded"))
    );
    proxy.set_property("Label", Value::from("changed")).unwrap();
    assert_eq!(
        proxy.get_property("Label").unwrap(),
        CallResult::Value(Value::from("changed"))
    );
}

#[test]
fn test_virtual_property_goes_through_the_tree() {
    let fx = fixture();
    let node = MockNode::new();
    node.set_property("Name", "n").unwrap();
    let proxy = build(&fx, Arc::clone(&node), &DispatchTableFactory::new());

    assert_eq!(
        proxy.get_property("Name").unwrap(),
        CallResult::Value(Value::from("n"))
    );
    proxy.set_property("Name", Value::from("m")).unwrap();
    match node.member("Name") {
        Some(MemberEntry::Property(slot)) => assert_eq!(slot.value, Value::from("m")),
        other => panic!("unexpected entry: {other:?}"),
    }
    assert!(matches!(
        proxy.set_property("Name", Value::from(3)),
        Err(DispatchError::ReturnMismatch { .. })
    ));
}

#[test]
fn test_indexer_and_event() {
    let fx = fixture();
    let node = MockNode::new();
    node.set_index(vec![ArgMatcher::value(1)], "one");
    let proxy = build(&fx, node, &DispatchTableFactory::new());

    assert_eq!(
        proxy.get_index(&[Value::from(1)]).unwrap(),
        CallResult::Value(Value::from("one"))
    );
    proxy.set_index(&[Value::from(2)], Value::from("two")).unwrap();
    assert_eq!(
        proxy.get_index(&[Value::from(2)]).unwrap(),
        CallResult::Value(Value::from("two"))
    );
    assert!(proxy.get_index(&[Value::from("x")]).is_err());

    let seen = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&seen);
    proxy
        .subscribe("Changed", Callback::from_fn1(move |v: i64| *sink.lock().unwrap() = v))
        .unwrap();
    assert!(proxy.raise_event("Changed", &[Value::from(5)]).unwrap());
    assert_eq!(*seen.lock().unwrap(), 5);
    assert!(proxy.subscribe("Closed", Callback::from_fn0(|| {})).is_err());
}

#[test]
fn test_unsynthesizable_types_are_rejected() {
    let store = Arc::new(TypeStore::new());
    let sealed = store.register(TypeDef::class("Final").with_flags(dmx_surface::TypeFlags::SEALED));
    let hidden = store.register(
        TypeDef::class("Hidden").with_member(
            MemberDecl::method("Run", vec![], TypeId::VOID)
                .with_flags(MemberFlags::ABSTRACT)
                .with_access(Accessibility::Internal),
        ),
    );

    for ty in [sealed, hidden] {
        let surface = Arc::new(MemberSurface::compute(&store, ty).unwrap());
        let dispatcher = Dispatcher::new(MockNode::new(), Arc::clone(&store));
        assert!(DispatchTableFactory::new().build_proxy(surface, dispatcher).is_err());
    }
}

#[test]
fn test_instance_of() {
    let fx = fixture();
    let proxy = build(&fx, MockNode::new(), &DispatchTableFactory::new());
    assert!(proxy.is_instance_of(fx.service));
    assert!(proxy.is_instance_of(TypeId::OBJECT));
    assert!(!proxy.is_instance_of(TypeId::STRING));
    assert_eq!(proxy.type_id(), fx.service);

    let other = Value::Object(ObjectRef::new(fx.service, 1));
    assert!(other.conforms_to(&fx.store, fx.service));
}

#[test]
fn test_building_a_proxy_does_not_read_ensured_values() {
    let fx = fixture();
    let node = MockNode::new();
    node.set_property_ensured("Label", "x").unwrap();
    let proxy = build(&fx, Arc::clone(&node), &DispatchTableFactory::new());

    let slot = match node.member("Label") {
        Some(MemberEntry::Property(slot)) => slot,
        other => panic!("unexpected entry: {other:?}"),
    };
    assert_eq!(slot.reads(), 0);
    assert!(crate::verify::verify(&node, &fx.store, "c").is_err());

    assert_eq!(
        proxy.get_property("Label").unwrap(),
        CallResult::Value(Value::from("x"))
    );
    assert_eq!(slot.reads(), 1);
    assert!(crate::verify::verify(&node, &fx.store, "c").is_ok());
}

#[test]
fn test_fields_are_seeded_and_type_checked() {
    let store = Arc::new(TypeStore::new());
    let ty = store.register(TypeDef::class("Record").with_members([
        MemberDecl::field("count", TypeId::INT),
        MemberDecl::field("owner", TypeId::OBJECT),
        MemberDecl::field("id", TypeId::INT).with_flags(MemberFlags::READONLY),
    ]));
    let node = MockNode::new();
    node.set_property("count", 4).unwrap();
    let owner = node.child("owner").unwrap();

    let surface = Arc::new(MemberSurface::compute(&store, ty).unwrap());
    let proxy = DispatchTableFactory::new()
        .build_proxy(surface, Dispatcher::new(node, Arc::clone(&store)))
        .unwrap();

    assert_eq!(
        proxy.get_property("count").unwrap(),
        CallResult::Value(Value::Int(4))
    );
    match proxy.get_property("owner").unwrap() {
        CallResult::Value(Value::Mock(seeded)) => assert!(Arc::ptr_eq(&seeded, &owner)),
        other => panic!("unexpected result: {other:?}"),
    }

    proxy.set_property("count", Value::from(5)).unwrap();
    assert_eq!(
        proxy.get_property("count").unwrap(),
        CallResult::Value(Value::Int(5))
    );
    assert!(matches!(
        proxy.set_property("count", Value::from("five")),
        Err(DispatchError::ReturnMismatch { .. })
    ));

    assert_eq!(
        proxy.get_property("id").unwrap(),
        CallResult::Value(Value::Int(0))
    );
    assert!(matches!(
        proxy.set_property("id", Value::from(1)),
        Err(DispatchError::UnknownMember { .. })
    ));
}
