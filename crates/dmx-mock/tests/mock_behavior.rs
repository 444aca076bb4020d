//! End-to-end behavior of the mock engine through its public API.

use dmx_mock::{
    Accessibility, ArgList, ArgMatcher, CallArg, CallResult, Callback, DispatchError,
    DispatchTableFactory, MemberDecl, MemberFlags, MockContext, MockError, MockSettings,
    ObjectRef, ParamInfo, TypeDef, TypeId, UnmatchedCallPolicy, Value, VerbArg, VerbTable,
};
use dmx_surface::SynthesisError;
use std::io::Write;
use std::sync::{Arc, Mutex};

fn virtual_method(name: &str, params: Vec<ParamInfo>, ret: TypeId) -> MemberDecl {
    MemberDecl::method(name, params, ret).with_flags(MemberFlags::VIRTUAL)
}

#[test]
fn test_three_level_override_resolves_once() {
    dmx_common::init_tracing();
    let ctx = MockContext::default();
    let l1 = ctx.register(
        TypeDef::class("L1").with_member(virtual_method("Run", vec![], TypeId::INT)),
    );
    let l2 = ctx.register(TypeDef::class("L2").with_base(l1).with_member(
        MemberDecl::method("Run", vec![], TypeId::INT).with_flags(MemberFlags::OVERRIDE),
    ));
    let l3 = ctx.register(TypeDef::class("L3").with_base(l2).with_member(
        MemberDecl::method("Run", vec![], TypeId::INT).with_flags(MemberFlags::OVERRIDE),
    ));

    let surface = ctx.surface(l3).unwrap();
    let runs: Vec<_> = surface.methods_named("Run").collect();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].declaring_type, l3);
}

#[test]
fn test_boundary_only_members() {
    let ctx = MockContext::default();
    let hidden_virtual = ctx.register(TypeDef::class("A").with_member(
        virtual_method("Tick", vec![], TypeId::VOID).with_access(Accessibility::Internal),
    ));
    let surface = ctx.surface(hidden_virtual).unwrap();
    assert!(surface.methods.is_empty());
    assert!(!surface.has_inaccessible_abstract());

    let hidden_abstract = ctx.register(TypeDef::class("B").with_member(
        MemberDecl::method("Tick", vec![], TypeId::VOID)
            .with_flags(MemberFlags::ABSTRACT)
            .with_access(Accessibility::Internal),
    ));
    let surface = ctx.surface(hidden_abstract).unwrap();
    assert!(surface.has_inaccessible_abstract());

    let err = ctx
        .build_proxy("b", hidden_abstract, &DispatchTableFactory::new())
        .unwrap_err();
    assert!(matches!(
        err,
        MockError::Synthesis(SynthesisError::InaccessibleAbstract { .. })
    ));
}

#[test]
fn test_last_registered_wins() {
    let ctx = MockContext::default();
    let ty = ctx.register(TypeDef::class("S").with_member(virtual_method("Foo", vec![], TypeId::INT)));
    let mock = ctx.mock("s");
    mock.call("Foo", ArgList::default()).unwrap().returns(33).unwrap();
    mock.call("Foo", ArgList::default()).unwrap().returns(44).unwrap();

    let proxy = ctx.build_proxy("s", ty, &DispatchTableFactory::new()).unwrap();
    assert_eq!(
        proxy.invoke("Foo", &[], &mut []).unwrap(),
        CallResult::Value(Value::Int(44))
    );
}

#[test]
fn test_typed_wildcard_at_reference_parameter() {
    let ctx = MockContext::default();
    let animal = ctx.register(TypeDef::class("Animal"));
    let dog = ctx.register(TypeDef::class("Dog").with_base(animal));
    let rock = ctx.register(TypeDef::class("Rock"));
    let shelter = ctx.register(TypeDef::class("Shelter").with_member(virtual_method(
        "Admit",
        vec![ParamInfo::new("who", TypeId::OBJECT)],
        TypeId::BOOL,
    )));

    ctx.mock("shelter")
        .call("Admit", vec![ArgMatcher::any_of(animal)])
        .unwrap()
        .returns(true)
        .unwrap();
    let proxy = ctx.build_proxy("shelter", shelter, &DispatchTableFactory::new()).unwrap();

    let admit = |v: Value| proxy.invoke("Admit", &[], &mut [v]);
    assert_eq!(
        admit(Value::from(ObjectRef::new(dog, 1))).unwrap(),
        CallResult::Value(Value::Bool(true))
    );
    assert_eq!(admit(Value::Null).unwrap(), CallResult::Value(Value::Bool(true)));
    assert!(matches!(
        admit(Value::from(ObjectRef::new(rock, 2))),
        Err(DispatchError::Unanticipated { .. })
    ));
    assert!(matches!(
        admit(Value::from(5)),
        Err(DispatchError::Unanticipated { .. })
    ));
}

#[test]
fn test_shared_call_prefix_uses_one_result_node() {
    let ctx = MockContext::default();
    let a = ctx.mock("a");
    a.call("Foo", ArgList::default()).unwrap().set_property("X", 1).unwrap();
    a.call("Foo", ArgList::default()).unwrap().set_property("Y", 2).unwrap();

    let foo = a.expectations("Foo");
    assert_eq!(foo.len(), 1);

    let result = ctx
        .dispatcher("a")
        .invoke("Foo", &[], &mut [])
        .unwrap()
        .into_value()
        .and_then(|v| v.as_mock().cloned())
        .expect("chained node");
    let names: Vec<String> = result.members().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["X", "Y"]);
}

#[test]
fn test_exactly_one_unmet_of_three() {
    dmx_common::init_tracing();
    let ctx = MockContext::default();
    let m = ctx.mock("svc");
    for name in ["Open", "Read", "Close"] {
        m.call(name, ArgList::default()).unwrap().ensure();
    }
    let d = ctx.dispatcher("svc");
    d.invoke("Open", &[], &mut []).unwrap();
    d.invoke("Close", &[], &mut []).unwrap();

    let err = ctx.verify().unwrap_err();
    assert_eq!(err.unmet, vec!["svc.Read()"]);
}

#[test]
fn test_out_by_index_and_by_name_both_apply() {
    let ctx = MockContext::default();
    let ty = ctx.register(TypeDef::class("Parser").with_member(virtual_method(
        "Split",
        vec![ParamInfo::out("head", TypeId::STRING), ParamInfo::out("tail", TypeId::STRING)],
        TypeId::VOID,
    )));
    ctx.mock("p")
        .call("Split", vec![ArgMatcher::any(), ArgMatcher::any()])
        .unwrap()
        .out_index(0, "a")
        .unwrap()
        .out_name("tail", "b")
        .unwrap();

    let proxy = ctx.build_proxy("p", ty, &DispatchTableFactory::new()).unwrap();
    let mut args = [Value::Null, Value::Null];
    assert_eq!(proxy.invoke("Split", &[], &mut args).unwrap(), CallResult::Void);
    assert_eq!(args, [Value::from("a"), Value::from("b")]);
}

#[test]
fn test_callback_mismatch_is_raised_and_changes_nothing() {
    let ctx = MockContext::default();
    let handle = ctx
        .mock("m")
        .call("Store", vec![ArgMatcher::any()])
        .unwrap()
        .out_index(0, "replaced")
        .unwrap()
        .on_call(Callback::from_fn1(|_: i64| {}));

    let mut call_args = [CallArg::new("original").typed(TypeId::STRING)];
    let err = ctx
        .dispatcher("m")
        .invoke("Store", &[], &mut call_args)
        .unwrap_err();
    assert!(matches!(err, DispatchError::CallbackMismatch { position: 0, .. }));
    assert_eq!(call_args[0].value, Value::from("original"));
    assert_eq!(handle.calls(), 0);
}

#[test]
fn test_verb_driven_arrangement_with_renamed_verbs() {
    let settings = MockSettings::default().with_verbs(VerbTable::prefixed("Dx"));
    let ctx = MockContext::new(settings).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    ctx.mock("m")
        .call("Returns", vec![ArgMatcher::value("x")])
        .unwrap()
        .apply("DxReturns", vec![VerbArg::from(Value::from(7))])
        .unwrap()
        .apply(
            "DxDo",
            vec![Callback::from_fn1(move |s: String| sink.lock().unwrap().push(s)).into()],
        )
        .unwrap()
        .apply("DxEnsure", vec![])
        .unwrap();

    let result = ctx
        .dispatcher("m")
        .invoke("Returns", &[], &mut [CallArg::new("x")])
        .unwrap();
    assert_eq!(result, CallResult::Value(Value::Int(7)));
    assert_eq!(*seen.lock().unwrap(), vec!["x".to_string()]);
    assert!(ctx.verify().is_ok());
}

#[test]
fn test_generic_calls() {
    let ctx = MockContext::default();
    let widget = ctx.register(TypeDef::class("Widget"));
    let factory = ctx.register(TypeDef::class("Factory").with_member(
        virtual_method("Create", vec![], TypeId::OBJECT).with_generic_arity(1),
    ));
    let m = ctx.mock("f");
    m.call("Create", ArgList::default())
        .unwrap()
        .generics([widget])
        .returns(ObjectRef::new(widget, 1))
        .unwrap();

    let proxy = ctx.build_proxy("f", factory, &DispatchTableFactory::new()).unwrap();
    assert_eq!(
        proxy.invoke("Create", &[widget], &mut []).unwrap(),
        CallResult::Value(Value::from(ObjectRef::new(widget, 1)))
    );
    assert!(proxy.invoke("Create", &[TypeId::STRING], &mut []).is_err());
    // A generic method is not callable without type arguments.
    assert!(matches!(
        proxy.invoke("Create", &[], &mut []),
        Err(DispatchError::UnknownMember { .. })
    ));
}

#[test]
fn test_interface_mock() {
    let ctx = MockContext::default();
    let readable = ctx.register(TypeDef::interface("IReadable").with_member(MemberDecl::method(
        "Read",
        vec![],
        TypeId::STRING,
    )));
    let stream = ctx.register(
        TypeDef::interface("IStream")
            .with_interfaces(vec![readable])
            .with_member(MemberDecl::property("Length", TypeId::INT)),
    );
    let m = ctx.mock("s");
    m.call("Read", ArgList::default()).unwrap().returns("data").unwrap();
    m.set_property("Length", 4).unwrap();

    let proxy = ctx.build_proxy("s", stream, &DispatchTableFactory::new()).unwrap();
    assert!(proxy.is_instance_of(readable));
    assert_eq!(
        proxy.invoke("Read", &[], &mut []).unwrap(),
        CallResult::Value(Value::from("data"))
    );
    assert_eq!(
        proxy.get_property("Length").unwrap(),
        CallResult::Value(Value::Int(4))
    );
}

#[test]
fn test_fall_through_policy_yields_defaults() {
    let settings = MockSettings {
        unmatched_calls: UnmatchedCallPolicy::FallThrough,
        ..MockSettings::default()
    };
    let ctx = MockContext::new(settings).unwrap();
    let ty = ctx.register(TypeDef::class("Counter").with_members([
        virtual_method("Next", vec![], TypeId::INT),
        virtual_method("Done", vec![], TypeId::BOOL),
        virtual_method("Name", vec![], TypeId::STRING),
    ]));
    let proxy = ctx.build_proxy("c", ty, &DispatchTableFactory::new()).unwrap();

    assert_eq!(proxy.invoke("Next", &[], &mut []).unwrap(), CallResult::Value(Value::Int(0)));
    assert_eq!(
        proxy.invoke("Done", &[], &mut []).unwrap(),
        CallResult::Value(Value::Bool(false))
    );
    assert_eq!(proxy.invoke("Name", &[], &mut []).unwrap(), CallResult::Value(Value::Null));
}

#[test]
fn test_surface_cache_toggle_through_context() {
    let ctx = MockContext::default();
    let ty = ctx.register(TypeDef::class("T"));
    ctx.surface(ty).unwrap();
    ctx.surface(ty).unwrap();
    assert_eq!(ctx.cache().stats().hits, 1);

    ctx.set_cache_surfaces(false);
    assert!(ctx.cache().is_empty());
    ctx.set_cache_surfaces(true);
    ctx.surface(ty).unwrap();
    assert!(ctx.cache().contains(ty));
}

#[test]
fn test_settings_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "verbs": {{ "returns": "Yields" }}, "cacheSurfaces": "false", "unmatchedCalls": "fallThrough" }}"#
    )
    .unwrap();

    let ctx = MockContext::from_settings_file(file.path()).unwrap();
    assert_eq!(ctx.settings().verbs.returns, "Yields");
    assert_eq!(ctx.settings().verbs.ensure, "Ensure");
    assert!(!ctx.cache().is_enabled());
    assert_eq!(ctx.settings().unmatched_calls, UnmatchedCallPolicy::FallThrough);

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    write!(bad, r#"{{ "verbs": {{ "ensure": "Returns" }} }}"#).unwrap();
    assert!(MockContext::from_settings_file(bad.path()).is_err());
}
