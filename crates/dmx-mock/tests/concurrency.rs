//! Dispatch from many threads at once.

use dmx_mock::{
    ArgList, ArgMatcher, CallArg, CallResult, Callback, DispatchTableFactory, MemberDecl,
    MemberFlags, MockContext, ParamInfo, TypeDef, TypeId, Value,
};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const CALLS: u64 = 2_000;

fn init_test_logging() {
    dmx_common::init_test_tracing();
}

#[test]
fn test_concurrent_calls_are_each_counted_once() {
    init_test_logging();
    let ctx = MockContext::default();
    let side_effects = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&side_effects);
    let handle = ctx
        .mock("svc")
        .call("Hit", vec![ArgMatcher::any_of(TypeId::INT)])
        .unwrap()
        .returns(1)
        .unwrap()
        .on_call(Callback::from_fn0(move || {
            counter.fetch_add(1, Ordering::Relaxed);
        }));

    let dispatcher = ctx.dispatcher("svc");
    (0..CALLS).into_par_iter().for_each(|i| {
        let mut args = [CallArg::new(i as i64)];
        let result = dispatcher.invoke("Hit", &[], &mut args).unwrap();
        assert_eq!(result, CallResult::Value(Value::Int(1)));
    });

    assert_eq!(handle.calls(), CALLS);
    assert_eq!(side_effects.load(Ordering::Relaxed), CALLS);
}

#[test]
fn test_out_values_are_never_partially_applied() {
    init_test_logging();
    let ctx = MockContext::default();
    let ty = ctx.register(TypeDef::class("Pair").with_member(
        MemberDecl::method(
            "Fill",
            vec![ParamInfo::out("a", TypeId::INT), ParamInfo::out("b", TypeId::INT)],
            TypeId::VOID,
        )
        .with_flags(MemberFlags::VIRTUAL),
    ));
    ctx.mock("pair")
        .call("Fill", vec![ArgMatcher::any(), ArgMatcher::any()])
        .unwrap()
        .out_index(0, 10)
        .unwrap()
        .out_name("b", 20)
        .unwrap();
    let proxy = ctx.build_proxy("pair", ty, &DispatchTableFactory::new()).unwrap();

    (0..CALLS).into_par_iter().for_each(|_| {
        let mut args = [Value::from(0), Value::from(0)];
        proxy.invoke("Fill", &[], &mut args).unwrap();
        assert_eq!(args, [Value::Int(10), Value::Int(20)]);
    });

    let calls: u64 = ctx
        .mock("pair")
        .expectations("Fill")
        .iter()
        .map(|e| e.calls())
        .sum();
    assert_eq!(calls, CALLS);
}

#[test]
fn test_different_nodes_in_parallel() {
    init_test_logging();
    let ctx = Arc::new(MockContext::default());
    let names: Vec<String> = (0..16).map(|i| format!("m{i}")).collect();
    for name in &names {
        ctx.mock(name)
            .call("Ping", ArgList::default())
            .unwrap()
            .ensure();
    }

    names.par_iter().for_each(|name| {
        let d = ctx.dispatcher(name);
        for _ in 0..50 {
            d.invoke("Ping", &[], &mut []).unwrap();
        }
    });

    assert!(ctx.verify().is_ok());
    for name in &names {
        assert_eq!(ctx.mock(name).expectations("Ping")[0].calls(), 50);
    }
}
