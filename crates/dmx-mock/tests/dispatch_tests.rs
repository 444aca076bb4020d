use super::*;
use crate::matcher::{ArgList, ArgMatcher, args};
use crate::tree::MockNode;
use std::sync::Mutex;

fn dispatcher() -> Dispatcher {
    Dispatcher::new(MockNode::new(), Arc::new(TypeStore::new()))
}

#[test]
fn test_newest_matching_expectation_wins() {
    let d = dispatcher();
    d.node().call("Get", vec![ArgMatcher::value(1)]).unwrap().returns(33).unwrap();
    d.node().call("Get", vec![ArgMatcher::value(1)]).unwrap().returns(44).unwrap();
    d.node().call("Get", vec![ArgMatcher::value(2)]).unwrap().returns(55).unwrap();

    let result = d.invoke("Get", &[], &mut args([1])).unwrap();
    assert_eq!(result, CallResult::Value(Value::Int(44)));
    let result = d.invoke("Get", &[], &mut args([2])).unwrap();
    assert_eq!(result.into_value(), Some(Value::Int(55)));

    let counts: Vec<u64> = d.node().expectations("Get").iter().map(|e| e.calls()).collect();
    assert_eq!(counts, vec![0, 1, 1]);
}

#[test]
fn test_unmatched_call_policy() {
    let d = dispatcher();
    let err = d.invoke("Missing", &[], &mut args([1, 2])).unwrap_err();
    assert_eq!(
        err,
        DispatchError::Unanticipated {
            member: "Missing".to_string(),
            args: "1, 2".to_string(),
        }
    );

    let lenient = d.clone().with_policy(UnmatchedCallPolicy::FallThrough);
    assert_eq!(
        lenient.invoke("Missing", &[], &mut args([1])).unwrap(),
        CallResult::FallThrough
    );
    assert_eq!(lenient.get_property("Nothing").unwrap(), CallResult::FallThrough);
}

#[test]
fn test_property_reads_and_writes() {
    let d = dispatcher();
    d.node().set_property("Name", "x").unwrap();
    assert_eq!(
        d.get_property("Name").unwrap(),
        CallResult::Value(Value::from("x"))
    );
    assert_eq!(d.set_property("Name", Value::from("y")).unwrap(), CallResult::Void);
    assert_eq!(
        d.get_property("Name").unwrap(),
        CallResult::Value(Value::from("y"))
    );

    let child = d.node().child("Inner").unwrap();
    assert_eq!(
        d.get_property("Inner").unwrap(),
        CallResult::Value(Value::Mock(child))
    );
}

#[test]
fn test_set_property_on_method_name_is_unmatched() {
    let d = dispatcher();
    d.node().call("Run", ArgList::default()).unwrap();
    assert!(matches!(
        d.set_property("Run", Value::from(1)),
        Err(DispatchError::Unanticipated { .. })
    ));
}

#[test]
fn test_indexer_round_trip() {
    let d = dispatcher();
    d.node().set_index(vec![ArgMatcher::any()], "default");
    d.node().set_index(vec![ArgMatcher::value(3)], "three");

    assert_eq!(
        d.get_index(&args([3])).unwrap(),
        CallResult::Value(Value::from("three"))
    );
    assert_eq!(
        d.get_index(&args([4])).unwrap(),
        CallResult::Value(Value::from("default"))
    );

    d.set_index(&args([4]), Value::from("four")).unwrap();
    assert_eq!(
        d.get_index(&args([4])).unwrap(),
        CallResult::Value(Value::from("four"))
    );
    assert!(d.get_index(&args(["k", "v"])).is_err());
}

#[test]
fn test_repeated_index_writes_do_not_accumulate() {
    let d = dispatcher();
    d.node().set_index(vec![ArgMatcher::any()], "default");
    for i in 0..100_i64 {
        d.set_index(&args([7]), Value::Int(i)).unwrap();
    }
    assert_eq!(d.node().index_entries().len(), 2);
    assert_eq!(
        d.get_index(&args([7])).unwrap(),
        CallResult::Value(Value::Int(99))
    );
    assert_eq!(
        d.get_index(&args([8])).unwrap(),
        CallResult::Value(Value::from("default"))
    );
}

#[test]
fn test_events_run_in_subscription_order() {
    let d = dispatcher();
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&log);
    let second = Arc::clone(&log);
    d.subscribe(
        "Changed",
        Callback::from_fn1(move |v: i64| first.lock().unwrap().push(("first", v))),
    );
    let id = d.subscribe(
        "Changed",
        Callback::from_fn1(move |v: i64| second.lock().unwrap().push(("second", v))),
    );

    assert!(d.raise_event("Changed", &args([7])).unwrap());
    assert_eq!(*log.lock().unwrap(), vec![("first", 7), ("second", 7)]);

    assert!(d.unsubscribe("Changed", id));
    assert!(d.raise_event("Changed", &args([8])).unwrap());
    assert_eq!(log.lock().unwrap().len(), 3);

    assert!(!d.raise_event("Closed", &[]).unwrap());
}

#[test]
fn test_event_handlers_are_all_checked_first() {
    let d = dispatcher();
    let ran = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&ran);
    d.subscribe("Changed", Callback::from_fn0(move || *flag.lock().unwrap() = true));
    d.subscribe("Changed", Callback::from_fn1(|_: String| {}));

    let err = d.raise_event("Changed", &args([1])).unwrap_err();
    assert!(matches!(err, DispatchError::CallbackMismatch { .. }));
    assert!(!*ran.lock().unwrap());
}

#[test]
fn test_for_node_shares_policy() {
    let d = dispatcher().with_policy(UnmatchedCallPolicy::FallThrough);
    let other = d.for_node(MockNode::new());
    assert_eq!(other.policy(), UnmatchedCallPolicy::FallThrough);
    assert_ne!(other.node().id(), d.node().id());
}
