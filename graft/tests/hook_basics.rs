use graft::testing::op;
use graft::{Shape, Value};

mod common;
use common::setup;

#[test]
fn test_hooks_run_in_registration_order() {
    let fixture = setup();
    let obj = fixture.widget();
    let tick = op("tick");

    for name in ["h1", "h2", "h3", "h4", "h5"] {
        let recorder = fixture.recorder.clone();
        fixture.engine.hook(&obj, &tick, move |_| recorder.push(name));
    }

    obj.send(&tick).expect("tick resolves");
    assert_eq!(fixture.recorder.snapshot(), ["h1", "h2", "h3", "h4", "h5"]);

    // Same order on every invocation.
    fixture.recorder.clear();
    obj.send(&tick).expect("tick resolves");
    assert_eq!(fixture.recorder.snapshot(), ["h1", "h2", "h3", "h4", "h5"]);
}

#[test]
fn test_tick_scenario_original_between_hooks() {
    // Hook A appends and calls the original; hook B appends and does not.
    let fixture = setup();
    let obj = fixture.widget();
    let tick = op("tick");

    {
        let recorder = fixture.recorder.clone();
        fixture.engine.hook(&obj, &tick, move |inv| {
            recorder.push("A");
            inv.call_original();
        });
    }
    {
        let recorder = fixture.recorder.clone();
        fixture.engine.hook(&obj, &tick, move |_| {
            recorder.push("B");
        });
    }

    obj.send(&tick).expect("tick resolves");
    // The original body ("tick") runs exactly once, triggered by A.
    assert_eq!(fixture.recorder.snapshot(), ["A", "tick", "B"]);
}

#[test]
fn test_original_runs_at_most_once() {
    let fixture = setup();
    let obj = fixture.widget();
    let tick = op("tick");

    // Every hook greedily calls the original; only the first call lands.
    for _ in 0..3 {
        fixture.engine.hook(&obj, &tick, |inv| {
            inv.call_original();
            inv.call_original();
        });
    }

    obj.send(&tick).expect("tick resolves");
    let runs = fixture
        .recorder
        .snapshot()
        .iter()
        .filter(|e| *e == "tick")
        .count();
    assert_eq!(runs, 1);
}

#[test]
fn test_hooks_may_suppress_the_original() {
    let fixture = setup();
    let obj = fixture.widget();
    let tick = op("tick");

    {
        let recorder = fixture.recorder.clone();
        fixture.engine.hook(&obj, &tick, move |inv| {
            recorder.push("suppressing");
            assert!(!inv.original_called());
        });
    }

    obj.send(&tick).expect("tick resolves");
    // The hook ran; the original did not.
    assert_eq!(fixture.recorder.snapshot(), ["suppressing"]);
}

#[test]
fn test_single_argument_hooks_receive_the_value() {
    let fixture = setup();
    let obj = fixture.widget();
    let set_count = op("set_count");

    {
        let recorder = fixture.recorder.clone();
        fixture
            .engine
            .hook_with_arg(&obj, &set_count, Shape::Int, move |inv, arg| {
                assert_eq!(*arg, Value::Int(42));
                assert_eq!(inv.arg(), Some(arg));
                recorder.push("hooked");
                inv.call_original();
            });
    }

    obj.send_int(&set_count, 42).expect("set_count resolves");
    assert_eq!(fixture.recorder.snapshot(), ["hooked", "set_count(42)"]);
}

#[test]
fn test_invocation_exposes_receiver_and_op() {
    let fixture = setup();
    let obj = fixture.widget();
    let tick = op("tick");

    {
        let expected = obj.clone();
        let recorder = fixture.recorder.clone();
        fixture.engine.hook(&obj, &tick, move |inv| {
            assert!(std::sync::Arc::ptr_eq(inv.receiver(), &expected));
            assert_eq!(inv.op().as_str(), "tick");
            recorder.push("checked");
        });
    }

    obj.send(&tick).expect("tick resolves");
    assert_eq!(fixture.recorder.snapshot(), ["checked"]);
}

#[test]
fn test_uninvolved_instances_are_untouched() {
    let fixture = setup();
    let hooked = fixture.widget();
    let plain = fixture.widget();
    let tick = op("tick");

    {
        let recorder = fixture.recorder.clone();
        fixture.engine.hook(&hooked, &tick, move |inv| {
            recorder.push("hook");
            inv.call_original();
        });
    }

    plain.send(&tick).expect("tick resolves");
    assert_eq!(fixture.recorder.snapshot(), ["tick"]);
    assert_eq!(plain.class().name(), "Widget");
}
