use graft::testing::op;
use graft::{HookError, Rect, Shape, Size};

mod common;
use common::setup;

#[test]
fn test_unknown_operation_rejected() {
    let fixture = setup();
    let obj = fixture.widget();

    let token = fixture.engine.hook(&obj, &op("missing"), |_| {});
    assert!(!token.is_active());
    assert!(matches!(
        token.rejection(),
        Some(HookError::OperationNotFound { .. })
    ));
    // Nothing was installed.
    assert_eq!(obj.class().name(), "Widget");
}

#[test]
fn test_getter_rejected_as_unsupported() {
    let fixture = setup();
    let obj = fixture.widget();

    let token = fixture.engine.hook(&obj, &op("count"), |_| {});
    assert!(matches!(
        token.rejection(),
        Some(HookError::UnsupportedSignature { found: "getter", .. })
    ));
    assert_eq!(obj.class().name(), "Widget");
}

#[test]
fn test_declared_shape_must_match_signature() {
    let fixture = setup();
    let obj = fixture.widget();

    // set_count takes an int, not a size.
    let token = fixture
        .engine
        .hook_with_arg(&obj, &op("set_count"), Shape::Size, |_, _| {});
    assert!(matches!(
        token.rejection(),
        Some(HookError::UnsupportedSignature { found: "int", .. })
    ));

    // A zero-argument hook on a single-argument operation is a mismatch too.
    let token = fixture.engine.hook(&obj, &op("set_count"), |_| {});
    assert!(matches!(
        token.rejection(),
        Some(HookError::UnsupportedSignature { found: "int", .. })
    ));

    // And the inverse: declaring an argument on a zero-argument operation.
    let token = fixture
        .engine
        .hook_with_arg(&obj, &op("tick"), Shape::Int, |_, _| {});
    assert!(matches!(
        token.rejection(),
        Some(HookError::UnsupportedSignature {
            found: "zero-argument",
            ..
        })
    ));
}

#[test]
fn test_set_count_shape_conflict_scenario() {
    let fixture = setup();
    let obj = fixture.widget();
    let set_count = op("set_count");

    let first = {
        let recorder = fixture.recorder.clone();
        fixture
            .engine
            .hook_with_arg(&obj, &set_count, Shape::Int, move |inv, _| {
                recorder.push("first");
                inv.call_original();
            })
    };
    assert!(first.is_active());

    // A zero-argument registration for the same operation is rejected as a
    // conflict while single-argument hooks exist.
    let second = fixture.engine.hook(&obj, &set_count, |_| {});
    assert!(matches!(
        second.rejection(),
        Some(HookError::ShapeConflict {
            existing: "single-argument",
            ..
        })
    ));

    // The first hook remains active and unaffected.
    obj.send_int(&set_count, 9).expect("set_count resolves");
    assert_eq!(fixture.recorder.snapshot(), ["first", "set_count(9)"]);
}

#[test]
fn test_all_argument_shapes_dispatch() {
    let fixture = setup();
    let obj = fixture.widget();
    let peer = fixture.widget();

    {
        let recorder = fixture.recorder.clone();
        fixture
            .engine
            .hook_with_arg(&obj, &op("resize"), Shape::Size, move |inv, _| {
                recorder.push("resize-hook");
                inv.call_original();
            });
    }
    {
        let recorder = fixture.recorder.clone();
        fixture
            .engine
            .hook_with_arg(&obj, &op("set_frame"), Shape::Rect, move |inv, _| {
                recorder.push("frame-hook");
                inv.call_original();
            });
    }
    {
        let recorder = fixture.recorder.clone();
        fixture
            .engine
            .hook_with_arg(&obj, &op("set_peer"), Shape::Obj, move |inv, _| {
                recorder.push("peer-hook");
                inv.call_original();
            });
    }

    obj.send_size(&op("resize"), Size::new(3.0, 4.0)).expect("resize");
    obj.send_rect(&op("set_frame"), Rect::new(1.0, 2.0, 3.0, 4.0))
        .expect("set_frame");
    obj.send_obj(&op("set_peer"), &peer).expect("set_peer");

    assert_eq!(
        fixture.recorder.snapshot(),
        [
            "resize-hook".to_string(),
            "resize(3x4)".to_string(),
            "frame-hook".to_string(),
            "set_frame(1,2 3x4)".to_string(),
            "peer-hook".to_string(),
            format!("set_peer(#{})", peer.id()),
        ]
    );
}

#[test]
fn test_rejection_does_not_disturb_other_operations() {
    let fixture = setup();
    let obj = fixture.widget();

    {
        let recorder = fixture.recorder.clone();
        fixture.engine.hook(&obj, &op("tick"), move |inv| {
            recorder.push("tick-hook");
            inv.call_original();
        });
    }
    let rejected = fixture.engine.hook(&obj, &op("missing"), |_| {});
    rejected.cancel(); // no-op

    obj.send(&op("tick")).expect("tick resolves");
    assert_eq!(fixture.recorder.snapshot(), ["tick-hook", "tick"]);
}
