//! Interoperation with the observation system, which rewrites the same
//! instances' dispatch identities for its own purposes.

use graft::testing::{Recorder, op};
use graft::{Class, DEFAULT_SHADOW_PREFIX, Engine, Imp, Runtime, Shape, observe};
use std::sync::Arc;

mod common;
use common::{init_tracing, setup};

#[test]
fn test_hooks_on_an_observed_instance() {
    let fixture = setup();
    let obj = fixture.widget();
    let set_count = op("set_count");

    let observer = {
        let recorder = fixture.recorder.clone();
        observe::observe(&fixture.runtime, &obj, &set_count, move |_, _| {
            recorder.push("observed");
        })
        .expect("set_count is observable")
    };

    let token = {
        let recorder = fixture.recorder.clone();
        fixture
            .engine
            .hook_with_arg(&obj, &set_count, Shape::Int, move |inv, _| {
                recorder.push("hook");
                inv.call_original();
            })
    };
    assert!(token.is_active());
    // The observation system keeps the dispatch identity; interception went
    // through the origin patch instead of a shadow class.
    assert!(observe::is_observing_class(&obj.class()));

    obj.send_int(&set_count, 4).expect("set_count resolves");
    assert_eq!(
        fixture.recorder.snapshot(),
        ["hook", "set_count(4)", "observed"]
    );

    token.cancel();
    observer.release();
    assert_eq!(obj.class().name(), "Widget");

    fixture.recorder.clear();
    obj.send_int(&set_count, 5).expect("set_count resolves");
    assert_eq!(fixture.recorder.snapshot(), ["set_count(5)"]);
}

/// Fixture with the observed operation *inherited*, so patch restoration is
/// observable: the subclass's own table entry must vanish again.
fn inherited_fixture() -> (Runtime, Engine, Arc<Class>, Arc<Class>, Recorder) {
    init_tracing();
    let runtime = Runtime::new();
    let recorder = Recorder::new();
    let base = runtime.define_class("Base", None).expect("fresh runtime");
    {
        let recorder = recorder.clone();
        base.define_method(
            "set_count".into(),
            Imp::Int(Arc::new(move |_, value| {
                recorder.push(format!("set_count({value})"));
            })),
        );
    }
    let sub = runtime
        .define_class("Sub", Some(&base))
        .expect("fresh runtime");
    let engine = Engine::new(runtime.clone());
    (runtime, engine, base, sub, recorder)
}

#[test]
fn test_patch_is_reference_counted_across_instances() {
    let (runtime, engine, _base, sub, recorder) = inherited_fixture();
    let set_count = op("set_count");
    let a = runtime.instantiate(&sub);
    let b = runtime.instantiate(&sub);

    let _obs_a = observe::observe(&runtime, &a, &set_count, |_, _| {}).expect("observable");
    let _obs_b = observe::observe(&runtime, &b, &set_count, |_, _| {}).expect("observable");

    let token_a = {
        let recorder = recorder.clone();
        engine.hook_with_arg(&a, &set_count, Shape::Int, move |inv, _| {
            recorder.push("hook-a");
            inv.call_original();
        })
    };
    let token_b = {
        let recorder = recorder.clone();
        engine.hook_with_arg(&b, &set_count, Shape::Int, move |inv, _| {
            recorder.push("hook-b");
            inv.call_original();
        })
    };

    // The shared origin now carries the patch as a local entry.
    assert!(sub.local_method(&set_count).is_some());

    // Cancelling the first instance's hook must not restore the original
    // while the second instance still relies on the patch.
    token_a.cancel();
    assert!(sub.local_method(&set_count).is_some());

    recorder.clear();
    b.send_int(&set_count, 2).expect("set_count resolves");
    assert_eq!(recorder.snapshot(), ["hook-b", "set_count(2)"]);

    // Only after both stop relying on it is the original restored.
    token_b.cancel();
    assert!(sub.local_method(&set_count).is_none());

    recorder.clear();
    a.send_int(&set_count, 3).expect("set_count resolves");
    assert_eq!(recorder.snapshot(), ["set_count(3)"]);
}

#[test]
fn test_destruction_releases_the_patch() {
    let (runtime, engine, _base, sub, recorder) = inherited_fixture();
    let set_count = op("set_count");
    let a = runtime.instantiate(&sub);
    let b = runtime.instantiate(&sub);

    let _obs_a = observe::observe(&runtime, &a, &set_count, |_, _| {}).expect("observable");
    let _obs_b = observe::observe(&runtime, &b, &set_count, |_, _| {}).expect("observable");

    let token_a = engine.hook_with_arg(&a, &set_count, Shape::Int, |inv, _| inv.call_original());
    let token_b = {
        let recorder = recorder.clone();
        engine.hook_with_arg(&b, &set_count, Shape::Int, move |inv, _| {
            recorder.push("hook-b");
            inv.call_original();
        })
    };

    // `a` is destroyed without anyone cancelling; its destruction observer
    // must decrement the reference count exactly once.
    drop(a);
    assert!(sub.local_method(&set_count).is_some());

    // Cancelling a's token afterwards is an orphaned no-op, not a second
    // decrement.
    token_a.cancel();
    assert!(sub.local_method(&set_count).is_some());

    recorder.clear();
    b.send_int(&set_count, 8).expect("set_count resolves");
    assert_eq!(recorder.snapshot(), ["hook-b", "set_count(8)"]);

    token_b.cancel();
    assert!(sub.local_method(&set_count).is_none());
}

#[test]
fn test_unhooked_instances_degrade_to_the_original() {
    let (runtime, engine, _base, sub, recorder) = inherited_fixture();
    let set_count = op("set_count");
    let hooked = runtime.instantiate(&sub);
    let bystander = runtime.instantiate(&sub);

    let _obs = observe::observe(&runtime, &hooked, &set_count, |_, _| {}).expect("observable");
    let _token = {
        let recorder = recorder.clone();
        engine.hook_with_arg(&hooked, &set_count, Shape::Int, move |inv, _| {
            recorder.push("hook");
            inv.call_original();
        })
    };

    // The origin patch is shared by every instance of the class; an
    // instance with no interception state runs the original untouched.
    bystander.send_int(&set_count, 6).expect("set_count resolves");
    assert_eq!(recorder.snapshot(), ["set_count(6)"]);
}

#[test]
fn test_interception_stacked_under_observation_never_reverts() {
    let fixture = setup();
    let obj = fixture.widget();
    let tick = op("tick");
    let set_count = op("set_count");
    let shadow_name = format!("{DEFAULT_SHADOW_PREFIX}Widget");

    // 1. Intercept: instance moves to the shadow class.
    let tick_token = {
        let recorder = fixture.recorder.clone();
        fixture.engine.hook(&obj, &tick, move |inv| {
            recorder.push("tick-hook");
            inv.call_original();
        })
    };
    assert_eq!(obj.class().name(), shadow_name);

    // 2. The observation system rewrites on top of the shadow.
    let observer = {
        let recorder = fixture.recorder.clone();
        observe::observe(&fixture.runtime, &obj, &set_count, move |_, _| {
            recorder.push("observed");
        })
        .expect("observable")
    };
    assert!(observe::is_observing_class(&obj.class()));

    // 3. Intercept again while externally rewritten: the origin patch path.
    let count_token = {
        let recorder = fixture.recorder.clone();
        fixture
            .engine
            .hook_with_arg(&obj, &set_count, Shape::Int, move |inv, _| {
                recorder.push("count-hook");
                inv.call_original();
            })
    };

    // Every layer routes: observation forwarding, both hooks, both
    // originals, each exactly once.
    obj.send(&tick).expect("tick resolves");
    obj.send_int(&set_count, 1).expect("set_count resolves");
    assert_eq!(
        fixture.recorder.snapshot(),
        ["tick-hook", "tick", "count-hook", "set_count(1)", "observed"]
    );

    // 4. Cancelling every hook must not revert the dispatch identity while
    // the observation sits on top of the shadow.
    count_token.cancel();
    tick_token.cancel();
    assert!(observe::is_observing_class(&obj.class()));

    // 5. Releasing the observation hands back the *shadow* identity; the
    // stacked shadow is conservatively left in place forever, and with no
    // hooks registered it degrades to the original.
    observer.release();
    assert_eq!(obj.class().name(), shadow_name);

    fixture.recorder.clear();
    obj.send(&tick).expect("tick resolves");
    obj.send_int(&set_count, 2).expect("set_count resolves");
    assert_eq!(fixture.recorder.snapshot(), ["tick", "set_count(2)"]);
}
