//! Per-object interception state.
//!
//! One record per intercepted instance, attached through the object's
//! associated storage so it is destroyed together with the object. The
//! record pins the instance's true original class and holds the ordered hook
//! lists plus the bookkeeping needed to coexist with the external rewriter.

use crate::invoke::Invocation;
use graft_core::{Class, DropToken, Obj, ObjRef, OpId, Value};
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::any::Any;
use std::sync::Arc;

/// Associated-storage key under which the state record rides the object.
pub(crate) const STATE_KEY: &str = "graft.intercept-state";

/// A registered zero-argument hook.
pub(crate) type PlainHookFn = Arc<dyn Fn(&Invocation<'_>) + Send + Sync>;
/// A registered single-argument hook.
pub(crate) type ArgHookFn = Arc<dyn Fn(&Invocation<'_>, &Value) + Send + Sync>;

/// Ordered-list entry for a zero-argument hook.
pub(crate) struct PlainEntry {
    pub(crate) id: u64,
    pub(crate) hook: PlainHookFn,
}

/// Ordered-list entry for a single-argument hook.
pub(crate) struct ArgEntry {
    pub(crate) id: u64,
    pub(crate) hook: ArgHookFn,
}

/// Mutable interior of the state record, guarded by one mutex.
#[derive(Default)]
pub(crate) struct StateInner {
    /// Hooks for zero-argument operations, in registration order.
    pub(crate) plain: FxHashMap<OpId, SmallVec<[PlainEntry; 2]>>,
    /// Hooks for single-argument operations, in registration order. An
    /// operation appears in at most one of the two maps at a time.
    pub(crate) with_arg: FxHashMap<OpId, SmallVec<[ArgEntry; 2]>>,
    /// Operations intercepted by patching the shared origin class (the
    /// external-rewrite interop path) rather than a private shadow class.
    pub(crate) patched: FxHashSet<OpId>,
    /// Destruction-notification tokens that decrement the interop reference
    /// counts when the object dies without explicit cancellation.
    pub(crate) drop_guards: FxHashMap<OpId, DropToken>,
}

/// Interception state for one object instance.
pub(crate) struct ObjState {
    origin: Arc<Class>,
    inner: Mutex<StateInner>,
}

impl ObjState {
    fn new(origin: Arc<Class>) -> Self {
        Self {
            origin,
            inner: Mutex::new(StateInner::default()),
        }
    }

    /// The object's true original class. Pinned at creation; never changes
    /// while any hook is registered.
    pub(crate) fn origin(&self) -> &Arc<Class> {
        &self.origin
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock()
    }
}

/// Fetch the object's state record, creating it under the associated-storage
/// lock on first access.
pub(crate) fn state_for(obj: &ObjRef, origin: &Arc<Class>) -> Arc<ObjState> {
    let record = obj.assoc_or_insert_with(STATE_KEY, || {
        Arc::new(ObjState::new(origin.clone())) as Arc<dyn Any + Send + Sync>
    });
    record
        .downcast::<ObjState>()
        .expect("interception state key holds a foreign record")
}

/// Fetch the object's state record if one exists.
pub(crate) fn existing_state(obj: &Obj) -> Option<Arc<ObjState>> {
    obj.assoc(STATE_KEY)?.downcast::<ObjState>().ok()
}
