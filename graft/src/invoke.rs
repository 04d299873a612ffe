//! The hook invocation engine.
//!
//! Every trampoline, whichever installation strategy placed it, funnels into
//! [`Engine::invoke`]. The engine runs the registered hooks in registration
//! order and guarantees the original implementation executes at most once
//! per invocation, and not at all unless some hook asks for it, which is a
//! legitimate policy decision (suppressing the base behavior).
//!
//! # Reentrancy
//!
//! A hook that synchronously re-sends the intercepted operation to the same
//! object would otherwise recurse forever. A thread-local ledger tracks call
//! depth per `(state identity, operation)`; re-entrant calls skip hooks and
//! run the original directly. The ledger is strictly per-thread: concurrent
//! invocations from other threads run their hooks independently, which a
//! single global guard would wrongly suppress.

use crate::engine::Engine;
use crate::state::{self, ArgHookFn, ObjState, PlainHookFn};
use graft_core::{ObjRef, OpId, Value};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Context handed to every hook of one intercepted invocation.
///
/// All hooks of the invocation share the same `Invocation`, so the first
/// hook (of any) calling [`call_original`](Self::call_original) spends the
/// one permitted execution of the original implementation; later calls are
/// no-ops.
pub struct Invocation<'a> {
    receiver: &'a ObjRef,
    op: &'a OpId,
    arg: Option<&'a Value>,
    original: &'a (dyn Fn() + 'a),
    fired: AtomicBool,
}

impl<'a> Invocation<'a> {
    fn new(
        receiver: &'a ObjRef,
        op: &'a OpId,
        arg: Option<&'a Value>,
        original: &'a (dyn Fn() + 'a),
    ) -> Self {
        Self {
            receiver,
            op,
            arg,
            original,
            fired: AtomicBool::new(false),
        }
    }

    /// The object the operation was sent to.
    pub fn receiver(&self) -> &ObjRef {
        self.receiver
    }

    /// The intercepted operation.
    pub fn op(&self) -> &OpId {
        self.op
    }

    /// The operation's argument, when it has one.
    pub fn arg(&self) -> Option<&Value> {
        self.arg
    }

    /// Run the original implementation. The first call across all hooks of
    /// this invocation executes it; every subsequent call is a no-op.
    pub fn call_original(&self) {
        if !self.fired.swap(true, Ordering::SeqCst) {
            (self.original)();
        }
    }

    /// Whether some hook has already spent the original.
    pub fn original_called(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

// ----------------------------------------------------------------------
// Reentrancy ledger
// ----------------------------------------------------------------------

thread_local! {
    /// Call depth per (state identity, operation) on this thread. Entries
    /// are created lazily and removed when depth returns to zero.
    static LEDGER: RefCell<FxHashMap<(usize, OpId), usize>> =
        RefCell::new(FxHashMap::default());
}

/// Scoped ledger entry: increments on construction, decrements on drop, so
/// every exit path releases its depth.
struct ReentryGuard {
    key: (usize, OpId),
    outermost: bool,
}

impl ReentryGuard {
    fn enter(state: &Arc<ObjState>, op: &OpId) -> Self {
        let key = (Arc::as_ptr(state) as usize, op.clone());
        let depth = LEDGER.with(|ledger| {
            let mut ledger = ledger.borrow_mut();
            let depth = ledger.entry(key.clone()).or_insert(0);
            *depth += 1;
            *depth
        });
        Self {
            key,
            outermost: depth == 1,
        }
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        LEDGER.with(|ledger| {
            let mut ledger = ledger.borrow_mut();
            if let Some(depth) = ledger.get_mut(&self.key) {
                *depth -= 1;
                if *depth == 0 {
                    ledger.remove(&self.key);
                }
            }
        });
    }
}

enum HookSnapshot {
    None,
    Plain(Vec<PlainHookFn>),
    WithArg(Vec<ArgHookFn>),
}

impl Engine {
    /// Run one intercepted invocation.
    ///
    /// `call_original` executes the implementation captured when the
    /// trampoline was installed; the engine invokes it zero or one times.
    pub(crate) fn invoke(
        &self,
        obj: &ObjRef,
        op: &OpId,
        arg: Option<&Value>,
        call_original: &dyn Fn(),
    ) {
        let Some(state) = state::existing_state(obj) else {
            // Interception state already torn down (a benign race with
            // object destruction or cancellation), not an error.
            call_original();
            return;
        };

        let guard = ReentryGuard::enter(&state, op);
        if !guard.outermost {
            call_original();
            return;
        }

        // Snapshot the ordered list under the state lock; hooks themselves
        // run outside every lock.
        let snapshot = {
            let inner = state.lock();
            if let Some(entries) = inner.plain.get(op).filter(|entries| !entries.is_empty()) {
                HookSnapshot::Plain(entries.iter().map(|e| e.hook.clone()).collect())
            } else if let Some(entries) =
                inner.with_arg.get(op).filter(|entries| !entries.is_empty())
            {
                HookSnapshot::WithArg(entries.iter().map(|e| e.hook.clone()).collect())
            } else {
                HookSnapshot::None
            }
        };

        match snapshot {
            HookSnapshot::None => call_original(),
            HookSnapshot::Plain(hooks) => {
                let invocation = Invocation::new(obj, op, arg, call_original);
                for hook in &hooks {
                    hook(&invocation);
                }
            }
            HookSnapshot::WithArg(hooks) => {
                let Some(arg) = arg else {
                    tracing::error!(
                        op = %op,
                        "single-argument hooks reached without an argument; running original"
                    );
                    call_original();
                    return;
                };
                let invocation = Invocation::new(obj, op, Some(arg), call_original);
                for hook in &hooks {
                    hook(&invocation, arg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_call_original_is_at_most_once() {
        let runtime = graft_core::Runtime::new();
        let class = runtime.define_class("Widget", None).expect("fresh runtime");
        let obj = runtime.instantiate(&class);
        let op: OpId = "tick".into();

        let runs = AtomicUsize::new(0);
        let original = || {
            runs.fetch_add(1, Ordering::SeqCst);
        };
        let invocation = Invocation::new(&obj, &op, None, &original);

        assert!(!invocation.original_called());
        invocation.call_original();
        invocation.call_original();
        invocation.call_original();
        assert!(invocation.original_called());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
