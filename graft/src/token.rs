//! Cancellation tokens for registered hooks.

use crate::engine::{Engine, EngineShared};
use crate::error::HookError;
use graft_core::{Obj, OpId};
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle to one registered hook.
///
/// Cancellation is synchronous and idempotent: cancelling twice, cancelling
/// after the object was destroyed, or cancelling a token from a rejected
/// registration is always a safe no-op.
#[derive(Debug)]
pub struct HookToken {
    inner: TokenInner,
}

#[derive(Debug)]
enum TokenInner {
    /// Registration was rejected (or the token is otherwise inert); carries
    /// the reported error, if any.
    Inert(Option<HookError>),
    Live(LiveToken),
}

#[derive(Debug)]
struct LiveToken {
    id: u64,
    op: OpId,
    obj: Weak<Obj>,
    engine: Weak<EngineShared>,
    cancelled: AtomicBool,
}

impl HookToken {
    pub(crate) fn live(id: u64, op: OpId, obj: Weak<Obj>, engine: Weak<EngineShared>) -> Self {
        Self {
            inner: TokenInner::Live(LiveToken {
                id,
                op,
                obj,
                engine,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn rejected(error: HookError) -> Self {
        Self {
            inner: TokenInner::Inert(Some(error)),
        }
    }

    /// Remove the hook this token registered.
    pub fn cancel(&self) {
        let TokenInner::Live(token) = &self.inner else {
            return;
        };
        if token.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        // Object or engine already gone: their teardown paths have run (or
        // will); nothing left to remove.
        let (Some(obj), Some(shared)) = (token.obj.upgrade(), token.engine.upgrade()) else {
            return;
        };
        Engine::from_shared(shared).cancel_entry(&obj, &token.op, token.id);
    }

    /// Whether this token still holds a registered hook: registration
    /// succeeded, the object is alive, and `cancel` has not run.
    pub fn is_active(&self) -> bool {
        match &self.inner {
            TokenInner::Inert(_) => false,
            TokenInner::Live(token) => {
                !token.cancelled.load(Ordering::SeqCst) && token.obj.strong_count() > 0
            }
        }
    }

    /// The error a rejected registration reported, if this token is inert.
    pub fn rejection(&self) -> Option<&HookError> {
        match &self.inner {
            TokenInner::Inert(error) => error.as_ref(),
            TokenInner::Live(_) => None,
        }
    }
}
