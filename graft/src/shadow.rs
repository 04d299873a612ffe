//! Shadow classes: the normal interception strategy.
//!
//! When an instance's dispatch identity is not already owned by the external
//! rewriter, interception redirects the instance to a private synthetic
//! subclass of its origin (the *shadow class*) carrying one trampoline per
//! intercepted operation. Shadow classes are created lazily, cached per
//! origin, and never evicted: once built they are permanently reusable for
//! every instance of that origin.
//!
//! A trampoline captures the origin's implementation as resolved at install
//! time and forwards every call into the invocation engine. One distinct
//! constructor arm exists per argument shape, because each shape is a
//! distinct calling convention.

use crate::engine::{Engine, EngineShared};
use crate::error::HookError;
use crate::state::{ObjState, StateInner};
use graft_core::{Class, Imp, ObjRef, OpId, Value};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::{Arc, Weak};

/// Per-engine shadow bookkeeping.
#[derive(Default)]
pub(crate) struct ShadowRegistry {
    /// Shadow class per origin class name. Lazily populated, never evicted.
    classes: Mutex<FxHashMap<String, Arc<Class>>>,
    /// (shadow class identity, operation) pairs already carrying a
    /// trampoline, so installation happens at most once process-wide.
    installed: Mutex<FxHashSet<(usize, OpId)>>,
}

impl Engine {
    /// Whether `class` is one of this engine's shadow classes.
    pub(crate) fn is_shadow_class(&self, class: &Class) -> bool {
        class.name().starts_with(self.shared().shadow_prefix.as_str())
    }

    /// The cached shadow class for an origin, if one was ever created.
    pub(crate) fn shadow_class_for(&self, origin_name: &str) -> Option<Arc<Class>> {
        self.shared().shadows.classes.lock().get(origin_name).cloned()
    }

    /// Fetch or create the shadow class for `origin`. Idempotent.
    pub(crate) fn ensure_shadow_class(&self, origin: &Arc<Class>) -> Arc<Class> {
        let shared = self.shared();
        let mut classes = shared.shadows.classes.lock();
        if let Some(class) = classes.get(origin.name()) {
            return class.clone();
        }
        let name = format!("{}{}", shared.shadow_prefix, origin.name());
        let class = shared.runtime.ensure_class_with(&name, {
            let origin = origin.clone();
            let name = name.clone();
            move || Class::new(name, Some(origin))
        });
        classes.insert(origin.name().to_string(), class.clone());
        tracing::debug!(origin = %origin.name(), shadow = %class.name(), "shadow class ready");
        class
    }

    /// Install the trampoline for `op` on `shadow`, once.
    ///
    /// Captures the origin's current implementation (the patch table is
    /// consulted first, so a shadow stacked over a patched origin never
    /// captures the patch as its "original") and overrides the shadow's
    /// entry with a same-shape trampoline into the invocation engine.
    pub(crate) fn install_trampoline(
        &self,
        shadow: &Arc<Class>,
        origin: &Arc<Class>,
        op: &OpId,
    ) -> Result<(), HookError> {
        let shared = self.shared();
        let key = (Arc::as_ptr(shadow) as usize, op.clone());
        let mut installed = shared.shadows.installed.lock();
        if installed.contains(&key) {
            return Ok(());
        }
        let original = self.resolve_unpatched(origin, op).ok_or_else(|| {
            HookError::Invariant(format!(
                "operation `{op}` vanished from `{}` during trampoline install",
                origin.name()
            ))
        })?;
        let trampoline =
            make_trampoline(Arc::downgrade(shared), op.clone(), original).ok_or_else(|| {
                HookError::Invariant(format!(
                    "operation `{op}` on `{}` lost its hookable shape during install",
                    origin.name()
                ))
            })?;
        shadow.define_method(op.clone(), trampoline);
        installed.insert(key);
        tracing::debug!(op = %op, shadow = %shadow.name(), "trampoline installed");
        Ok(())
    }

    /// Normal-path teardown, run when the object's last hook is cancelled.
    ///
    /// Reverts the dispatch identity to the origin only when it still points
    /// exactly at the expected shadow class. When something else has since
    /// rewritten the identity on top of the shadow, reverting would corrupt
    /// that rewriter's state: the identity is left alone and only the local
    /// bookkeeping is forgotten. Shadow classes and their trampolines always
    /// stay installed; with no state left, they degrade to the original.
    pub(crate) fn revert_shadow_if_unused(
        &self,
        obj: &ObjRef,
        state: &ObjState,
        inner: &StateInner,
    ) {
        if !inner.plain.is_empty() || !inner.with_arg.is_empty() {
            return;
        }
        let origin = state.origin();
        let Some(shadow) = self.shadow_class_for(origin.name()) else {
            return;
        };
        let current = obj.class();
        if Arc::ptr_eq(&current, &shadow) {
            obj.set_class(origin.clone());
            tracing::debug!(origin = %origin.name(), "instance reverted to origin class");
        } else {
            tracing::debug!(
                origin = %origin.name(),
                current = %current.name(),
                "shadow identity stacked on; leaving dispatch identity in place"
            );
        }
    }
}

/// Build a trampoline matching the original's shape. Returns `None` for a
/// getter, which has no hookable shape.
///
/// The trampoline holds the engine weakly; an engine torn down while its
/// trampolines remain installed degrades to calling the captured original.
pub(crate) fn make_trampoline(
    engine: Weak<EngineShared>,
    op: OpId,
    original: Imp,
) -> Option<Imp> {
    match original {
        Imp::NoArg(f) => Some(Imp::NoArg(Arc::new(move |recv| match engine.upgrade() {
            Some(shared) => {
                Engine::from_shared(shared).invoke(recv, &op, None, &|| f(recv));
            }
            None => f(recv),
        }))),
        Imp::Int(f) => Some(Imp::Int(Arc::new(move |recv, value| {
            match engine.upgrade() {
                Some(shared) => {
                    let arg = Value::Int(value);
                    Engine::from_shared(shared).invoke(recv, &op, Some(&arg), &|| f(recv, value));
                }
                None => f(recv, value),
            }
        }))),
        Imp::Size(f) => Some(Imp::Size(Arc::new(move |recv, value| {
            match engine.upgrade() {
                Some(shared) => {
                    let arg = Value::Size(value);
                    Engine::from_shared(shared).invoke(recv, &op, Some(&arg), &|| f(recv, value));
                }
                None => f(recv, value),
            }
        }))),
        Imp::Rect(f) => Some(Imp::Rect(Arc::new(move |recv, value| {
            match engine.upgrade() {
                Some(shared) => {
                    let arg = Value::Rect(value);
                    Engine::from_shared(shared).invoke(recv, &op, Some(&arg), &|| f(recv, value));
                }
                None => f(recv, value),
            }
        }))),
        Imp::Obj(f) => Some(Imp::Obj(Arc::new(move |recv, peer| {
            match engine.upgrade() {
                Some(shared) => {
                    let arg = Value::Obj(peer.clone());
                    Engine::from_shared(shared).invoke(recv, &op, Some(&arg), &|| f(recv, peer));
                }
                None => f(recv, peer),
            }
        }))),
        Imp::Getter(_) => None,
    }
}
