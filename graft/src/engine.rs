//! The interception engine context.
//!
//! An [`Engine`] owns every process-wide registry the interception system
//! needs: the shadow-class cache, the trampoline installed-pair set, and the
//! origin-patch table with its reference counts. There is no ambient global
//! state; independent engines (and tests) do not cross-contaminate.
//!
//! # Lock discipline
//!
//! One mutex per registry, held only for the map mutation it protects and
//! never across calls into user hook code. Multi-step transitions take the
//! per-object state lock first, then whichever registry lock they need.

use crate::error::HookError;
use crate::interop::PatchRegistry;
use crate::invoke::Invocation;
use crate::shadow::ShadowRegistry;
use crate::state::{self, ArgEntry, PlainEntry};
use crate::token::HookToken;
use graft_core::{Class, ObjRef, OpId, Runtime, Shape, Value, observe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default name prefix for shadow classes.
pub const DEFAULT_SHADOW_PREFIX: &str = "__grafted__";

/// Registries and configuration shared by all clones of one engine.
pub(crate) struct EngineShared {
    pub(crate) runtime: Runtime,
    pub(crate) shadow_prefix: String,
    pub(crate) shadows: ShadowRegistry,
    pub(crate) patches: PatchRegistry,
    next_hook_id: AtomicU64,
}

/// Per-instance dynamic-dispatch interception engine.
///
/// Clones share the same registries. Registration attaches hooks to a named
/// operation on a single object instance; invocations of that operation then
/// run the hooks in registration order, with the original implementation
/// executing at most once per invocation.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Engine::new(runtime.clone());
/// let token = engine.hook(&obj, &"tick".into(), |inv| {
///     inv.call_original();
/// });
/// obj.send(&"tick".into())?; // hook runs, then the original
/// token.cancel();
/// ```
#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
}

/// Builder for [`Engine`] configuration.
pub struct EngineBuilder {
    shadow_prefix: String,
}

impl EngineBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            shadow_prefix: DEFAULT_SHADOW_PREFIX.to_string(),
        }
    }

    /// Name prefix for shadow classes. Also serves as this engine's marker:
    /// classes carrying the prefix are recognized as its own when resolving
    /// an instance's true origin.
    pub fn shadow_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.shadow_prefix = prefix.into();
        self
    }

    /// Build an engine over `runtime`.
    pub fn build(self, runtime: Runtime) -> Engine {
        Engine {
            shared: Arc::new(EngineShared {
                runtime,
                shadow_prefix: self.shadow_prefix,
                shadows: ShadowRegistry::default(),
                patches: PatchRegistry::default(),
                next_hook_id: AtomicU64::new(1),
            }),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

enum HookFn {
    Plain(state::PlainHookFn),
    WithArg(state::ArgHookFn),
}

impl Engine {
    /// Create an engine with default configuration.
    pub fn new(runtime: Runtime) -> Self {
        EngineBuilder::new().build(runtime)
    }

    /// Start configuring an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The runtime this engine operates on.
    pub fn runtime(&self) -> &Runtime {
        &self.shared.runtime
    }

    pub(crate) fn shared(&self) -> &Arc<EngineShared> {
        &self.shared
    }

    pub(crate) fn from_shared(shared: Arc<EngineShared>) -> Self {
        Self { shared }
    }

    #[cfg(test)]
    pub(crate) fn downgrade_shared(&self) -> std::sync::Weak<EngineShared> {
        Arc::downgrade(&self.shared)
    }

    /// Register a zero-argument hook on `(obj, op)`.
    ///
    /// A failed registration is reported on the diagnostic channel and
    /// returns an inert token (see [`HookToken::rejection`]); it never
    /// installs anything and never unwinds.
    pub fn hook(
        &self,
        obj: &ObjRef,
        op: &OpId,
        callback: impl Fn(&Invocation<'_>) + Send + Sync + 'static,
    ) -> HookToken {
        self.register(obj, op, Shape::NoArg, HookFn::Plain(Arc::new(callback)))
    }

    /// Register a single-argument hook on `(obj, op)` under an explicitly
    /// declared shape, which must match the operation's real signature.
    pub fn hook_with_arg(
        &self,
        obj: &ObjRef,
        op: &OpId,
        shape: Shape,
        callback: impl Fn(&Invocation<'_>, &Value) + Send + Sync + 'static,
    ) -> HookToken {
        self.register(obj, op, shape, HookFn::WithArg(Arc::new(callback)))
    }

    fn register(&self, obj: &ObjRef, op: &OpId, shape: Shape, hook: HookFn) -> HookToken {
        match self.try_register(obj, op, shape, hook) {
            Ok(token) => token,
            Err(error) => {
                tracing::error!(op = %op, obj = ?obj, %error, "hook registration rejected");
                HookToken::rejected(error)
            }
        }
    }

    fn try_register(
        &self,
        obj: &ObjRef,
        op: &OpId,
        shape: Shape,
        hook: HookFn,
    ) -> Result<HookToken, HookError> {
        if matches!(hook, HookFn::WithArg(_)) && shape == Shape::NoArg {
            return Err(HookError::UnsupportedSignature {
                op: op.clone(),
                requested: shape,
                found: "single-argument callback",
            });
        }

        let origin = self.true_origin(obj);
        let imp = self
            .resolve_unpatched(&origin, op)
            .ok_or_else(|| HookError::OperationNotFound {
                op: op.clone(),
                class: origin.name().to_string(),
            })?;

        let state = state::state_for(obj, &origin);
        if !Arc::ptr_eq(state.origin(), &origin) {
            return Err(HookError::Invariant(format!(
                "origin class of {obj:?} drifted from `{}` to `{}`",
                state.origin().name(),
                origin.name()
            )));
        }

        let mut inner = state.lock();
        // The conflict check precedes the signature check: an operation
        // already hooked under the other arity reports the conflict, not a
        // signature mismatch.
        match &hook {
            HookFn::Plain(_) if inner.with_arg.get(op).is_some_and(|l| !l.is_empty()) => {
                return Err(HookError::ShapeConflict {
                    op: op.clone(),
                    existing: "single-argument",
                });
            }
            HookFn::WithArg(_) if inner.plain.get(op).is_some_and(|l| !l.is_empty()) => {
                return Err(HookError::ShapeConflict {
                    op: op.clone(),
                    existing: "zero-argument",
                });
            }
            _ => {}
        }

        let found = imp.shape_name();
        let Some(real_shape) = imp.shape() else {
            return Err(HookError::UnsupportedSignature {
                op: op.clone(),
                requested: shape,
                found,
            });
        };
        if real_shape != shape {
            return Err(HookError::UnsupportedSignature {
                op: op.clone(),
                requested: shape,
                found,
            });
        }

        let first = match &hook {
            HookFn::Plain(_) => inner.plain.get(op).is_none_or(|l| l.is_empty()),
            HookFn::WithArg(_) => inner.with_arg.get(op).is_none_or(|l| l.is_empty()),
        };
        if first {
            let current = obj.class();
            if observe::is_observing_class(&current) {
                // The external rewriter owns the dispatch identity: patch
                // the shared origin class instead of stacking a shadow.
                self.adopt_patch(&origin, op)?;
                inner.patched.insert(op.clone());
                let guard = {
                    let engine = Arc::downgrade(&self.shared);
                    let origin = origin.clone();
                    let op = op.clone();
                    obj.on_drop(move |_| {
                        if let Some(shared) = engine.upgrade() {
                            Engine::from_shared(shared).release_patch(&origin, &op);
                        }
                    })
                };
                inner.drop_guards.insert(op.clone(), guard);
                tracing::debug!(
                    op = %op,
                    class = %origin.name(),
                    "intercepting via origin patch (dispatch identity externally rewritten)"
                );
            } else {
                let shadow = self.ensure_shadow_class(&origin);
                self.install_trampoline(&shadow, &origin, op)?;
                if !Arc::ptr_eq(&current, &shadow) {
                    obj.set_class(shadow.clone());
                }
                tracing::debug!(
                    op = %op,
                    class = %origin.name(),
                    shadow = %shadow.name(),
                    "intercepting via shadow class"
                );
            }
        }

        let id = self.shared.next_hook_id.fetch_add(1, Ordering::SeqCst);
        match hook {
            HookFn::Plain(callback) => inner
                .plain
                .entry(op.clone())
                .or_default()
                .push(PlainEntry { id, hook: callback }),
            HookFn::WithArg(callback) => inner
                .with_arg
                .entry(op.clone())
                .or_default()
                .push(ArgEntry { id, hook: callback }),
        }
        drop(inner);

        tracing::debug!(op = %op, obj = ?obj, id, "hook registered");
        Ok(HookToken::live(
            id,
            op.clone(),
            Arc::downgrade(obj),
            Arc::downgrade(&self.shared),
        ))
    }

    /// The object's true original class: its current dispatch identity with
    /// every marker layer stripped: this engine's shadow prefix and the
    /// observation system's marker alike.
    fn true_origin(&self, obj: &ObjRef) -> Arc<Class> {
        let mut class = obj.class();
        loop {
            if !observe::is_observing_class(&class) && !self.is_shadow_class(&class) {
                return class;
            }
            let Some(beneath) = class.superclass().cloned() else {
                return class;
            };
            class = beneath;
        }
    }

    /// Remove a hook by token id; runs strategy-appropriate teardown when
    /// the operation's list empties. Idempotent: an id already removed (or
    /// never present) is a no-op.
    pub(crate) fn cancel_entry(&self, obj: &ObjRef, op: &OpId, id: u64) {
        let Some(state) = state::existing_state(obj) else {
            return;
        };
        let mut inner = state.lock();

        let mut found = false;
        let mut emptied = false;
        if let Some(entries) = inner.plain.get_mut(op)
            && let Some(pos) = entries.iter().position(|e| e.id == id)
        {
            entries.remove(pos);
            found = true;
            if entries.is_empty() {
                inner.plain.remove(op);
                emptied = true;
            }
        }
        if !found
            && let Some(entries) = inner.with_arg.get_mut(op)
            && let Some(pos) = entries.iter().position(|e| e.id == id)
        {
            entries.remove(pos);
            found = true;
            if entries.is_empty() {
                inner.with_arg.remove(op);
                emptied = true;
            }
        }
        if !found {
            return;
        }

        if emptied {
            if inner.patched.remove(op) {
                if let Some(guard) = inner.drop_guards.remove(op) {
                    obj.cancel_on_drop(guard);
                }
                self.release_patch(state.origin(), op);
            } else {
                self.revert_shadow_if_unused(obj, &state, &inner);
            }
        }
        tracing::debug!(op = %op, id, "hook cancelled");
    }
}
