//! Interoperation with the external dispatch rewriter.
//!
//! When registration finds the instance's dispatch identity already owned by
//! the observation system, stacking a private shadow class on top is unsafe:
//! releasing the observation later would tear the shadow layer down with it.
//! The engine instead patches the *origin class's* own table entry for the
//! operation, shared by every instance of that origin, observed or not, and
//! reference-counts the patch across the instances relying on it so the
//! captured original can be restored exactly once, when the last reliance
//! ends.
//!
//! The installed-once check and the reference count mutate under a single
//! lock, so concurrent registration and cancellation from instances sharing
//! one origin cannot race the patch into an inconsistent state.

use crate::engine::Engine;
use crate::error::HookError;
use crate::shadow::make_trampoline;
use graft_core::{Class, Imp, OpId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// One live origin-class patch.
struct PatchEntry {
    /// The implementation resolved before patching; what trampolines call
    /// and what restoration brings back.
    original: Imp,
    /// The origin's own table entry before patching. `None` when the
    /// operation was inherited, in which case restoration removes the local
    /// entry instead of reinstalling one.
    prev_local: Option<Imp>,
    /// How many instances currently rely on the patch.
    refs: usize,
}

/// Per-engine patch bookkeeping, keyed by (origin class identity, op).
#[derive(Default)]
pub(crate) struct PatchRegistry {
    entries: Mutex<FxHashMap<(usize, OpId), PatchEntry>>,
}

impl Engine {
    /// Resolve `op` on `class` as it stood before any patch by this engine.
    pub(crate) fn resolve_unpatched(&self, class: &Arc<Class>, op: &OpId) -> Option<Imp> {
        let key = (Arc::as_ptr(class) as usize, op.clone());
        if let Some(entry) = self.shared().patches.entries.lock().get(&key) {
            return Some(entry.original.clone());
        }
        class.resolve(op)
    }

    /// Make one more instance rely on the (origin, op) patch, installing it
    /// first if this is the first reliance.
    pub(crate) fn adopt_patch(&self, origin: &Arc<Class>, op: &OpId) -> Result<(), HookError> {
        let shared = self.shared();
        let key = (Arc::as_ptr(origin) as usize, op.clone());
        let mut entries = shared.patches.entries.lock();
        if let Some(entry) = entries.get_mut(&key) {
            entry.refs += 1;
            return Ok(());
        }

        let original = origin.resolve(op).ok_or_else(|| {
            HookError::Invariant(format!(
                "operation `{op}` vanished from `{}` during patch install",
                origin.name()
            ))
        })?;
        let trampoline = make_trampoline(Arc::downgrade(shared), op.clone(), original.clone())
            .ok_or_else(|| {
                HookError::Invariant(format!(
                    "operation `{op}` on `{}` lost its hookable shape during patch install",
                    origin.name()
                ))
            })?;
        let prev_local = origin.replace_local_method(op.clone(), trampoline);
        entries.insert(
            key,
            PatchEntry {
                original,
                prev_local,
                refs: 1,
            },
        );
        tracing::debug!(op = %op, class = %origin.name(), "origin class patched");
        Ok(())
    }

    /// One instance stopped relying on the (origin, op) patch: its hook
    /// list emptied, or it was destroyed. Restores the original at zero.
    /// Calling without a live patch is a no-op, so the explicit-cancel and
    /// destruction paths cannot double-decrement.
    pub(crate) fn release_patch(&self, origin: &Arc<Class>, op: &OpId) {
        let key = (Arc::as_ptr(origin) as usize, op.clone());
        let mut entries = self.shared().patches.entries.lock();
        let Some(entry) = entries.get_mut(&key) else {
            return;
        };
        entry.refs -= 1;
        if entry.refs > 0 {
            return;
        }
        if let Some(entry) = entries.remove(&key) {
            match entry.prev_local {
                Some(imp) => {
                    origin.replace_local_method(op.clone(), imp);
                }
                None => {
                    origin.remove_local_method(op);
                }
            }
            tracing::debug!(op = %op, class = %origin.name(), "origin class restored");
        }
    }
}
