//! Object instances with a substitutable dispatch identity.
//!
//! An [`Obj`] does not hardwire its behavior: every message send starts from
//! the instance's *current* class ([`Obj::class`]) and resolves through that
//! class's chain. Swapping the class ([`Obj::set_class`]) is a single atomic
//! reassignment, which is the primitive both the interception engine and the
//! observation system build on.
//!
//! Two collaborator surfaces live here as well:
//!
//! - **Associated storage**: arbitrary `Arc`-shared records keyed by a static
//!   string, created on first access and destroyed together with the object.
//! - **Destruction notification**: callbacks that run exactly once when the
//!   object is dropped, before its associated storage is released. Consumers
//!   that keep process-wide bookkeeping per instance register one of these so
//!   cleanup happens even when the owner never cancels explicitly.

use crate::class::{Class, Imp};
use crate::error::DispatchError;
use crate::geom::{Rect, Size};
use crate::op::{OpId, Shape, Value};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared handle to an object instance.
pub type ObjRef = Arc<Obj>;

/// Handle for a registered destruction observer, used to disarm it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropToken(u64);

struct DropObserver {
    id: u64,
    run: Box<dyn FnOnce(&Obj) + Send>,
}

/// An object instance.
///
/// Identity is the `Arc` allocation (plus a runtime-unique `id` for
/// diagnostics); behavior is whatever the current dispatch identity resolves.
pub struct Obj {
    id: u64,
    class: RwLock<Arc<Class>>,
    assoc: Mutex<FxHashMap<&'static str, Arc<dyn Any + Send + Sync>>>,
    drop_observers: Mutex<Vec<DropObserver>>,
    next_drop_id: AtomicU64,
}

impl Obj {
    pub(crate) fn new(id: u64, class: Arc<Class>) -> ObjRef {
        Arc::new(Self {
            id,
            class: RwLock::new(class),
            assoc: Mutex::new(FxHashMap::default()),
            drop_observers: Mutex::new(Vec::new()),
            next_drop_id: AtomicU64::new(0),
        })
    }

    /// Runtime-unique instance id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The current dispatch identity.
    pub fn class(&self) -> Arc<Class> {
        self.class.read().clone()
    }

    /// Reassign the dispatch identity. A single atomic swap: readers observe
    /// either the old class or the new one, never a partial state.
    pub fn set_class(&self, class: Arc<Class>) {
        *self.class.write() = class;
    }

    // ------------------------------------------------------------------
    // Associated storage
    // ------------------------------------------------------------------

    /// Fetch an associated record.
    pub fn assoc(&self, key: &'static str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.assoc.lock().get(key).cloned()
    }

    /// Fetch an associated record, creating it under the storage lock on
    /// first access. The record lives exactly as long as the object.
    pub fn assoc_or_insert_with(
        &self,
        key: &'static str,
        default: impl FnOnce() -> Arc<dyn Any + Send + Sync>,
    ) -> Arc<dyn Any + Send + Sync> {
        self.assoc.lock().entry(key).or_insert_with(default).clone()
    }

    // ------------------------------------------------------------------
    // Destruction notification
    // ------------------------------------------------------------------

    /// Register a callback to run exactly once when this object is dropped.
    pub fn on_drop(&self, observer: impl FnOnce(&Obj) + Send + 'static) -> DropToken {
        let id = self.next_drop_id.fetch_add(1, Ordering::Relaxed);
        self.drop_observers.lock().push(DropObserver {
            id,
            run: Box::new(observer),
        });
        DropToken(id)
    }

    /// Disarm a destruction observer. Disarming one that already ran or was
    /// already disarmed is a no-op.
    pub fn cancel_on_drop(&self, token: DropToken) {
        self.drop_observers.lock().retain(|o| o.id != token.0);
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn resolve_for(&self, op: &OpId) -> Result<Imp, DispatchError> {
        let class = self.class();
        class.resolve(op).ok_or_else(|| DispatchError::UnknownOperation {
            op: op.clone(),
            class: class.name().to_string(),
        })
    }

    /// Send a zero-argument operation.
    pub fn send(self: &Arc<Self>, op: &OpId) -> Result<(), DispatchError> {
        match self.resolve_for(op)? {
            Imp::NoArg(f) => {
                f(self);
                Ok(())
            }
            other => Err(mismatch(op, Shape::NoArg.name(), &other)),
        }
    }

    /// Send an operation taking an `i64`.
    pub fn send_int(self: &Arc<Self>, op: &OpId, value: i64) -> Result<(), DispatchError> {
        match self.resolve_for(op)? {
            Imp::Int(f) => {
                f(self, value);
                Ok(())
            }
            other => Err(mismatch(op, Shape::Int.name(), &other)),
        }
    }

    /// Send an operation taking a [`Size`].
    pub fn send_size(self: &Arc<Self>, op: &OpId, value: Size) -> Result<(), DispatchError> {
        match self.resolve_for(op)? {
            Imp::Size(f) => {
                f(self, value);
                Ok(())
            }
            other => Err(mismatch(op, Shape::Size.name(), &other)),
        }
    }

    /// Send an operation taking a [`Rect`].
    pub fn send_rect(self: &Arc<Self>, op: &OpId, value: Rect) -> Result<(), DispatchError> {
        match self.resolve_for(op)? {
            Imp::Rect(f) => {
                f(self, value);
                Ok(())
            }
            other => Err(mismatch(op, Shape::Rect.name(), &other)),
        }
    }

    /// Send an operation taking an object reference.
    pub fn send_obj(self: &Arc<Self>, op: &OpId, peer: &ObjRef) -> Result<(), DispatchError> {
        match self.resolve_for(op)? {
            Imp::Obj(f) => {
                f(self, peer);
                Ok(())
            }
            other => Err(mismatch(op, Shape::Obj.name(), &other)),
        }
    }

    /// Evaluate a value-returning operation.
    pub fn get(self: &Arc<Self>, op: &OpId) -> Result<Value, DispatchError> {
        match self.resolve_for(op)? {
            Imp::Getter(f) => Ok(f(self)),
            other => Err(mismatch(op, "getter", &other)),
        }
    }
}

fn mismatch(op: &OpId, sent: &'static str, found: &Imp) -> DispatchError {
    DispatchError::ShapeMismatch {
        op: op.clone(),
        sent,
        found: found.shape_name(),
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Obj#{}({})", self.id, self.class().name())
    }
}

impl Drop for Obj {
    fn drop(&mut self) {
        // Observers run before associated storage is released, so records
        // attached to this object are still reachable while they execute.
        let observers = std::mem::take(self.drop_observers.get_mut());
        for observer in observers {
            (observer.run)(self);
        }
    }
}
