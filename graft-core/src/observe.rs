//! Operation observation via dispatch-identity rewriting.
//!
//! This is the *external rewriter* the interception engine must coexist
//! with: an independent consumer of the same per-instance dispatch-identity
//! primitive. Observing an operation on an instance rewrites the instance to
//! a synthetic subclass that forwards the operation to the class beneath and
//! then reports the change to the observer's callback.
//!
//! Other dispatch-rewriting systems interoperate with this one through three
//! narrow surfaces, all here:
//!
//! - the marker convention ([`OBSERVING_PREFIX`], [`is_observing_class`]);
//! - [`class_beneath`], resolving the class an observation class was
//!   rewriting from;
//! - [`Observer::release`], which hands the dispatch identity back.
//!
//! One observation class exists per observed origin class; forwarding
//! overrides accumulate on it as more operations are observed. Forwarding
//! resolves the implementation beneath *at call time*, so a later rewrite of
//! the class beneath (for example an interception patch) is honored rather
//! than bypassed.

use crate::class::{Class, Imp};
use crate::error::DispatchError;
use crate::instance::{Obj, ObjRef};
use crate::op::{OpId, Shape, Value};
use crate::runtime::Runtime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Name prefix marking observation classes.
pub const OBSERVING_PREFIX: &str = "__observing__";

/// Whether `class` is an observation class (owns the instance's dispatch
/// identity on behalf of this module).
pub fn is_observing_class(class: &Class) -> bool {
    class.name().starts_with(OBSERVING_PREFIX)
}

/// The class an observation class was rewriting from, or `None` when
/// `class` is not an observation class.
pub fn class_beneath(class: &Arc<Class>) -> Option<Arc<Class>> {
    if is_observing_class(class) {
        class.superclass().cloned()
    } else {
        None
    }
}

/// Callback invoked after an observed operation executes. Receives the
/// receiver and the operation's argument, if it had one.
pub type ChangeCallback = Arc<dyn Fn(&ObjRef, Option<&Value>) + Send + Sync>;

/// Handle to one active observation. Dropping the handle does *not* release
/// the observation; call [`Observer::release`].
#[derive(Debug)]
pub struct Observer {
    obj: Weak<Obj>,
    class: Arc<Class>,
    released: AtomicBool,
}

impl Observer {
    /// The observation class this observer installed or joined.
    pub fn observing_class(&self) -> &Arc<Class> {
        &self.class
    }

    /// Release ownership of the instance's dispatch identity.
    ///
    /// Restores the class beneath iff the observation class is still the
    /// instance's outermost identity; when something else has rewritten on
    /// top since, the identity is left alone (it is not ours to revert).
    /// Idempotent, and a no-op once the instance is gone.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(obj) = self.obj.upgrade() else {
            return;
        };
        let current = obj.class();
        if Arc::ptr_eq(&current, &self.class)
            && let Some(beneath) = self.class.superclass()
        {
            obj.set_class(beneath.clone());
        }
    }
}

/// Observe `op` on `obj`.
///
/// Rewrites the instance's dispatch identity to the origin's observation
/// class, installing a forwarding override for `op` that runs the
/// implementation beneath and then `callback`.
pub fn observe(
    runtime: &Runtime,
    obj: &ObjRef,
    op: &OpId,
    callback: impl Fn(&ObjRef, Option<&Value>) + Send + Sync + 'static,
) -> Result<Observer, DispatchError> {
    let current = obj.class();
    let (watch, beneath) = match class_beneath(&current) {
        // Already ours: add the new override to the existing class.
        Some(beneath) => (current.clone(), beneath),
        None => {
            let name = format!("{OBSERVING_PREFIX}{}", current.name());
            let beneath = current.clone();
            let watch = runtime.ensure_class_with(&name, {
                let beneath = beneath.clone();
                let name = name.clone();
                move || Class::new(name, Some(beneath))
            });
            (watch, beneath)
        }
    };

    let imp = beneath
        .resolve(op)
        .ok_or_else(|| DispatchError::UnknownOperation {
            op: op.clone(),
            class: beneath.name().to_string(),
        })?;
    let Some(shape) = imp.shape() else {
        return Err(DispatchError::NotObservable(op.clone()));
    };

    watch.define_method(
        op.clone(),
        forwarding_imp(beneath, op.clone(), shape, Arc::new(callback)),
    );
    if !Arc::ptr_eq(&current, &watch) {
        obj.set_class(watch.clone());
    }

    Ok(Observer {
        obj: Arc::downgrade(obj),
        class: watch,
        released: AtomicBool::new(false),
    })
}

/// Build the forwarding override for one observed operation.
///
/// Resolution of the implementation beneath happens per call, not at install
/// time, so rewrites of the class beneath stay visible.
fn forwarding_imp(beneath: Arc<Class>, op: OpId, shape: Shape, callback: ChangeCallback) -> Imp {
    match shape {
        Shape::NoArg => Imp::NoArg(Arc::new(move |recv| {
            if let Some(Imp::NoArg(f)) = beneath.resolve(&op) {
                f(recv);
            }
            callback(recv, None);
        })),
        Shape::Int => Imp::Int(Arc::new(move |recv, value| {
            if let Some(Imp::Int(f)) = beneath.resolve(&op) {
                f(recv, value);
            }
            callback(recv, Some(&Value::Int(value)));
        })),
        Shape::Size => Imp::Size(Arc::new(move |recv, value| {
            if let Some(Imp::Size(f)) = beneath.resolve(&op) {
                f(recv, value);
            }
            callback(recv, Some(&Value::Size(value)));
        })),
        Shape::Rect => Imp::Rect(Arc::new(move |recv, value| {
            if let Some(Imp::Rect(f)) = beneath.resolve(&op) {
                f(recv, value);
            }
            callback(recv, Some(&Value::Rect(value)));
        })),
        Shape::Obj => Imp::Obj(Arc::new(move |recv, peer| {
            if let Some(Imp::Obj(f)) = beneath.resolve(&op) {
                f(recv, peer);
            }
            callback(recv, Some(&Value::Obj(peer.clone())));
        })),
    }
}
