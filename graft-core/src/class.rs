//! Classes: named, mutable dispatch tables.
//!
//! A [`Class`] owns a method table mapping operation identifiers to
//! shape-tagged implementations ([`Imp`]). Resolution walks the superclass
//! chain, so a synthetic subclass overriding one operation inherits the rest
//! unchanged. This explicit indirection is what allows an instance's dispatch
//! identity to be substituted at runtime: redirecting the instance to a
//! subclass changes where resolution starts, nothing else.
//!
//! # Concurrency
//!
//! Method tables are `RwLock`-protected; implementations are `Arc`-shared and
//! cloned out of the table before being called, so the lock is never held
//! across user code.

use crate::geom::{Rect, Size};
use crate::instance::ObjRef;
use crate::op::{OpId, Shape, Value};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// A shape-tagged operation implementation.
///
/// One variant per calling convention. [`Imp::Getter`] is a value-returning
/// implementation: it participates in dispatch but is not hookable.
#[derive(Clone)]
pub enum Imp {
    /// Zero-argument implementation.
    NoArg(Arc<dyn Fn(&ObjRef) + Send + Sync>),
    /// Single `i64` argument.
    Int(Arc<dyn Fn(&ObjRef, i64) + Send + Sync>),
    /// Single [`Size`] argument.
    Size(Arc<dyn Fn(&ObjRef, Size) + Send + Sync>),
    /// Single [`Rect`] argument.
    Rect(Arc<dyn Fn(&ObjRef, Rect) + Send + Sync>),
    /// Single object-reference argument.
    Obj(Arc<dyn Fn(&ObjRef, &ObjRef) + Send + Sync>),
    /// Value-returning implementation (not hookable).
    Getter(Arc<dyn Fn(&ObjRef) -> Value + Send + Sync>),
}

impl Imp {
    /// The hookable shape of this implementation, or `None` for getters.
    pub fn shape(&self) -> Option<Shape> {
        match self {
            Imp::NoArg(_) => Some(Shape::NoArg),
            Imp::Int(_) => Some(Shape::Int),
            Imp::Size(_) => Some(Shape::Size),
            Imp::Rect(_) => Some(Shape::Rect),
            Imp::Obj(_) => Some(Shape::Obj),
            Imp::Getter(_) => None,
        }
    }

    /// Human-readable shape name, used in diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self.shape() {
            Some(shape) => shape.name(),
            None => "getter",
        }
    }
}

impl fmt::Debug for Imp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Imp({})", self.shape_name())
    }
}

/// A named dispatch table with an optional superclass.
pub struct Class {
    name: String,
    superclass: Option<Arc<Class>>,
    methods: RwLock<FxHashMap<OpId, Imp>>,
}

impl Class {
    /// Create a class. The result is immediately shareable; registering it
    /// with a [`Runtime`](crate::Runtime) makes it discoverable by name.
    pub fn new(name: impl Into<String>, superclass: Option<Arc<Class>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            superclass,
            methods: RwLock::new(FxHashMap::default()),
        })
    }

    /// The class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The direct superclass, if any.
    pub fn superclass(&self) -> Option<&Arc<Class>> {
        self.superclass.as_ref()
    }

    /// Define (or redefine) an operation on this class's own table.
    pub fn define_method(&self, op: OpId, imp: Imp) {
        self.methods.write().insert(op, imp);
    }

    /// Look up an operation in this class's own table only.
    pub fn local_method(&self, op: &OpId) -> Option<Imp> {
        self.methods.read().get(op).cloned()
    }

    /// Resolve an operation through the superclass chain.
    pub fn resolve(&self, op: &OpId) -> Option<Imp> {
        if let Some(imp) = self.local_method(op) {
            return Some(imp);
        }
        let mut current = self.superclass.clone();
        while let Some(class) = current {
            if let Some(imp) = class.local_method(op) {
                return Some(imp);
            }
            current = class.superclass.clone();
        }
        None
    }

    /// Replace this class's own table entry for an operation, returning the
    /// previous local entry. Returns `None` when the operation was inherited
    /// or absent; restoration must then remove the entry rather than
    /// reinstall one.
    pub fn replace_local_method(&self, op: OpId, imp: Imp) -> Option<Imp> {
        self.methods.write().insert(op, imp)
    }

    /// Remove this class's own table entry for an operation.
    pub fn remove_local_method(&self, op: &OpId) -> Option<Imp> {
        self.methods.write().remove(op)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.superclass {
            Some(superclass) => write!(f, "Class({} : {})", self.name, superclass.name),
            None => write!(f, "Class({})", self.name),
        }
    }
}
