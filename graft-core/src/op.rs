//! Operation identifiers, argument shapes, and argument payloads.
//!
//! Every dispatchable operation is named by an [`OpId`] and declared with one
//! of a closed set of signatures ([`Shape`]). The closed set is deliberate:
//! each shape corresponds to a distinct low-level calling convention, and the
//! interception engine installs a distinct trampoline per shape. Signature
//! discovery is a compile-time tagged enum, never runtime string inspection.

use crate::geom::{Rect, Size};
use crate::instance::ObjRef;
use std::fmt;
use std::sync::Arc;

/// Interned name of a dispatchable operation.
///
/// Cloning is O(1) (reference-count bump), so an `OpId` can be used freely as
/// a map key across registries and thread-local ledgers.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OpId(Arc<str>);

impl OpId {
    /// Create an operation identifier from a name.
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    /// The operation name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OpId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for OpId {
    fn from(name: String) -> Self {
        Self(Arc::from(name.as_str()))
    }
}

impl From<&OpId> for OpId {
    fn from(op: &OpId) -> Self {
        op.clone()
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpId({})", self.0)
    }
}

/// The closed set of hookable operation signatures.
///
/// An operation either takes no argument or exactly one argument of a
/// supported value shape. Operations outside this set (value-returning
/// getters, higher arities) exist in the object model but cannot be
/// intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// No argument.
    NoArg,
    /// A single `i64` argument.
    Int,
    /// A single [`Size`] argument.
    Size,
    /// A single [`Rect`] argument.
    Rect,
    /// A single object-reference argument.
    Obj,
}

impl Shape {
    /// Human-readable name, used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Shape::NoArg => "zero-argument",
            Shape::Int => "int",
            Shape::Size => "size",
            Shape::Rect => "rect",
            Shape::Obj => "object",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single-argument payload, tagged by shape.
#[derive(Debug, Clone)]
pub enum Value {
    /// An integer payload.
    Int(i64),
    /// A 2D size payload.
    Size(Size),
    /// A 2D rectangle payload.
    Rect(Rect),
    /// An object-reference payload.
    Obj(ObjRef),
}

impl Value {
    /// The shape this payload belongs to.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Int(_) => Shape::Int,
            Value::Size(_) => Shape::Size,
            Value::Rect(_) => Shape::Rect,
            Value::Obj(_) => Shape::Obj,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Size(a), Value::Size(b)) => a == b,
            (Value::Rect(a), Value::Rect(b)) => a == b,
            // Objects compare by identity.
            (Value::Obj(a), Value::Obj(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
