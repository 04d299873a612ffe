//! Error types for hook registration.
//!
//! Every variant is a *reported*, non-fatal failure: a rejected registration
//! is announced on the diagnostic channel and materializes as an inert token
//! ([`crate::HookToken::rejection`]), never as a panic or an unwinding error.
//! The intercepted operation keeps behaving exactly as before.

use graft_core::{OpId, Shape};
use thiserror::Error;

/// Reasons a hook registration is rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HookError {
    /// The operation does not resolve on the object's true original class.
    #[error("operation `{op}` does not resolve on class `{class}`")]
    OperationNotFound {
        /// The unresolvable operation.
        op: OpId,
        /// Name of the true origin class.
        class: String,
    },

    /// The operation's real signature does not match the requested shape, or
    /// is outside the hookable set (value-returning, for instance).
    #[error("operation `{op}` is not hookable as {requested}: its shape is {found}")]
    UnsupportedSignature {
        /// The operation whose signature was checked.
        op: OpId,
        /// Shape the caller requested.
        requested: Shape,
        /// Shape actually found on the class.
        found: &'static str,
    },

    /// The operation already carries hooks registered under the other arity
    /// on this object.
    #[error("operation `{op}` already has {existing} hooks registered")]
    ShapeConflict {
        /// The contested operation.
        op: OpId,
        /// Arity of the hooks already registered.
        existing: &'static str,
    },

    /// Environment corruption: a condition proven impossible moments earlier
    /// stopped holding. Reported loudly, still non-fatal.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}
