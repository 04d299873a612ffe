//! Error types for the object model.
//!
//! - [`DispatchError`] - a message send could not be delivered
//! - [`RuntimeError`] - class registration failures

use crate::op::OpId;
use thiserror::Error;

/// Errors raised when sending an operation to an object.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The operation does not resolve anywhere on the receiver's class chain.
    #[error("operation `{op}` does not resolve on class `{class}`")]
    UnknownOperation {
        /// The unresolvable operation.
        op: OpId,
        /// Name of the class the resolution started from.
        class: String,
    },

    /// The operation resolved, but its signature does not match the call site.
    #[error("operation `{op}` has {found} shape, sent as {sent}")]
    ShapeMismatch {
        /// The operation that was sent.
        op: OpId,
        /// Shape implied by the call site.
        sent: &'static str,
        /// Shape of the resolved implementation.
        found: &'static str,
    },

    /// The operation exists but cannot carry an observation.
    #[error("operation `{0}` cannot be observed")]
    NotObservable(OpId),
}

/// Errors raised by class registration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A class with this name is already registered.
    #[error("class `{0}` is already defined")]
    ClassAlreadyDefined(String),
}
