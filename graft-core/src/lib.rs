//! # graft-core
//!
//! The dynamic object model underpinning the `graft` interception engine.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! anything that needs the object world without the interception machinery.
//!
//! # Model
//!
//! - [`Class`] - a named, mutable dispatch table with superclass chaining.
//! - [`Obj`] - an instance whose *dispatch identity* (its current class) can
//!   be reassigned atomically at runtime. Every message send resolves from
//!   the current identity, which is the indirection all dispatch-rewriting
//!   consumers build on.
//! - [`Runtime`] - explicit handle owning one class registry; no ambient
//!   global state.
//! - [`OpId`] / [`Shape`] / [`Value`] - operations are named, and declared
//!   with one of a closed set of signature shapes.
//! - [`observe`] - an operation-observation system that rewrites instance
//!   dispatch identities for its own purposes; the reference "external
//!   rewriter" the interception engine interoperates with.
//!
//! # Collaborator surfaces
//!
//! Instances carry two facilities consumers attach lifecycle state to:
//! associated storage ([`Obj::assoc_or_insert_with`]) destroyed together
//! with the object, and destruction notification ([`Obj::on_drop`]) for
//! cleanup that must run even when an owner never cancels explicitly.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod class;
mod error;
mod geom;
mod instance;
mod op;
mod runtime;

pub mod observe;

// Re-exports
pub use class::{Class, Imp};
pub use error::{DispatchError, RuntimeError};
pub use geom::{Rect, Size};
pub use instance::{DropToken, Obj, ObjRef};
pub use op::{OpId, Shape, Value};
pub use runtime::Runtime;
