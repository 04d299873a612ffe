//! # graft - Per-Instance Dynamic-Dispatch Interception
//!
//! `graft` lets independent callers attach hooks to a named operation on a
//! *single object instance*, without touching the operation's original
//! implementation, and stays safe alongside an external dispatch rewriter
//! (the [`graft_core::observe`] observation system) that rewrites the same
//! instances' dispatch identities for its own purposes.
//!
//! # Architecture
//!
//! - **[`HookToken`]** - handle to one registered hook; cancellation is
//!   synchronous and idempotent.
//! - **Per-object state** - one record per intercepted instance, riding the
//!   instance's associated storage: true origin class, ordered hook lists
//!   per operation, interop bookkeeping.
//! - **Invocation engine** - runs hooks in registration order with a shared
//!   at-most-once [`Invocation::call_original`], and a per-thread reentrancy
//!   ledger so a hook re-sending the same operation cannot recurse.
//! - **Shadow classes** - the normal strategy: the instance is redirected to
//!   a cached synthetic subclass carrying one trampoline per intercepted
//!   operation and argument shape.
//! - **External-rewrite interop** - when the observation system already owns
//!   the dispatch identity, the engine patches the shared origin class
//!   instead, reference-counted across every relying instance so the
//!   captured original is restored exactly once.
//!
//! All registries hang off an explicit [`Engine`] context; independent
//! engines do not cross-contaminate.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use graft::{Engine, testing};
//!
//! let (runtime, class, recorder) = testing::widget_fixture();
//! let obj = runtime.instantiate(&class);
//! let engine = Engine::new(runtime.clone());
//!
//! let token = engine.hook(&obj, &"tick".into(), |inv| {
//!     // runs before the original; decide whether the original runs at all
//!     inv.call_original();
//! });
//!
//! obj.send(&"tick".into())?;
//! token.cancel();
//! ```
//!
//! Registration failures ([`HookError`]) are diagnostic-only: they are
//! reported via `tracing` and yield an inert token; the operation keeps
//! behaving exactly as before.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod engine;
mod error;
mod interop;
mod invoke;
mod shadow;
mod state;
mod token;

pub mod testing;

// Re-exports
pub use engine::{DEFAULT_SHADOW_PREFIX, Engine, EngineBuilder};
pub use error::HookError;
pub use invoke::Invocation;
pub use token::HookToken;

// The object model, re-exported for convenience.
pub use graft_core::{
    Class, DispatchError, DropToken, Imp, Obj, ObjRef, OpId, Rect, Runtime, RuntimeError, Shape,
    Size, Value, observe,
};
