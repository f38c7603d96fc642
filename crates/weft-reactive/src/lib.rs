#![forbid(unsafe_code)]

//! Reactive state for weft.
//!
//! This crate provides the change-tracking primitives the binding engine is
//! built on:
//!
//! - [`Variable`]: a shared, version-tracked value cell with change
//!   notification via subscriber callbacks.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`VarContext`]: a named collection of variables, the data scope an
//!   element's expressions resolve against.
//!
//! # Architecture
//!
//! `Variable` uses `Rc<RefCell<..>>` for single-threaded shared ownership.
//! Subscribers are stored as `Weak` function pointers and cleaned up lazily
//! during notification. `VarContext` is itself a shared handle, so an
//! element scope and the source context can alias the same variables.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value;
//!    the comparison is the deep structural equality of `Value`.
//! 2. Subscribers are notified synchronously, in registration order, on the
//!    caller's stack.
//! 3. Setting a value structurally equal to the current value is a no-op
//!    (no version bump, no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. Re-entrant `set` calls are permitted; runaway cascades are cut off at
//!    [`MAX_CASCADE_DEPTH`] per variable.

pub mod context;
pub mod variable;

pub use context::{ContextError, VarContext};
pub use variable::{MAX_CASCADE_DEPTH, Subscription, Variable};
