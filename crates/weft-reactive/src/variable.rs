#![forbid(unsafe_code)]

//! The reactive value cell and its subscription guard.
//!
//! # Design
//!
//! [`Variable`] wraps a [`Value`] in shared, reference-counted storage.
//! Subscribers register callbacks that fire synchronously whenever the
//! stored value actually changes; a `set` with a structurally equal value
//! does nothing. Callback storage is `Weak`, so a listener lives exactly as
//! long as the [`Subscription`] returned when it was registered.
//!
//! # Invariants
//!
//! 1. `version()` increments exactly once per `set` that changes the value.
//! 2. Listeners run in registration order, on the caller's stack.
//! 3. A listener registered during a notification cycle is not called in
//!    that cycle; one unsubscribed during a cycle may still be called in it.
//! 4. `set` inside a listener is allowed. Each variable tracks its
//!    notification depth and stops notifying past [`MAX_CASCADE_DEPTH`];
//!    the value itself is still stored.
//!
//! # Failure Modes
//!
//! - **Cascade overflow**: mutually-triggering listeners that keep producing
//!   new values bottom out at the depth cap; the final `set` stores its
//!   value, skips listeners, and logs an error.
//! - **Listener drops its own subscription**: safe; the callback is kept
//!   alive for the remainder of the current cycle and removed afterwards.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{error, trace};
use weft_core::Value;

/// Depth cap for re-entrant notification cascades on one variable.
pub const MAX_CASCADE_DEPTH: u32 = 64;

type SubscriberFn = dyn Fn(&Value);

struct VarState {
    value: Value,
    /// Bumped once per value-changing `set`.
    version: u64,
    /// Weak handles; pruned during notification.
    subscribers: Vec<Weak<SubscriberFn>>,
}

struct VarShared {
    state: RefCell<VarState>,
    /// Current notification depth, for the cascade guard.
    depth: Cell<u32>,
}

/// A shared, version-tracked reactive value cell.
///
/// Cloning a `Variable` creates a new handle to the **same** cell. This is
/// what lets an element scope alias a variable owned by the source context:
/// both see every write.
#[derive(Clone)]
pub struct Variable {
    shared: Rc<VarShared>,
}

/// RAII guard for a registered listener.
///
/// The listener stays registered for exactly as long as this guard is held.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    _callback: Rc<SubscriberFn>,
}

impl Variable {
    pub fn new(value: Value) -> Self {
        Self {
            shared: Rc::new(VarShared {
                state: RefCell::new(VarState {
                    value,
                    version: 0,
                    subscribers: Vec::new(),
                }),
                depth: Cell::new(0),
            }),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> Value {
        self.shared.state.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(&self.shared.state.borrow().value)
    }

    /// Store a new value and notify subscribers if it differs from the
    /// current one. Structural equality decides "differs": a new list or
    /// map with the same contents does not notify.
    pub fn set(&self, value: Value) {
        let callbacks = {
            let mut state = self.shared.state.borrow_mut();
            if state.value == value {
                trace!(version = state.version, "set skipped: value unchanged");
                return;
            }
            state.value = value.clone();
            state.version += 1;

            // Prune dead listeners and snapshot the live ones. The borrow
            // is released before any callback runs, so listeners may read
            // or write this variable freely.
            let mut live = Vec::with_capacity(state.subscribers.len());
            state.subscribers.retain(|weak| match weak.upgrade() {
                Some(cb) => {
                    live.push(cb);
                    true
                }
                None => false,
            });
            live
        };

        if callbacks.is_empty() {
            return;
        }
        let depth = self.shared.depth.get();
        if depth >= MAX_CASCADE_DEPTH {
            error!(
                depth,
                cap = MAX_CASCADE_DEPTH,
                "notification cascade depth exceeded; value stored, listeners skipped"
            );
            return;
        }
        self.shared.depth.set(depth + 1);
        for cb in &callbacks {
            cb(&value);
        }
        self.shared.depth.set(depth);
    }

    /// Register a listener.
    ///
    /// With `immediate` the listener is additionally invoked once with the
    /// current value, synchronously, before this call returns.
    pub fn subscribe(&self, listener: impl Fn(&Value) + 'static, immediate: bool) -> Subscription {
        let callback: Rc<SubscriberFn> = Rc::new(listener);
        self.shared
            .state
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&callback));
        trace!(immediate, "listener subscribed");
        if immediate {
            let current = self.get();
            callback(&current);
        }
        Subscription {
            _callback: callback,
        }
    }

    /// Number of value-changing mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.shared.state.borrow().version
    }

    /// Count of currently live listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared
            .state
            .borrow()
            .subscribers
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Whether two handles refer to the same cell.
    #[must_use]
    pub fn same_cell(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Default for Variable {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Variable")
            .field("value", &state.value)
            .field("version", &state.version)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Subscription")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
