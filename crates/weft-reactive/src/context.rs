#![forbid(unsafe_code)]

//! Named variable scopes.
//!
//! A [`VarContext`] maps names to [`Variable`] cells. The source context
//! owns the application's data; element scopes start empty and alias
//! variables from the source on demand via
//! [`add_if_absent`](VarContext::add_if_absent), so a scope only ever sees
//! the names its expressions actually reference.
//!
//! Contexts are cheap-clone shared handles, and aliased entries share the
//! underlying cell: a write through either context notifies both sides'
//! subscribers (there is only one set of subscribers per cell).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;
use weft_core::Value;

use crate::variable::{Subscription, Variable};

/// Errors from operations that require a name to be present.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },
}

/// A named collection of reactive variables.
///
/// Cloning a `VarContext` creates a new handle to the **same** scope.
#[derive(Clone, Default)]
pub struct VarContext {
    inner: Rc<RefCell<IndexMap<String, Variable>>>,
}

impl VarContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context pre-populated from `(name, value)` pairs.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let ctx = Self::new();
        for (name, value) in entries {
            ctx.define(name, value);
        }
        ctx
    }

    /// Create a variable under `name` and return a handle to it. An
    /// existing binding under the same name is replaced; its cell lives on
    /// only through handles that already alias it.
    pub fn define(&self, name: impl Into<String>, value: Value) -> Variable {
        let variable = Variable::new(value);
        self.inner
            .borrow_mut()
            .insert(name.into(), variable.clone());
        variable
    }

    /// Handle to the named variable, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Variable> {
        self.inner.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.borrow().contains_key(name)
    }

    /// Write through to an existing variable.
    pub fn set(&self, name: &str, value: Value) -> Result<(), ContextError> {
        let variable = self.get(name).ok_or_else(|| ContextError::UnknownVariable {
            name: name.to_string(),
        })?;
        variable.set(value);
        Ok(())
    }

    /// Subscribe a listener to the named variable.
    pub fn subscribe(
        &self,
        name: &str,
        listener: impl Fn(&Value) + 'static,
        immediate: bool,
    ) -> Result<Subscription, ContextError> {
        let variable = self.get(name).ok_or_else(|| ContextError::UnknownVariable {
            name: name.to_string(),
        })?;
        Ok(variable.subscribe(listener, immediate))
    }

    /// Alias `variable` under `name` unless the name is already bound.
    /// Returns whether the entry was added. Idempotent: repeating the call
    /// leaves the first binding in place.
    pub fn add_if_absent(&self, name: impl Into<String>, variable: &Variable) -> bool {
        let name = name.into();
        let mut inner = self.inner.borrow_mut();
        if inner.contains_key(&name) {
            return false;
        }
        inner.insert(name, variable.clone());
        true
    }

    /// Names in definition order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Snapshot of every variable's current value, in definition order.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.inner
            .borrow()
            .iter()
            .map(|(name, var)| (name.clone(), var.get()))
            .collect()
    }
}

impl fmt::Debug for VarContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VarContext")
            .field("names", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
