#![forbid(unsafe_code)]

//! The directive registry.
//!
//! A [`DirectiveRegistry`] owns a set of directive definitions:
//! append-only, uniqueness enforced case-insensitively, names validated
//! against the letters-only grammar. It is an explicit object — whatever
//! composes handlers holds a reference to one rather than reaching into
//! ambient global state, so tests and embedders can run isolated
//! registries side by side.

use std::fmt;
use std::rc::Rc;

use ahash::RandomState;
use indexmap::IndexMap;
use tracing::debug;

use crate::builtins;
use crate::directive::{Directive, DirectiveError, is_valid_name};

/// Append-only table of directive name → definition.
///
/// Lookups are case-insensitive: `get("CLASS")` and `get("class")` find
/// the same directive.
#[derive(Default)]
pub struct DirectiveRegistry {
    entries: IndexMap<String, Rc<Directive>, RandomState>,
}

impl DirectiveRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in directives (`class`).
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(builtins::class())
            .expect("builtins cannot collide in an empty registry");
        registry
    }

    /// Add a directive.
    ///
    /// Returns the shared handle under which handlers will see the
    /// directive. Fails when the name is already registered (in any case)
    /// or does not pass the name grammar.
    pub fn register(&mut self, directive: Directive) -> Result<Rc<Directive>, DirectiveError> {
        if !is_valid_name(directive.name()) {
            return Err(DirectiveError::InvalidName {
                name: directive.name().to_string(),
            });
        }
        let key = directive.name().to_ascii_lowercase();
        if self.entries.contains_key(&key) {
            return Err(DirectiveError::Duplicate {
                name: directive.name().to_string(),
            });
        }
        debug!(name = key.as_str(), "directive registered");
        let shared = Rc::new(directive);
        self.entries.insert(key, Rc::clone(&shared));
        Ok(shared)
    }

    /// Shared handle to the named directive, if registered.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<Directive>> {
        self.entries.get(&name.to_ascii_lowercase()).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names (lowercased) in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("names", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
