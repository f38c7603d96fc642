#![forbid(unsafe_code)]

//! Memoized parsing.
//!
//! Binding attributes repeat heavily across a tree (`@class:active="..."`
//! on every row of a list, say), so the parser front-end is backed by a
//! string-keyed cache. Presence of an entry decides a hit; only successful
//! parses are stored, so a present entry is always a valid one. Failures
//! are re-parsed on every call, which keeps the error path simple and the
//! cache free of tombstones.
//!
//! Cloning an [`ExprCache`] creates a new handle to the **same** store, so
//! a binder and its handlers can share one cache without threading
//! references through every call.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::trace;

use crate::parse::{ParseError, ParsedExpr, parse};

/// Shared parse cache, keyed by the raw expression string.
#[derive(Clone, Default)]
pub struct ExprCache {
    inner: Rc<RefCell<AHashMap<String, Rc<ParsedExpr>>>>,
}

impl ExprCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `src`, returning the cached result when one exists.
    ///
    /// The same source string always yields the same [`Rc`], so callers
    /// holding results from earlier calls share structure with later ones.
    pub fn parse(&self, src: &str) -> Result<Rc<ParsedExpr>, ParseError> {
        if let Some(hit) = self.inner.borrow().get(src) {
            return Ok(Rc::clone(hit));
        }
        let parsed = Rc::new(parse(src)?);
        trace!(src, "expression cached");
        self.inner
            .borrow_mut()
            .insert(src.to_string(), Rc::clone(&parsed));
        Ok(parsed)
    }

    /// Whether `src` has been parsed and stored.
    #[must_use]
    pub fn contains(&self, src: &str) -> bool {
        self.inner.borrow().contains_key(src)
    }

    /// Number of cached expressions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }
}

impl fmt::Debug for ExprCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExprCache")
            .field("len", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_parses_share_one_result() {
        let cache = ExprCache::new();
        let first = cache.parse("user.name").unwrap();
        let second = cache.parse("user.name").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_not_stored() {
        let cache = ExprCache::new();
        assert!(cache.parse("user.").is_err());
        assert!(cache.parse("user.").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn clones_share_the_same_store() {
        let cache = ExprCache::new();
        let handle = cache.clone();
        handle.parse("items").unwrap();
        assert!(cache.contains("items"));
    }

    #[test]
    fn clear_empties_the_store() {
        let cache = ExprCache::new();
        cache.parse("a").unwrap();
        cache.parse("b.c").unwrap();
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.contains("a"));
    }
}
