#![forbid(unsafe_code)]

//! A minimal element node for directives to bind against.
//!
//! [`Element`] models the slice of a live document node the binding engine
//! touches: an ordered attribute list (the discovery surface for directive
//! attributes), an insertion-ordered class list, and a connectedness bit.
//! It is a cheap-clone shared handle; every clone refers to the same node.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

struct ElementInner {
    tag: String,
    /// `(name, value)` pairs in document order. Updates keep position.
    attributes: Vec<(String, String)>,
    classes: IndexSet<String>,
    connected: bool,
}

/// Shared handle to one element node.
///
/// Cloning an `Element` creates a new handle to the **same** node; the id
/// identifies the node, not the handle.
#[derive(Clone)]
pub struct Element {
    id: u64,
    inner: Rc<RefCell<ElementInner>>,
}

impl Element {
    /// Create a node with the given tag. Nodes start connected; callers
    /// model detachment with [`set_connected`](Element::set_connected).
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            id: NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed),
            inner: Rc::new(RefCell::new(ElementInner {
                tag: tag.into(),
                attributes: Vec::new(),
                classes: IndexSet::new(),
                connected: true,
            })),
        }
    }

    /// Process-unique node id, for logging.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn tag(&self) -> String {
        self.inner.borrow().tag.clone()
    }

    /// Set an attribute, replacing an existing one in place so document
    /// order is stable.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let mut inner = self.inner.borrow_mut();
        match inner.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => inner.attributes.push((name, value)),
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        self.inner.borrow_mut().attributes.retain(|(n, _)| n != name);
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner
            .borrow()
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Snapshot of all attributes in document order.
    #[must_use]
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.inner.borrow().attributes.clone()
    }

    /// Add or remove a class according to `on`. Adding an existing class or
    /// removing an absent one is a no-op.
    pub fn toggle_class(&self, name: &str, on: bool) {
        let mut inner = self.inner.borrow_mut();
        if on {
            if !inner.classes.contains(name) {
                inner.classes.insert(name.to_string());
            }
        } else {
            inner.classes.shift_remove(name);
        }
    }

    pub fn add_class(&self, name: &str) {
        self.toggle_class(name, true);
    }

    pub fn remove_class(&self, name: &str) {
        self.toggle_class(name, false);
    }

    #[must_use]
    pub fn has_class(&self, name: &str) -> bool {
        self.inner.borrow().classes.contains(name)
    }

    /// Snapshot of the class list in insertion order.
    #[must_use]
    pub fn classes(&self) -> Vec<String> {
        self.inner.borrow().classes.iter().cloned().collect()
    }

    /// Whether the node is attached to a live document.
    #[must_use]
    pub fn connected(&self) -> bool {
        self.inner.borrow().connected
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.borrow_mut().connected = connected;
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("tag", &inner.tag)
            .field("attributes", &inner.attributes.len())
            .field("classes", &inner.classes)
            .field("connected", &inner.connected)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
