#![forbid(unsafe_code)]

//! The element-side binding surface.
//!
//! An [`ElementScope`] pairs an [`Element`] with the [`VarContext`] its
//! expressions resolve against. The scope context usually starts empty
//! and is extended lazily: handlers pull in exactly the variables their
//! matched expressions reference, aliasing cells owned by the source
//! context, so a scope sees the names it uses and nothing else.

use std::fmt;

use weft_core::{Element, Value};
use weft_reactive::{ContextError, Subscription, VarContext, Variable};

/// One element plus its variable scope. Cheap to clone; clones share
/// both the element and the context.
#[derive(Clone)]
pub struct ElementScope {
    element: Element,
    context: VarContext,
}

impl ElementScope {
    /// Pair an element with a (usually empty) context.
    #[must_use]
    pub fn new(element: Element, context: VarContext) -> Self {
        Self { element, context }
    }

    #[must_use]
    pub fn element(&self) -> &Element {
        &self.element
    }

    #[must_use]
    pub fn context(&self) -> &VarContext {
        &self.context
    }

    /// Whether the element is attached to a live document. Handlers
    /// skip binding detached elements.
    #[must_use]
    pub fn exists_in_dom(&self) -> bool {
        self.element.connected()
    }

    /// Subscribe a listener to a variable in this scope's context.
    pub fn subscribe_to(
        &self,
        name: &str,
        listener: impl Fn(&Value) + 'static,
        immediate: bool,
    ) -> Result<Subscription, ContextError> {
        self.context.subscribe(name, listener, immediate)
    }

    /// Alias `variable` into this scope under `name` unless the name is
    /// already bound. Returns whether the entry was added.
    pub fn add_to_context_if_not_present(&self, name: &str, variable: &Variable) -> bool {
        self.context.add_if_absent(name, variable)
    }
}

impl fmt::Debug for ElementScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementScope")
            .field("element", &self.element)
            .field("context", &self.context)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
