#![forbid(unsafe_code)]

//! Directives and the element binding lifecycle for weft.
//!
//! This crate connects attribute matching to reactive re-evaluation:
//!
//! - [`Directive`]: a named, validated rule with a [`DirectiveBehavior`]
//!   and constraint flags.
//! - [`DirectiveRegistry`]: the append-only name → directive table.
//! - [`DirectiveHandler`]: binds one directive to one element —
//!   attribute scan, parse, baseline `init`, dependency subscriptions,
//!   teardown.
//! - [`Binder`]: binds every directive attribute on an element at once.
//! - [`ElementScope`]: the element-plus-context surface handlers bind.
//! - [`builtins`]: ready-made directives (`class`).
//!
//! # Example
//!
//! ```
//! use weft_core::{Element, Value};
//! use weft_directives::{Binder, DirectiveRegistry, ElementScope};
//! use weft_reactive::VarContext;
//!
//! let registry = DirectiveRegistry::with_builtins();
//! let data = VarContext::from_entries([("isOpen", Value::from(false))]);
//!
//! let el = Element::new("nav");
//! el.set_attribute("@class:active", "isOpen");
//!
//! let binder = Binder::new(&registry);
//! let scope = ElementScope::new(el.clone(), VarContext::new());
//! let handlers = binder.bind(&scope, &data)?;
//!
//! assert!(!el.has_class("active"));
//! data.set("isOpen", Value::from(true))?;
//! assert!(el.has_class("active"));
//! drop(handlers);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod attr;
pub mod binder;
pub mod builtins;
pub mod directive;
pub mod handler;
pub mod registry;
pub mod scope;

pub use attr::{AttrName, Modifiers};
pub use binder::Binder;
pub use directive::{
    Directive, DirectiveBehavior, DirectiveError, DirectiveMatch, DirectivePayload,
};
pub use handler::DirectiveHandler;
pub use registry::DirectiveRegistry;
pub use scope::ElementScope;
