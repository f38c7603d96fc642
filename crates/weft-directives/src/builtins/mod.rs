#![forbid(unsafe_code)]

//! Built-in directives.
//!
//! Ready-made [`Directive`](crate::Directive) definitions preloaded by
//! [`DirectiveRegistry::with_builtins`](crate::DirectiveRegistry::with_builtins).

pub mod class;

pub use class::{ClassBind, class};
