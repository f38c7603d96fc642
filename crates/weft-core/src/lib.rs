#![forbid(unsafe_code)]

//! Core data model for weft: the dynamic [`Value`] type that expressions
//! evaluate to, and the [`Element`] node that directives act on.
//!
//! Everything here is plain single-threaded data. Reactivity lives in
//! `weft-reactive`; this crate only defines what is stored and compared.

pub mod element;
pub mod value;

pub use element::Element;
pub use indexmap::IndexMap;
pub use value::Value;
