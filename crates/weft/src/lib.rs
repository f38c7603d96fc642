#![forbid(unsafe_code)]

//! weft public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users:
//! values and elements from `core`, variables and contexts from
//! `reactive`, the binding expression language from `expr`, and the
//! directive layer from `directives`.

pub mod prelude {
    pub use weft_core as core;
    pub use weft_directives as directives;
    pub use weft_expr as expr;
    pub use weft_reactive as reactive;
}
