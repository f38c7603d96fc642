#![forbid(unsafe_code)]

//! Expression parsing and evaluation for weft.
//!
//! Binding attributes carry a tiny path language: property chains with
//! static and computed segments (`user.name`, `rows[selected].title`),
//! assignment statements (`draft.title = form.title`), and loop forms
//! (`(item, i) in items`). This crate turns those strings into
//! [`ParsedExpr`] values and resolves them against a
//! [`VarContext`](weft_reactive::VarContext).
//!
//! # Architecture
//!
//! - [`parse`]: a single-pass recursive-descent parser. No evaluation, no
//!   context access; the output is a plain data structure.
//! - [`evaluate`] / [`assign`] / [`loop_sequence`]: interpretation of a
//!   parsed expression against live variables. Reads are nullish-tolerant,
//!   writes are strict.
//! - [`ExprCache`]: string-keyed memoization of successful parses, shared
//!   by handlers so each attribute string is parsed once.
//!
//! # Invariants
//!
//! 1. Parsing is pure: the same source string always yields the same
//!    [`ParsedExpr`], so results are safely memoizable.
//! 2. [`ParsedExpr::dependencies`] lists every context variable the
//!    expression can read, including those inside computed segments and
//!    right-hand sides, each exactly once in first-appearance order.
//! 3. A nullish value anywhere along a read path resolves the whole
//!    expression to `Null`; no read ever panics or errors on shape.
//! 4. A failed write leaves the target variable untouched.

pub mod cache;
pub mod eval;
pub mod parse;

pub use cache::ExprCache;
pub use eval::{
    EvalError, LoopItems, LoopSequence, assign, evaluate, loop_sequence, resolved_path_string,
    set_path,
};
pub use parse::{
    AssignValue, ExprKind, ExprKinds, LoopBinding, ParseError, ParsedExpr, PathSegment, parse,
};
