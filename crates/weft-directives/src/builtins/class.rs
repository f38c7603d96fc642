#![forbid(unsafe_code)]

//! The `class` directive: reactive class-list toggling.
//!
//! Two flavors, both plain-expression only:
//!
//! - `@class:active="isOpen"` — the parameter names one class, toggled
//!   by the value's truthiness.
//! - `@class="flags"` — no parameter; the value must be a map, and every
//!   key names a class toggled by its entry's truthiness.

use weft_expr::ExprKinds;

use crate::directive::{Directive, DirectiveBehavior, DirectiveError, DirectivePayload};

/// Behavior behind the `class` directive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassBind;

impl ClassBind {
    fn apply(payload: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
        if let Some(class) = payload.param {
            payload
                .element
                .toggle_class(class, payload.value.is_truthy());
            return Ok(());
        }
        let Some(toggles) = payload.value.as_map() else {
            return Err(DirectiveError::ValueShape {
                directive: "class".to_string(),
                expected: "a keyed map of class toggles",
                found: payload.value.type_name(),
            });
        };
        for (class, on) in toggles {
            payload.element.toggle_class(class, on.is_truthy());
        }
        Ok(())
    }
}

impl DirectiveBehavior for ClassBind {
    fn init(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
        Self::apply(payload)
    }

    fn handle(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
        Self::apply(payload)
    }
}

/// The `class` directive definition. Statements and loops are
/// disallowed; a class toggle never writes anything back.
#[must_use]
pub fn class() -> Directive {
    Directive::new("class", ClassBind)
        .expect("\"class\" is a letters-only name")
        .allowed_kinds(ExprKinds::EXPRESSION)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
