#![forbid(unsafe_code)]

//! Directive definitions.
//!
//! A [`Directive`] is a named rule created once at registration time and
//! shared read-only by every handler that binds it: the name (validated
//! against the letters-only grammar), the [`DirectiveBehavior`] that
//! applies values to elements, and the constraint flags gating what its
//! attribute expressions may contain.
//!
//! [`Directive::execute`] is the validation front door for one attribute:
//! it checks the parameter requirement, parses the value through the
//! shared cache, checks the expression kind against the allow-set, and
//! returns an immutable [`DirectiveMatch`]. Applying the behavior is the
//! handler's job; the directive itself holds no per-element state.

use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use weft_core::{Element, Value};
use weft_expr::{EvalError, ExprCache, ExprKind, ExprKinds, ParseError, ParsedExpr};
use weft_reactive::ContextError;

use crate::attr::Modifiers;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from directive registration, binding, and application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    /// The registry already holds a directive under this name (any case).
    #[error("already registered `{name}`")]
    Duplicate { name: String },

    /// The name does not follow the letters-only directive grammar.
    #[error("`{name}` is not a valid directive name")]
    InvalidName { name: String },

    /// The directive requires a `:parameter` and the attribute had none.
    #[error("a parameter is required for @{directive}")]
    MissingParameter { directive: String },

    /// The attribute value parsed to a form the directive does not accept.
    #[error("{kind} expressions are not allowed for @{directive}")]
    DisallowedKind { directive: String, kind: ExprKind },

    /// A `@` attribute named a directive nobody registered.
    #[error("no directive registered for `@{name}`")]
    UnknownDirective { name: String },

    /// A `@` attribute that does not follow the attribute name grammar.
    #[error("`{name}` is not a valid directive attribute")]
    InvalidAttribute { name: String },

    /// The evaluated value had the wrong shape for the directive.
    #[error("@{directive} expected {expected}, found {found}")]
    ValueShape {
        directive: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The handler holds no binding.
    #[error("handler is not bound to an element")]
    Unbound,

    /// The match carries no expression (the attribute value was empty).
    #[error("the match carries no expression")]
    NoExpression,

    /// A behavior-supplied failure.
    #[error("@{directive} failed: {message}")]
    Failed { directive: String, message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl DirectiveError {
    /// Behavior-supplied failure with a free-form message.
    #[must_use]
    pub fn failed(directive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            directive: directive.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Everything a behavior receives when applying one match.
///
/// `value` is the current evaluation of the match's expression (`Null`
/// when the attribute had no value). `data` is the parsed expression
/// itself, for behaviors that need its structure (write-back targets,
/// loop bindings).
#[derive(Debug)]
pub struct DirectivePayload<'a> {
    pub element: &'a Element,
    pub param: Option<&'a str>,
    pub modifiers: &'a Modifiers,
    pub raw: &'a str,
    pub data: Option<&'a ParsedExpr>,
    pub value: &'a Value,
}

/// How a directive applies values to elements.
///
/// The engine guarantees `init` runs exactly once per match, before any
/// `handle` call for that match; `handle` then runs once per dependency
/// notification. All state arrives through the payload; behaviors hold
/// none of their own.
pub trait DirectiveBehavior {
    /// Establish the element's baseline state from the first evaluation.
    fn init(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError>;

    /// Re-apply after a dependency change.
    fn handle(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError>;
}

/// Wraps a closure as a behavior whose `init` and `handle` coincide.
struct FnBehavior<F> {
    f: F,
}

impl<F> DirectiveBehavior for FnBehavior<F>
where
    F: Fn(&DirectivePayload<'_>) -> Result<(), DirectiveError>,
{
    fn init(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
        (self.f)(payload)
    }

    fn handle(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
        (self.f)(payload)
    }
}

// ---------------------------------------------------------------------------
// DirectiveMatch
// ---------------------------------------------------------------------------

/// One matched attribute on one element.
///
/// Immutable once created; discarded when the handler that produced it
/// unbinds. `parsed` is absent when the attribute value was empty — such
/// a match still runs `init` once, with no data and no subscriptions.
#[derive(Debug, Clone)]
pub struct DirectiveMatch {
    pub(crate) raw: String,
    pub(crate) param: Option<String>,
    pub(crate) modifiers: Modifiers,
    pub(crate) parsed: Option<Rc<ParsedExpr>>,
}

impl DirectiveMatch {
    /// The attribute value as written.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The `:parameter` part of the attribute name, when present.
    #[must_use]
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    #[must_use]
    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }

    /// The parsed expression, absent when the attribute value was empty.
    #[must_use]
    pub fn parsed(&self) -> Option<&ParsedExpr> {
        self.parsed.as_deref()
    }

    /// Variable names this match's expression reads; empty without one.
    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        match &self.parsed {
            Some(parsed) => parsed.dependencies(),
            None => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Directive
// ---------------------------------------------------------------------------

pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|ch| ch.is_ascii_alphabetic())
}

/// A named directive rule.
///
/// Created once, shared read-only across every element that uses it.
/// Constraint flags are set builder-style:
///
/// ```
/// use weft_directives::{Directive, DirectiveError};
/// use weft_expr::ExprKinds;
///
/// let toggle = Directive::from_fn("show", |payload| {
///     let hidden = !payload.value.is_truthy();
///     payload.element.set_attribute("hidden", hidden.to_string());
///     Ok(())
/// })?
/// .allowed_kinds(ExprKinds::EXPRESSION);
///
/// assert_eq!(toggle.name(), "show");
/// # Ok::<(), DirectiveError>(())
/// ```
pub struct Directive {
    name: String,
    behavior: Rc<dyn DirectiveBehavior>,
    param_required: bool,
    allowed_kinds: ExprKinds,
    preserve_functions: bool,
}

impl Directive {
    /// Create a directive with an explicit behavior.
    ///
    /// Names are ASCII letters only, matched case-insensitively; anything
    /// else is [`DirectiveError::InvalidName`]. Attribute expressions
    /// default to the plain expression kind; widen with
    /// [`allowed_kinds`](Directive::allowed_kinds).
    pub fn new(
        name: impl Into<String>,
        behavior: impl DirectiveBehavior + 'static,
    ) -> Result<Self, DirectiveError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(DirectiveError::InvalidName { name });
        }
        Ok(Self {
            name,
            behavior: Rc::new(behavior),
            param_required: false,
            allowed_kinds: ExprKinds::EXPRESSION,
            preserve_functions: false,
        })
    }

    /// Create a directive whose `init` and `handle` both run `f`.
    pub fn from_fn(
        name: impl Into<String>,
        f: impl Fn(&DirectivePayload<'_>) -> Result<(), DirectiveError> + 'static,
    ) -> Result<Self, DirectiveError> {
        Self::new(name, FnBehavior { f })
    }

    /// Require a `:parameter` in matching attribute names.
    #[must_use]
    pub fn param_required(mut self, required: bool) -> Self {
        self.param_required = required;
        self
    }

    /// Set which expression forms attribute values may contain.
    #[must_use]
    pub fn allowed_kinds(mut self, kinds: ExprKinds) -> Self {
        self.allowed_kinds = kinds;
        self
    }

    /// Hand function values to the behavior unexecuted instead of calling
    /// them and passing the result. For event-handler style directives.
    #[must_use]
    pub fn preserve_functions(mut self, preserve: bool) -> Self {
        self.preserve_functions = preserve;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn requires_param(&self) -> bool {
        self.param_required
    }

    /// The expression forms this directive accepts.
    #[must_use]
    pub const fn allowed(&self) -> ExprKinds {
        self.allowed_kinds
    }

    #[must_use]
    pub const fn preserves_functions(&self) -> bool {
        self.preserve_functions
    }

    /// Validate one matched attribute and parse its value.
    ///
    /// `param` and `modifiers` come from the attribute name; `raw` is the
    /// attribute value. An empty value produces a match with no parsed
    /// data. Parse results are shared through `cache`.
    pub fn execute(
        &self,
        param: Option<&str>,
        modifiers: &Modifiers,
        raw: &str,
        cache: &ExprCache,
    ) -> Result<DirectiveMatch, DirectiveError> {
        if self.param_required && param.is_none() {
            return Err(DirectiveError::MissingParameter {
                directive: self.name.clone(),
            });
        }
        let parsed = if raw.is_empty() {
            None
        } else {
            Some(cache.parse(raw)?)
        };
        if let Some(parsed) = &parsed {
            if !self.allowed_kinds.allows(parsed.kind()) {
                return Err(DirectiveError::DisallowedKind {
                    directive: self.name.clone(),
                    kind: parsed.kind(),
                });
            }
        }
        Ok(DirectiveMatch {
            raw: raw.to_string(),
            param: param.map(str::to_string),
            modifiers: modifiers.clone(),
            parsed,
        })
    }

    /// Run the behavior's baseline application.
    pub fn init(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
        self.behavior.init(payload)
    }

    /// Run the behavior's change application.
    pub fn handle(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
        self.behavior.handle(payload)
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directive")
            .field("name", &self.name)
            .field("param_required", &self.param_required)
            .field("allowed_kinds", &self.allowed_kinds)
            .field("preserve_functions", &self.preserve_functions)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
