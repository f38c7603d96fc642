#![forbid(unsafe_code)]

//! The per-element binding lifecycle.
//!
//! # Design
//!
//! A [`DirectiveHandler`] orchestrates one (element, directive) pair.
//! [`start`](DirectiveHandler::start) scans the element's attributes for
//! names addressing its directive, validates and parses each into a
//! [`DirectiveMatch`], pulls every referenced variable into the element's
//! scope, establishes baseline state with the behavior's `init`, and
//! subscribes each match to its dependencies so future changes
//! re-evaluate the expression and run the behavior's `handle`.
//!
//! # Invariants
//!
//! 1. `init` runs exactly once per match, strictly before any `handle`
//!    call for that match.
//! 2. `handle` runs at most once per dependency-change notification; the
//!    context does not batch, so two changed dependencies mean two calls.
//! 3. Starting against a detached element is a complete no-op.
//! 4. [`stop`](DirectiveHandler::stop) synchronously releases every
//!    subscription the binding created; no callback fires afterwards.
//!
//! # Failure Modes
//!
//! - Bind-time errors (missing parameter, disallowed kind, parse failure,
//!   unknown dependency) abort `start` with the error; the element keeps
//!   whatever state earlier matches already applied. A misconfigured
//!   template fails fast rather than degrading silently.
//! - Notification-time errors: listeners cannot unwind, so evaluation and
//!   `handle` failures inside a change notification are logged and the
//!   notification is dropped.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, error};
use weft_core::Value;
use weft_expr::{ExprCache, ExprKind, evaluate, resolved_path_string, set_path};
use weft_reactive::{ContextError, Subscription, VarContext};

use crate::attr::AttrName;
use crate::directive::{Directive, DirectiveError, DirectiveMatch, DirectivePayload};
use crate::scope::ElementScope;

/// Orchestrates one directive over one element.
///
/// Subscriptions are plain RAII guards, so dropping the handler tears
/// the binding down the same way [`stop`](DirectiveHandler::stop) does.
pub struct DirectiveHandler {
    directive: Rc<Directive>,
    scope: Option<ElementScope>,
    matches: Vec<DirectiveMatch>,
    subscriptions: Vec<Subscription>,
}

impl DirectiveHandler {
    #[must_use]
    pub fn new(directive: Rc<Directive>) -> Self {
        Self {
            directive,
            scope: None,
            matches: Vec::new(),
            subscriptions: Vec::new(),
        }
    }

    #[must_use]
    pub fn directive(&self) -> &Directive {
        &self.directive
    }

    /// Whether the handler currently holds a binding.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.scope.is_some()
    }

    /// Matches from the current binding, in attribute order.
    #[must_use]
    pub fn matches(&self) -> &[DirectiveMatch] {
        &self.matches
    }

    /// Every variable name the current binding reads, deduplicated in
    /// first-appearance order across matches.
    #[must_use]
    pub fn dependencies(&self) -> Vec<String> {
        flat_unique(&self.matches)
    }

    /// Bind to an element.
    ///
    /// Any previous binding is released first. When the element is not in
    /// the document this returns without doing anything. `variables` is
    /// the source context; referenced variables are aliased into the
    /// scope's own context on demand.
    pub fn start(
        &mut self,
        scope: ElementScope,
        variables: &VarContext,
        cache: &ExprCache,
    ) -> Result<(), DirectiveError> {
        self.stop();
        if !scope.exists_in_dom() {
            debug!(
                directive = self.directive.name(),
                element = scope.element().id(),
                "element not in document, skipping bind"
            );
            return Ok(());
        }

        let matches = self.scan(&scope, cache)?;

        for dep in flat_unique(&matches) {
            if let Some(variable) = variables.get(&dep) {
                scope.add_to_context_if_not_present(&dep, &variable);
            }
        }

        let mut subscriptions = Vec::new();
        for m in &matches {
            let value = match m.parsed() {
                Some(parsed) => {
                    evaluate(parsed, scope.context(), self.directive.preserves_functions())?
                }
                None => Value::Null,
            };
            self.directive.init(&DirectivePayload {
                element: scope.element(),
                param: m.param(),
                modifiers: m.modifiers(),
                raw: m.raw(),
                data: m.parsed(),
                value: &value,
            })?;

            let Some(parsed) = &m.parsed else {
                continue;
            };
            for dep in parsed.dependencies() {
                let directive = Rc::clone(&self.directive);
                let listener_scope = scope.clone();
                let listener_match = m.clone();
                let listener = move |_: &Value| {
                    apply_change(&directive, &listener_scope, &listener_match);
                };
                subscriptions.push(scope.subscribe_to(dep, listener, true)?);
            }
        }

        debug!(
            directive = self.directive.name(),
            element = scope.element().id(),
            matches = matches.len(),
            subscriptions = subscriptions.len(),
            "handler bound"
        );
        self.scope = Some(scope);
        self.matches = matches;
        self.subscriptions = subscriptions;
        Ok(())
    }

    /// Release the current binding. Every subscription this handler
    /// created is dropped synchronously, so no stale callback can fire
    /// against a discarded element. Idempotent.
    pub fn stop(&mut self) {
        if let Some(scope) = self.scope.take() {
            debug!(
                directive = self.directive.name(),
                element = scope.element().id(),
                matches = self.matches.len(),
                "handler unbound"
            );
        }
        self.subscriptions.clear();
        self.matches.clear();
    }

    /// Write `value` back through a match's expression.
    ///
    /// An empty resolved path replaces the root variable's value;
    /// otherwise the write lands at the resolved path, creating missing
    /// intermediate containers only when the expression is a statement.
    pub fn assign(&self, m: &DirectiveMatch, value: Value) -> Result<(), DirectiveError> {
        let Some(scope) = &self.scope else {
            return Err(DirectiveError::Unbound);
        };
        let Some(parsed) = m.parsed() else {
            return Err(DirectiveError::NoExpression);
        };
        let ctx = scope.context();
        let variable = ctx
            .get(parsed.var_name())
            .ok_or_else(|| ContextError::UnknownVariable {
                name: parsed.var_name().to_string(),
            })?;
        let path = resolved_path_string(parsed, ctx)?;
        if path.is_empty() {
            variable.set(value);
        } else {
            set_path(
                &variable,
                &path,
                value,
                parsed.kind() == ExprKind::Statement,
            )?;
        }
        Ok(())
    }

    /// Collect this directive's matches from the element's attributes,
    /// in attribute order. Attributes addressing other directives (or no
    /// directive at all) are skipped.
    fn scan(
        &self,
        scope: &ElementScope,
        cache: &ExprCache,
    ) -> Result<Vec<DirectiveMatch>, DirectiveError> {
        let mut matches = Vec::new();
        for (name, value) in scope.element().attributes() {
            let Some(attr) = AttrName::parse(&name) else {
                continue;
            };
            if !attr.name().eq_ignore_ascii_case(self.directive.name()) {
                continue;
            }
            matches.push(
                self.directive
                    .execute(attr.param(), attr.modifiers(), &value, cache)?,
            );
        }
        Ok(matches)
    }
}

impl fmt::Debug for DirectiveHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveHandler")
            .field("directive", &self.directive.name())
            .field("bound", &self.is_bound())
            .field("matches", &self.matches.len())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

/// Re-evaluate one match and run the behavior's `handle`. Runs inside a
/// change notification, so failures are logged rather than propagated.
fn apply_change(directive: &Directive, scope: &ElementScope, m: &DirectiveMatch) {
    let Some(parsed) = m.parsed() else {
        return;
    };
    let value = match evaluate(parsed, scope.context(), directive.preserves_functions()) {
        Ok(value) => value,
        Err(err) => {
            error!(
                directive = directive.name(),
                element = scope.element().id(),
                raw = m.raw(),
                %err,
                "re-evaluation failed"
            );
            return;
        }
    };
    if let Err(err) = directive.handle(&DirectivePayload {
        element: scope.element(),
        param: m.param(),
        modifiers: m.modifiers(),
        raw: m.raw(),
        data: Some(parsed),
        value: &value,
    }) {
        error!(
            directive = directive.name(),
            element = scope.element().id(),
            raw = m.raw(),
            %err,
            "directive handle failed"
        );
    }
}

/// Dependency names across matches, each exactly once, first appearance
/// first.
fn flat_unique(matches: &[DirectiveMatch]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for m in matches {
        for dep in m.dependencies() {
            if !out.iter().any(|seen| seen == dep) {
                out.push(dep.clone());
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tracing_test::traced_test;
    use weft_core::Element;
    use weft_expr::EvalError;

    use crate::directive::DirectiveBehavior;

    type CallLog = Rc<RefCell<Vec<(&'static str, Value)>>>;

    struct Recorder {
        log: CallLog,
    }

    impl DirectiveBehavior for Recorder {
        fn init(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
            self.log.borrow_mut().push(("init", payload.value.clone()));
            Ok(())
        }

        fn handle(&self, payload: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
            self.log.borrow_mut().push(("handle", payload.value.clone()));
            Ok(())
        }
    }

    fn recorder(name: &str) -> (Rc<Directive>, CallLog) {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let directive = Directive::new(name, Recorder { log: Rc::clone(&log) }).unwrap();
        (Rc::new(directive), log)
    }

    fn scoped(element: &Element) -> ElementScope {
        ElementScope::new(element.clone(), VarContext::new())
    }

    #[test]
    fn binds_matches_and_reacts() {
        let (directive, log) = recorder("text");
        let element = Element::new("div");
        element.set_attribute("@text", "user.name");
        let source = VarContext::from_entries([(
            "user",
            Value::map([("name", Value::from("ada"))]),
        )]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();

        assert!(handler.is_bound());
        assert_eq!(handler.matches().len(), 1);
        assert_eq!(handler.dependencies(), vec!["user"]);
        // Baseline init, then the immediate pass of the one subscription.
        assert_eq!(
            *log.borrow(),
            vec![("init", Value::from("ada")), ("handle", Value::from("ada"))]
        );

        source
            .set("user", Value::map([("name", Value::from("grace"))]))
            .unwrap();
        assert_eq!(
            log.borrow().last().unwrap(),
            &("handle", Value::from("grace"))
        );
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn init_runs_once_before_any_handle() {
        let (directive, log) = recorder("text");
        let element = Element::new("td");
        element.set_attribute("@text", "rows[selected]");
        let source = VarContext::from_entries([
            ("rows", Value::list([Value::from("a"), Value::from("b")])),
            ("selected", Value::from(0)),
        ]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();

        let log = log.borrow();
        assert_eq!(log[0], ("init", Value::from("a")));
        assert_eq!(log.iter().filter(|(kind, _)| *kind == "init").count(), 1);
        // Two dependencies, one immediate handle each.
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn every_dependency_retriggers() {
        let (directive, log) = recorder("text");
        let element = Element::new("td");
        element.set_attribute("@text", "rows[selected]");
        let source = VarContext::from_entries([
            ("rows", Value::list([Value::from("a"), Value::from("b")])),
            ("selected", Value::from(0)),
        ]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();
        let baseline = log.borrow().len();

        source.set("selected", Value::from(1)).unwrap();
        assert_eq!(
            log.borrow().last().unwrap(),
            &("handle", Value::from("b"))
        );

        source
            .set("rows", Value::list([Value::from("x"), Value::from("y")]))
            .unwrap();
        assert_eq!(
            log.borrow().last().unwrap(),
            &("handle", Value::from("y"))
        );
        assert_eq!(log.borrow().len(), baseline + 2);
    }

    #[test]
    fn non_dependency_changes_do_not_trigger() {
        let (directive, log) = recorder("text");
        let element = Element::new("div");
        element.set_attribute("@text", "user.name");
        let source = VarContext::from_entries([
            ("user", Value::map([("name", Value::from("ada"))])),
            ("unrelated", Value::from(0)),
        ]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();
        let baseline = log.borrow().len();

        source.set("unrelated", Value::from(99)).unwrap();
        assert_eq!(log.borrow().len(), baseline);
    }

    #[test]
    fn unchanged_values_do_not_renotify() {
        let (directive, log) = recorder("text");
        let element = Element::new("div");
        element.set_attribute("@text", "user.name");
        let source = VarContext::from_entries([(
            "user",
            Value::map([("name", Value::from("ada"))]),
        )]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();
        let baseline = log.borrow().len();

        // Structurally equal replacement is a no-op at the variable.
        source
            .set("user", Value::map([("name", Value::from("ada"))]))
            .unwrap();
        assert_eq!(log.borrow().len(), baseline);
    }

    #[test]
    fn detached_element_is_a_noop() {
        let (directive, log) = recorder("text");
        let element = Element::new("div");
        element.set_attribute("@text", "user.name");
        element.set_connected(false);
        let source = VarContext::from_entries([("user", Value::from("ada"))]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();

        assert!(!handler.is_bound());
        assert!(handler.matches().is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn stop_releases_subscriptions() {
        let (directive, log) = recorder("text");
        let element = Element::new("div");
        element.set_attribute("@text", "user.name");
        let source = VarContext::from_entries([(
            "user",
            Value::map([("name", Value::from("ada"))]),
        )]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();
        let baseline = log.borrow().len();

        handler.stop();
        assert!(!handler.is_bound());
        assert!(handler.matches().is_empty());

        source
            .set("user", Value::map([("name", Value::from("grace"))]))
            .unwrap();
        assert_eq!(log.borrow().len(), baseline);
        assert_eq!(source.get("user").unwrap().subscriber_count(), 0);
    }

    #[test]
    fn restart_replaces_the_previous_binding() {
        let (directive, log) = recorder("text");
        let first = Element::new("div");
        first.set_attribute("@text", "a");
        let second = Element::new("div");
        second.set_attribute("@text", "b");
        let source =
            VarContext::from_entries([("a", Value::from("one")), ("b", Value::from("two"))]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&first), &source, &cache).unwrap();
        handler.start(scoped(&second), &source, &cache).unwrap();
        let baseline = log.borrow().len();

        // The first binding's dependency no longer fires.
        source.set("a", Value::from("changed")).unwrap();
        assert_eq!(log.borrow().len(), baseline);
        assert_eq!(source.get("a").unwrap().subscriber_count(), 0);

        source.set("b", Value::from("changed")).unwrap();
        assert_eq!(log.borrow().len(), baseline + 1);
    }

    #[test]
    fn scan_matches_only_this_directive() {
        let (directive, _log) = recorder("text");
        let element = Element::new("div");
        element.set_attribute("@text", "title");
        element.set_attribute("@other", "title");
        element.set_attribute("plain", "ignored");
        let source = VarContext::from_entries([("title", Value::from("t"))]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();
        assert_eq!(handler.matches().len(), 1);
    }

    #[test]
    fn multiple_matches_aggregate_dependencies() {
        let (directive, _log) = recorder("mark");
        let element = Element::new("div");
        element.set_attribute("@mark:one", "a.x");
        element.set_attribute("@mark:two", "b[a.k]");
        let source = VarContext::from_entries([
            ("a", Value::map([("x", Value::from(1)), ("k", Value::from("f"))])),
            ("b", Value::map([("f", Value::from(2))])),
        ]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();
        assert_eq!(handler.matches().len(), 2);
        assert_eq!(handler.dependencies(), vec!["a", "b"]);
    }

    #[test]
    fn missing_required_parameter_fails_the_bind() {
        let directive =
            Rc::new(Directive::from_fn("bind", |_| Ok(())).unwrap().param_required(true));
        let element = Element::new("input");
        element.set_attribute("@bind", "draft");
        let source = VarContext::from_entries([("draft", Value::from(""))]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        let err = handler.start(scoped(&element), &source, &cache).unwrap_err();
        assert_eq!(
            err,
            DirectiveError::MissingParameter {
                directive: "bind".into()
            }
        );
        assert!(!handler.is_bound());
    }

    #[test]
    fn unknown_dependency_fails_the_bind() {
        let (directive, _log) = recorder("text");
        let element = Element::new("div");
        element.set_attribute("@text", "ghost.name");
        let source = VarContext::new();
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        let err = handler.start(scoped(&element), &source, &cache).unwrap_err();
        assert!(matches!(
            err,
            DirectiveError::Eval(EvalError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn empty_attribute_value_initializes_without_subscribing() {
        let (directive, log) = recorder("focus");
        let element = Element::new("input");
        element.set_attribute("@focus", "");
        let source = VarContext::new();
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();

        assert!(handler.is_bound());
        assert_eq!(*log.borrow(), vec![("init", Value::Null)]);
        assert!(handler.dependencies().is_empty());
    }

    #[test]
    fn assign_replaces_the_root_when_the_path_is_empty() {
        let (directive, log) = recorder("model");
        let element = Element::new("input");
        element.set_attribute("@model", "title");
        let source = VarContext::from_entries([("title", Value::from("a"))]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();

        let m = handler.matches()[0].clone();
        handler.assign(&m, Value::from("b")).unwrap();
        assert_eq!(source.get("title").unwrap().get(), Value::from("b"));
        // The write-back itself renotifies the binding.
        assert_eq!(log.borrow().last().unwrap(), &("handle", Value::from("b")));
    }

    #[test]
    fn assign_writes_through_the_resolved_path() {
        let (directive, _log) = recorder("model");
        let element = Element::new("input");
        element.set_attribute("@model", "user.name");
        let source = VarContext::from_entries([(
            "user",
            Value::map([("name", Value::from("ada"))]),
        )]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();

        let m = handler.matches()[0].clone();
        handler.assign(&m, Value::from("grace")).unwrap();
        let user = source.get("user").unwrap().get();
        assert_eq!(user.get("name"), Some(&Value::from("grace")));
    }

    #[test]
    fn assign_errors_when_unbound_or_without_expression() {
        let (directive, _log) = recorder("model");
        let cache = ExprCache::new();
        let m = directive
            .execute(None, &crate::attr::Modifiers::new(), "title", &cache)
            .unwrap();

        let handler = DirectiveHandler::new(Rc::clone(&directive));
        assert_eq!(
            handler.assign(&m, Value::Null).unwrap_err(),
            DirectiveError::Unbound
        );

        let element = Element::new("input");
        element.set_attribute("@model", "");
        let source = VarContext::new();
        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();
        let empty = handler.matches()[0].clone();
        assert_eq!(
            handler.assign(&empty, Value::Null).unwrap_err(),
            DirectiveError::NoExpression
        );
    }

    #[test]
    fn functions_are_invoked_unless_preserved() {
        let (directive, log) = recorder("call");
        let element = Element::new("button");
        element.set_attribute("@call", "greet");
        let source =
            VarContext::from_entries([("greet", Value::func(|| Value::from("hi")))]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();
        assert_eq!(log.borrow()[0], ("init", Value::from("hi")));

        let kept_log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let keeping = Rc::new(
            Directive::new("keep", Recorder { log: Rc::clone(&kept_log) })
                .unwrap()
                .preserve_functions(true),
        );
        let element = Element::new("button");
        element.set_attribute("@keep", "greet");
        let mut handler = DirectiveHandler::new(keeping);
        handler.start(scoped(&element), &source, &cache).unwrap();
        assert!(matches!(kept_log.borrow()[0].1, Value::Func(_)));
    }

    #[test]
    #[traced_test]
    fn handle_failures_are_logged_not_fatal() {
        struct FailsOnHandle;

        impl DirectiveBehavior for FailsOnHandle {
            fn init(&self, _: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
                Ok(())
            }

            fn handle(&self, _: &DirectivePayload<'_>) -> Result<(), DirectiveError> {
                Err(DirectiveError::failed("flaky", "boom"))
            }
        }

        let directive = Rc::new(Directive::new("flaky", FailsOnHandle).unwrap());
        let element = Element::new("div");
        element.set_attribute("@flaky", "n");
        let source = VarContext::from_entries([("n", Value::from(1))]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();

        source.set("n", Value::from(2)).unwrap();
        assert!(logs_contain("directive handle failed"));
        assert!(logs_contain("flaky"));
    }

    #[test]
    fn out_of_range_reads_resolve_to_null() {
        let (directive, log) = recorder("text");
        let element = Element::new("div");
        element.set_attribute("@text", "rows[selected]");
        let source = VarContext::from_entries([
            ("rows", Value::list([Value::from("a")])),
            ("selected", Value::from(0)),
        ]);
        let cache = ExprCache::new();

        let mut handler = DirectiveHandler::new(directive);
        handler.start(scoped(&element), &source, &cache).unwrap();

        source.set("selected", Value::from(5)).unwrap();
        assert_eq!(log.borrow().last().unwrap(), &("handle", Value::Null));
    }

    #[test]
    fn flat_unique_preserves_first_appearance_order() {
        let cache = ExprCache::new();
        let dir = Directive::from_fn("x", |_| Ok(())).unwrap();
        let mods = crate::attr::Modifiers::new();
        let a = dir.execute(None, &mods, "b[a.k]", &cache).unwrap();
        let b = dir.execute(None, &mods, "a.x", &cache).unwrap();
        assert_eq!(flat_unique(&[a, b]), vec!["b", "a"]);
    }
}
