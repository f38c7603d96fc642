#![forbid(unsafe_code)]

//! Binding composition.
//!
//! [`Binder`] is the discovery pass over one element: it walks the
//! attribute list, resolves each `@`-prefixed name against a
//! [`DirectiveRegistry`], and spawns one started [`DirectiveHandler`] per
//! distinct directive. The returned handlers own the bindings — keep
//! them alive for as long as the element stays bound; dropping them
//! releases every subscription.
//!
//! Discovery fails fast: a `@` attribute that does not follow the naming
//! grammar, or that names a directive nobody registered, is a
//! misconfigured template and aborts the bind. Attributes without the
//! `@` prefix are not the binder's business and are ignored.

use std::fmt;

use tracing::debug;
use weft_expr::ExprCache;
use weft_reactive::VarContext;

use crate::attr::AttrName;
use crate::directive::DirectiveError;
use crate::handler::DirectiveHandler;
use crate::registry::DirectiveRegistry;
use crate::scope::ElementScope;

/// Walks element attributes and spawns handlers from a registry.
pub struct Binder<'r> {
    registry: &'r DirectiveRegistry,
    cache: ExprCache,
}

impl<'r> Binder<'r> {
    /// A binder over `registry` with a fresh parse cache.
    #[must_use]
    pub fn new(registry: &'r DirectiveRegistry) -> Self {
        Self::with_cache(registry, ExprCache::new())
    }

    /// A binder sharing an existing parse cache.
    #[must_use]
    pub fn with_cache(registry: &'r DirectiveRegistry, cache: ExprCache) -> Self {
        Self { registry, cache }
    }

    /// The parse cache shared by every bind through this binder.
    #[must_use]
    pub fn cache(&self) -> &ExprCache {
        &self.cache
    }

    /// Bind every directive attribute on `scope`'s element.
    ///
    /// Returns one started handler per distinct directive found, in
    /// first-appearance order. A directive addressed by several
    /// attributes gets a single handler covering all of them.
    pub fn bind(
        &self,
        scope: &ElementScope,
        variables: &VarContext,
    ) -> Result<Vec<DirectiveHandler>, DirectiveError> {
        let mut handlers: Vec<DirectiveHandler> = Vec::new();
        let mut bound: Vec<String> = Vec::new();

        for (name, _) in scope.element().attributes() {
            if !name.starts_with('@') {
                continue;
            }
            let Some(attr) = AttrName::parse(&name) else {
                return Err(DirectiveError::InvalidAttribute { name });
            };
            let Some(directive) = self.registry.get(attr.name()) else {
                return Err(DirectiveError::UnknownDirective {
                    name: attr.name().to_string(),
                });
            };
            if bound.iter().any(|seen| seen == attr.name()) {
                continue;
            }
            bound.push(attr.name().to_string());

            let mut handler = DirectiveHandler::new(directive);
            handler.start(scope.clone(), variables, &self.cache)?;
            handlers.push(handler);
        }

        debug!(
            element = scope.element().id(),
            handlers = handlers.len(),
            "element bound"
        );
        Ok(handlers)
    }
}

impl fmt::Debug for Binder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("directives", &self.registry.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
