#![forbid(unsafe_code)]

//! Directive attribute names.
//!
//! Directives are addressed through element attributes of the form
//! `@name`, `@name:parameter`, or either followed by a run of
//! `.modifier` suffixes: `@class:active`, `@on:item-select.stop.prevent`.
//! [`AttrName::parse`] splits an attribute name into those parts;
//! anything that does not fit the pattern is simply not a directive
//! attribute.
//!
//! Matching is case-insensitive and every parsed part is normalized to
//! ASCII lowercase, so `@Class:Active` addresses the same directive and
//! parameter as `@class:active`.

use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;

/// `@name`, optional `:param` (hyphen-separated words), optional
/// `.modifier` run. Anchored so trailing junk fails the whole match.
static ATTR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^@([a-z]+)(?::((?:[a-z]+-)*[a-z]+))?((?:\.[a-z]+)*)$")
        .expect("attribute pattern is a valid regex")
});

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

/// Modifier flags parsed from an attribute name, kept in written order.
///
/// Modifiers are free-form hints for the directive behavior; the engine
/// itself never interprets them. Duplicates collapse to one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    entries: IndexSet<String>,
}

impl Modifiers {
    /// No modifiers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_suffix(suffix: &str) -> Self {
        let entries = suffix
            .split('.')
            .filter(|part| !part.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        Self { entries }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Modifier names in the order they were written.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// AttrName
// ---------------------------------------------------------------------------

/// A directive attribute name split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrName {
    name: String,
    param: Option<String>,
    modifiers: Modifiers,
}

impl AttrName {
    /// Split an attribute name into directive name, parameter, and
    /// modifiers. Returns `None` when the name does not follow the
    /// directive pattern, including names without the `@` prefix.
    #[must_use]
    pub fn parse(attr: &str) -> Option<Self> {
        let captures = ATTR_PATTERN.captures(attr)?;
        let name = captures[1].to_ascii_lowercase();
        let param = captures.get(2).map(|m| m.as_str().to_ascii_lowercase());
        let modifiers = captures
            .get(3)
            .map(|m| Modifiers::from_suffix(m.as_str()))
            .unwrap_or_default();
        Some(Self {
            name,
            param,
            modifiers,
        })
    }

    /// The directive name, lowercased.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `:parameter` part, when present.
    #[must_use]
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    #[must_use]
    pub fn modifiers(&self) -> &Modifiers {
        &self.modifiers
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
