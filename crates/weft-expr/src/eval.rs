#![forbid(unsafe_code)]

//! Expression evaluation and path writes.
//!
//! # Design
//!
//! [`evaluate`] resolves a [`ParsedExpr`] against a [`VarContext`]: the root
//! variable is looked up by name, then the path is walked key by key.
//! Reading is tolerant: any nullish value along the path short-circuits the
//! whole walk to `Value::Null`, and reading a property off a scalar yields
//! `Null` rather than an error. Writing is strict: [`set_path`] refuses to
//! write through anything that is not a container, and only creates missing
//! intermediate maps when the write originates from a statement form.
//!
//! A resolved function value is invoked with no arguments and its return
//! value substituted, unless `preserve_functions` asks for the handle
//! itself (event-handler style bindings need the function, not its result).
//!
//! # Failure Modes
//!
//! - **Unknown root**: the one read error. A missing variable name is a
//!   wiring bug, not missing data, and surfaces as
//!   [`EvalError::UnknownVariable`].
//! - **Write through a scalar**: [`EvalError::NotAContainer`], carrying the
//!   offending key and the shape found there.
//! - **Failed write**: the target variable is untouched; writes build on a
//!   copy and commit in one `set` at the end.

use thiserror::Error;
use tracing::{debug, trace};
use weft_core::Value;
use weft_reactive::{VarContext, Variable};

use crate::parse::{AssignValue, ExprKind, LoopBinding, ParsedExpr, PathSegment};

/// Evaluation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },
    #[error("cannot write through `{key}`: not a container (found {found})")]
    NotAContainer { key: String, found: &'static str },
    #[error("invalid list index `{key}`")]
    InvalidIndex { key: String },
    #[error("list index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("cannot write to an empty path")]
    EmptyPath,
    #[error("`{kind}` is not a loop form")]
    NotALoop { kind: ExprKind },
    #[error("cannot iterate over a {found} collection")]
    NotIterable { found: &'static str },
    #[error("`{kind}` is not a statement")]
    NotAStatement { kind: ExprKind },
}

/// Evaluate an expression against a context.
///
/// Expression forms resolve their path. Loop forms resolve the collection
/// the path points at. Statement forms evaluate their right-hand side (the
/// write itself happens in [`assign`]).
pub fn evaluate(
    parsed: &ParsedExpr,
    ctx: &VarContext,
    preserve_functions: bool,
) -> Result<Value, EvalError> {
    match parsed.assign_value() {
        Some(value) => eval_assign_value(value, ctx, preserve_functions),
        None => Ok(finish(resolve_path(parsed, ctx)?, preserve_functions)),
    }
}

fn finish(value: Value, preserve_functions: bool) -> Value {
    if preserve_functions {
        return value;
    }
    match value {
        Value::Func(f) => f(),
        other => other,
    }
}

fn resolve_path(parsed: &ParsedExpr, ctx: &VarContext) -> Result<Value, EvalError> {
    let variable = ctx
        .get(parsed.var_name())
        .ok_or_else(|| EvalError::UnknownVariable {
            name: parsed.var_name().to_string(),
        })?;
    let mut current = variable.get();
    for segment in parsed.path() {
        if current.is_null() {
            return Ok(Value::Null);
        }
        let key = segment_key(segment, ctx)?;
        current = current.get(&key).cloned().unwrap_or(Value::Null);
    }
    Ok(current)
}

fn segment_key(segment: &PathSegment, ctx: &VarContext) -> Result<String, EvalError> {
    match segment {
        PathSegment::Static(key) => Ok(key.clone()),
        PathSegment::Dynamic(sub) => Ok(evaluate(sub, ctx, false)?.key_string()),
    }
}

fn eval_assign_value(
    value: &AssignValue,
    ctx: &VarContext,
    preserve_functions: bool,
) -> Result<Value, EvalError> {
    match value {
        AssignValue::Literal(v) => Ok(v.clone()),
        AssignValue::Expr(sub) => evaluate(sub, ctx, preserve_functions),
        AssignValue::Object(entries) => {
            let mut evaluated = Vec::with_capacity(entries.len());
            for (key, entry) in entries {
                evaluated.push((
                    key.clone(),
                    eval_assign_value(entry, ctx, preserve_functions)?,
                ));
            }
            Ok(Value::map(evaluated))
        }
    }
}

// ---------------------------------------------------------------------------
// Loop sequences
// ---------------------------------------------------------------------------

/// View of a loop form over a live context.
///
/// The collection is not resolved until [`iter`](LoopSequence::iter) is
/// called, and every call re-resolves it: a sequence stays valid across
/// context changes and always iterates the current collection.
#[derive(Debug)]
pub struct LoopSequence<'a> {
    parsed: &'a ParsedExpr,
    ctx: &'a VarContext,
    binding: &'a LoopBinding,
}

/// One pass over a resolved collection, yielding `(item, index)` pairs.
/// Lists index by number, maps by key string.
#[derive(Debug)]
pub struct LoopItems {
    pairs: std::vec::IntoIter<(Value, Value)>,
}

/// Build a [`LoopSequence`] for a loop-kind expression.
pub fn loop_sequence<'a>(
    parsed: &'a ParsedExpr,
    ctx: &'a VarContext,
) -> Result<LoopSequence<'a>, EvalError> {
    match parsed.loop_binding() {
        Some(binding) => Ok(LoopSequence {
            parsed,
            ctx,
            binding,
        }),
        None => Err(EvalError::NotALoop {
            kind: parsed.kind(),
        }),
    }
}

impl LoopSequence<'_> {
    /// The item/index names this loop introduces for its body's scope.
    #[must_use]
    pub fn binding(&self) -> &LoopBinding {
        self.binding
    }

    /// Resolve the collection now and iterate it.
    ///
    /// A nullish collection iterates as empty (the tolerant read path);
    /// any other non-container shape is [`EvalError::NotIterable`].
    pub fn iter(&self) -> Result<LoopItems, EvalError> {
        let collection = evaluate(self.parsed, self.ctx, false)?;
        let pairs: Vec<(Value, Value)> = match collection {
            Value::Null => Vec::new(),
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (item, Value::Number(i as f64)))
                .collect(),
            Value::Map(map) => map.into_iter().map(|(k, v)| (v, Value::Str(k))).collect(),
            other => {
                return Err(EvalError::NotIterable {
                    found: other.type_name(),
                });
            }
        };
        Ok(LoopItems {
            pairs: pairs.into_iter(),
        })
    }
}

impl Iterator for LoopItems {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.pairs.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pairs.size_hint()
    }
}

impl ExactSizeIterator for LoopItems {}

// ---------------------------------------------------------------------------
// Path writes
// ---------------------------------------------------------------------------

/// Resolve every path segment to its key string and join with dots.
///
/// Dynamic segments read the live context, so the result reflects their
/// current values. The root name is not included; an empty path gives an
/// empty string.
pub fn resolved_path_string(parsed: &ParsedExpr, ctx: &VarContext) -> Result<String, EvalError> {
    let mut out = String::new();
    for segment in parsed.path() {
        let key = segment_key(segment, ctx)?;
        if !out.is_empty() {
            out.push('.');
        }
        out.push_str(&key);
    }
    Ok(out)
}

/// Write `value` at the dot-joined `path` below `variable`'s current value.
///
/// With `create_missing`, nullish intermediate slots (including a nullish
/// root) become empty maps on the way down; without it they are write
/// errors. List slots accept in-bounds indices and the one-past-end index
/// (append). The variable is `set` once at the end, so subscribers see a
/// single change and an equal result is deduplicated as usual.
pub fn set_path(
    variable: &Variable,
    path: &str,
    value: Value,
    create_missing: bool,
) -> Result<(), EvalError> {
    if path.is_empty() {
        return Err(EvalError::EmptyPath);
    }
    let keys: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = keys.split_last() else {
        return Err(EvalError::EmptyPath);
    };

    let mut root = variable.get();
    if root.is_null() && create_missing {
        root = Value::empty_map();
    }
    {
        let mut cursor = &mut root;
        for key in parents {
            cursor = descend_mut(cursor, key, create_missing)?;
        }
        write_key(cursor, last, value)?;
    }
    trace!(path, create_missing, "path write");
    variable.set(root);
    Ok(())
}

fn descend_mut<'v>(
    value: &'v mut Value,
    key: &str,
    create_missing: bool,
) -> Result<&'v mut Value, EvalError> {
    let slot = match value {
        Value::Map(map) => {
            if !map.contains_key(key) {
                if !create_missing {
                    return Err(EvalError::NotAContainer {
                        key: key.to_string(),
                        found: "null",
                    });
                }
                map.insert(key.to_string(), Value::empty_map());
            }
            match map.get_mut(key) {
                Some(slot) => slot,
                None => {
                    return Err(EvalError::NotAContainer {
                        key: key.to_string(),
                        found: "null",
                    });
                }
            }
        }
        Value::List(items) => {
            let len = items.len();
            let index = key
                .parse::<usize>()
                .map_err(|_| EvalError::InvalidIndex {
                    key: key.to_string(),
                })?;
            if index == len && create_missing {
                items.push(Value::empty_map());
            } else if index >= len {
                return Err(EvalError::IndexOutOfBounds { index, len });
            }
            &mut items[index]
        }
        other => {
            return Err(EvalError::NotAContainer {
                key: key.to_string(),
                found: other.type_name(),
            });
        }
    };
    if slot.is_null() {
        if !create_missing {
            return Err(EvalError::NotAContainer {
                key: key.to_string(),
                found: "null",
            });
        }
        *slot = Value::empty_map();
    }
    if matches!(slot, Value::Map(_) | Value::List(_)) {
        Ok(slot)
    } else {
        Err(EvalError::NotAContainer {
            key: key.to_string(),
            found: slot.type_name(),
        })
    }
}

fn write_key(target: &mut Value, key: &str, value: Value) -> Result<(), EvalError> {
    match target {
        Value::Map(map) => {
            map.insert(key.to_string(), value);
            Ok(())
        }
        Value::List(items) => {
            let len = items.len();
            let index = key
                .parse::<usize>()
                .map_err(|_| EvalError::InvalidIndex {
                    key: key.to_string(),
                })?;
            if index < len {
                items[index] = value;
                Ok(())
            } else if index == len {
                items.push(value);
                Ok(())
            } else {
                Err(EvalError::IndexOutOfBounds { index, len })
            }
        }
        other => Err(EvalError::NotAContainer {
            key: key.to_string(),
            found: other.type_name(),
        }),
    }
}

/// Execute a statement: evaluate its right-hand side and write it at the
/// target path, creating intermediates as needed.
///
/// An object right-hand side merges entry by entry under the target, so
/// sibling keys already present there survive. Any other right-hand side
/// replaces the value at the target path (or the whole variable when the
/// path is empty).
pub fn assign(parsed: &ParsedExpr, ctx: &VarContext) -> Result<(), EvalError> {
    let Some(value) = parsed.assign_value() else {
        return Err(EvalError::NotAStatement {
            kind: parsed.kind(),
        });
    };
    let variable = ctx
        .get(parsed.var_name())
        .ok_or_else(|| EvalError::UnknownVariable {
            name: parsed.var_name().to_string(),
        })?;
    let base = resolved_path_string(parsed, ctx)?;
    debug!(var = parsed.var_name(), path = base.as_str(), "assign");

    match value {
        AssignValue::Object(entries) => {
            for (key, entry) in entries {
                let entry_value = eval_assign_value(entry, ctx, false)?;
                let path = if base.is_empty() {
                    key.clone()
                } else {
                    format!("{base}.{key}")
                };
                set_path(&variable, &path, entry_value, true)?;
            }
            Ok(())
        }
        other => {
            let new_value = eval_assign_value(other, ctx, false)?;
            if base.is_empty() {
                variable.set(new_value);
                Ok(())
            } else {
                set_path(&variable, &base, new_value, true)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
