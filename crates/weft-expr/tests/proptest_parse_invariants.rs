//! Property tests for the expression parser.
//!
//! Invariants under test:
//!
//! 1. Parsing is deterministic: the same input yields the same result,
//!    success or failure.
//! 2. The parser never panics, whatever bytes it is fed.
//! 3. A static identifier chain parses to an expression whose root and
//!    segments reproduce the input components.
//! 4. The dependency list is the closure over every path root in the
//!    input (computed segments and right-hand sides included), duplicates
//!    collapsed, first-appearance order preserved.

use proptest::prelude::*;
use weft_expr::{ExprKind, ParsedExpr, PathSegment, parse};

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,5}".prop_filter("reserved word", |s| {
        !matches!(s.as_str(), "true" | "false" | "null" | "in")
    })
}

fn chain() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(ident(), 1..5)
}

fn dedup_in_order(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn static_keys(parsed: &ParsedExpr) -> Vec<String> {
    parsed
        .path()
        .iter()
        .map(|seg| match seg {
            PathSegment::Static(key) => key.clone(),
            PathSegment::Dynamic(_) => panic!("expected a static segment"),
        })
        .collect()
}

proptest! {
    #[test]
    fn parsing_is_deterministic(src in "\\PC{0,40}") {
        prop_assert_eq!(parse(&src), parse(&src));
    }

    #[test]
    fn never_panics_on_junk(src in prop::string::string_regex(".{0,64}").unwrap()) {
        let _ = parse(&src);
    }

    #[test]
    fn static_chains_reproduce_their_components(parts in chain()) {
        let src = parts.join(".");
        let parsed = parse(&src).unwrap();

        prop_assert_eq!(parsed.kind(), ExprKind::Expression);
        prop_assert_eq!(parsed.var_name(), parts[0].as_str());
        prop_assert_eq!(static_keys(&parsed), parts[1..].to_vec());
        prop_assert_eq!(parsed.dependencies(), &[parts[0].clone()]);
    }

    #[test]
    fn computed_segments_join_the_dependency_closure(
        root in ident(),
        keys in prop::collection::vec(ident(), 1..4),
    ) {
        let src = keys.iter().fold(root.clone(), |acc, k| format!("{acc}[{k}]"));
        let parsed = parse(&src).unwrap();

        let mut expected = vec![root];
        expected.extend(keys);
        let expected = dedup_in_order(expected);
        prop_assert_eq!(parsed.dependencies(), expected.as_slice());
    }

    #[test]
    fn statements_union_both_sides(lhs in chain(), rhs in chain()) {
        let src = format!("{} = {}", lhs.join("."), rhs.join("."));
        let parsed = parse(&src).unwrap();

        prop_assert_eq!(parsed.kind(), ExprKind::Statement);
        let expected = dedup_in_order([lhs[0].clone(), rhs[0].clone()]);
        prop_assert_eq!(parsed.dependencies(), expected.as_slice());
    }

    #[test]
    fn loops_depend_only_on_their_collection(
        item in ident(),
        index in ident(),
        collection in chain(),
    ) {
        let src = format!("({item}, {index}) in {}", collection.join("."));
        let parsed = parse(&src).unwrap();

        prop_assert_eq!(parsed.kind(), ExprKind::Loop);
        prop_assert_eq!(parsed.dependencies(), &[collection[0].clone()]);
        let binding = parsed.loop_binding().unwrap();
        prop_assert_eq!(binding.item.as_str(), item.as_str());
        prop_assert_eq!(binding.index.as_deref(), Some(index.as_str()));
    }

    #[test]
    fn surrounding_whitespace_is_ignored(parts in chain(), pad in "[ \\t]{0,3}") {
        let src = parts.join(".");
        let padded = format!("{pad}{src}{pad}");
        prop_assert_eq!(parse(&padded), parse(&src));
    }
}
