//! Benchmarks for expression parsing and evaluation.
//!
//! Run with: cargo bench -p weft-expr

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use weft_core::Value;
use weft_expr::{ExprCache, evaluate, parse};
use weft_reactive::VarContext;

const INPUTS: &[(&str, &str)] = &[
    ("ident", "visible"),
    ("path", "user.profile.address.city"),
    ("computed", "rows[selected].cells[column]"),
    ("statement", "draft = { title: form.title, saved: false }"),
    ("loop", "(item, i) in board.columns"),
];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("expr/parse");

    for (label, src) in INPUTS {
        group.bench_with_input(BenchmarkId::new("cold", label), src, |b, src| {
            b.iter(|| black_box(parse(src)))
        });
    }

    group.finish();
}

fn bench_cached_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("expr/cache");

    let cache = ExprCache::new();
    for (_, src) in INPUTS {
        cache.parse(src).unwrap();
    }
    for (label, src) in INPUTS {
        group.bench_with_input(BenchmarkId::new("warm", label), src, |b, src| {
            b.iter(|| black_box(cache.parse(src)))
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("expr/evaluate");

    let ctx = VarContext::from_entries([
        (
            "user",
            Value::map([(
                "profile",
                Value::map([(
                    "address",
                    Value::map([("city", Value::from("london"))]),
                )]),
            )]),
        ),
        (
            "rows",
            Value::list((0..64).map(|i| {
                Value::map([
                    ("title", Value::from(format!("row {i}"))),
                    ("done", Value::from(i % 2 == 0)),
                ])
            })),
        ),
        ("selected", Value::from(31)),
    ]);

    let deep = parse("user.profile.address.city").unwrap();
    group.bench_function("static_path", |b| {
        b.iter(|| black_box(evaluate(&deep, &ctx, false)))
    });

    let computed = parse("rows[selected].title").unwrap();
    group.bench_function("computed_path", |b| {
        b.iter(|| black_box(evaluate(&computed, &ctx, false)))
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_cached_parse, bench_evaluate);

criterion_main!(benches);
