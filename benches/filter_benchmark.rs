//! Benchmark for evaluation, filtering and translation
//!
//! Target: filtering 10k records with the demo expression in <5ms

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use predicate_composer::{
    field_ref, lookup, not, parse, to_sql, Dialect, Expression, ExpressionCache, Record, RecordSet,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TYPES: [&str; 7] = ["italian", "mexican", "chinese", "american", "french", "indian", "thai"];
const WORDS: [&str; 8] = ["Grill", "Cafe", "Kitchen", "Palace", "Wok", "House", "Express", "Spice"];

/// Create a realistic restaurant/sales table
fn create_records(count: usize) -> RecordSet {
    let mut rng = StdRng::seed_from_u64(42);
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    (0..count)
        .map(|i| {
            let word = WORDS[rng.gen_range(0..WORDS.len())];
            let name = if rng.gen_bool(0.2) {
                format!("{} {} {}", word, i, rng.gen_range(1..999))
            } else {
                format!("The {} {}", word, WORDS[i % WORDS.len()])
            };
            Record::new()
                .with("name", name)
                .with("restaurant_type", TYPES[rng.gen_range(0..TYPES.len())])
                .with("date_opened", base + chrono::Duration::days(rng.gen_range(0..365)))
                .with("income", rng.gen_range(500..10_000))
                .with("expenditure", rng.gen_range(500..10_000))
        })
        .collect()
}

/// The combined demo filter
fn demo_expression() -> Expression {
    let cutoff = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
    let italian_mexican =
        lookup("restaurant_type", "italian").unwrap() | lookup("restaurant_type", "mexican").unwrap();
    let recent = lookup("date_opened__gte", cutoff).unwrap();
    let profitable = lookup("income__gt", field_ref("expenditure")).unwrap();
    let digit_name = lookup("name__regex", "[0-9]+").unwrap();

    (italian_mexican | recent) & (profitable | digit_name) & not(lookup("name__icontains", "grill").unwrap())
}

fn benchmark_filter(c: &mut Criterion) {
    let records = create_records(10_000);
    let expr = demo_expression();

    c.bench_function("filter_10k_records", |b| {
        b.iter(|| records.count(black_box(&expr)).unwrap())
    });

    let first = records.iter().next().unwrap().clone();
    c.bench_function("evaluate_single_record", |b| {
        b.iter(|| black_box(&expr).evaluate(black_box(&first)).unwrap())
    });
}

fn benchmark_parse(c: &mut Criterion) {
    let text = expr_text();

    c.bench_function("parse_expression", |b| b.iter(|| parse(black_box(&text)).unwrap()));

    let cache = ExpressionCache::new();
    c.bench_function("parse_expression_cached", |b| {
        b.iter(|| cache.get_or_parse(black_box(&text)).unwrap())
    });
}

fn benchmark_translate(c: &mut Criterion) {
    let expr = demo_expression();

    c.bench_function("to_sql_postgres", |b| {
        b.iter(|| to_sql(black_box(&expr), Dialect::Postgres).unwrap())
    });

    c.bench_function("simplify", |b| b.iter(|| black_box(&expr).simplify()));
}

fn expr_text() -> String {
    demo_expression().to_string()
}

criterion_group!(benches, benchmark_filter, benchmark_parse, benchmark_translate);
criterion_main!(benches);
