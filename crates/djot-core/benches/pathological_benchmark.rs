//! Parse time on adversarial inputs. Every case should scale linearly.
//!
//! Run with: cargo bench -p djot-core --bench pathological_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use djot_core::parse;

fn nested_brackets(n: usize) -> String {
    "[".repeat(n) + &"]".repeat(n)
}

fn unclosed_brackets(n: usize) -> String {
    "[a".repeat(n)
}

fn unclosed_destinations(n: usize) -> String {
    "[a](b".repeat(n)
}

fn openers(n: usize) -> String {
    "_a *b ".repeat(n)
}

fn alternating_closers(n: usize) -> String {
    "*_".repeat(n) + &"_*".repeat(n)
}

fn backtick_runs(n: usize) -> String {
    (1..=n.min(2000)).map(|k| "`".repeat(k) + "a").collect()
}

fn braced_openers(n: usize) -> String {
    "{_{*{=".repeat(n)
}

fn nested_quotes(n: usize) -> String {
    "> ".repeat(n.min(1000)) + "deep\n"
}

fn nested_lists(n: usize) -> String {
    (0..n.min(500)).map(|k| " ".repeat(k * 2) + "- item\n").collect()
}

const CASES: &[(&str, fn(usize) -> String)] = &[
    ("nested_brackets", nested_brackets),
    ("unclosed_brackets", unclosed_brackets),
    ("unclosed_destinations", unclosed_destinations),
    ("openers", openers),
    ("alternating_closers", alternating_closers),
    ("backtick_runs", backtick_runs),
    ("braced_openers", braced_openers),
    ("nested_quotes", nested_quotes),
    ("nested_lists", nested_lists),
];

fn bench_pathological(c: &mut Criterion) {
    let mut group = c.benchmark_group("pathological");
    group.sample_size(20);

    for (name, generate) in CASES {
        for n in [1_000, 10_000] {
            let input = generate(n);
            group.throughput(Throughput::Bytes(input.len() as u64));
            group.bench_with_input(BenchmarkId::new(*name, n), &input, |b, input| {
                b.iter(|| black_box(parse(black_box(input)).blocks.len()))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_pathological);
criterion_main!(benches);
