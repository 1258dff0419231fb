//! Generation benchmarks for pbt_core.
//!
//! Run with: `cargo bench -p pbt_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pbt_core::prelude::*;

/// Benchmarks candidate generation and a full passing run.
pub fn generation_benchmark(c: &mut Criterion) {
    let strategy = integers();
    c.bench_function("generate_1000_integers", |b| {
        b.iter(|| {
            let seed = Seed::Explicit(black_box(42));
            generate(&seed, &strategy)
                .accepted()
                .take(1000)
                .fold(0i64, i64::wrapping_add)
        })
    });

    let vectors = vecs(integers_in(0, 255).unwrap_or_else(|e| panic!("{e}")), 0, 32)
        .unwrap_or_else(|e| panic!("{e}"));
    c.bench_function("run_100_examples", |b| {
        let runner = Runner::default().with_forced_seed(Some(SeedArg::Int(7)));
        b.iter(|| {
            let mut reporter = Reporter::new(std::io::sink());
            let outcome = runner.run("bench_sum", &mut reporter, |tc| {
                let v = tc.draw(&vectors)?;
                black_box(v.iter().sum::<i64>());
                Ok(())
            });
            black_box(outcome.stats)
        })
    });
}

criterion_group!(benches, generation_benchmark);
criterion_main!(benches);
