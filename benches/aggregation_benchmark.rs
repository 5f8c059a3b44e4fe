//! Benchmark of question → competency aggregation over growing exports
//!
//! Run with: cargo bench --bench aggregation_benchmark

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use dropout_risk::pipeline::{aggregate_competencies, CompetencyMapping};

const TAGS: [&str; 6] = [
    "NUMERI",
    "SPAZIO_FIGURE",
    "DATI_PREVISIONI",
    "RELAZIONI_FUNZIONI",
    "CONOSCERE",
    "RISOLVERE_PROBLEMI",
];

/// Every question tags one content area and one process
fn generate_mapping(n_questions: usize) -> CompetencyMapping {
    let questions: BTreeMap<String, Vec<String>> = (0..n_questions)
        .map(|q| {
            (
                format!("D{}", q + 1),
                vec![TAGS[q % 4].to_string(), TAGS[4 + q % 2].to_string()],
            )
        })
        .collect();
    CompetencyMapping::new(questions).expect("Failed to build mapping")
}

/// Random 0/1 answers, roughly 60% correct
fn generate_answers(n_rows: usize, n_questions: usize, seed: u64) -> DataFrame {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut columns: Vec<Column> = Vec::with_capacity(n_questions + 1);
    let levels: Vec<i64> = (0..n_rows).map(|_| rng.gen_range(0..=5)).collect();
    columns.push(Column::new("LIVELLI".into(), levels));

    for q in 0..n_questions {
        let answers: Vec<i64> = (0..n_rows)
            .map(|_| i64::from(rng.gen::<f64>() < 0.6))
            .collect();
        columns.push(Column::new(format!("D{}", q + 1).into(), answers));
    }

    DataFrame::new(columns).expect("Failed to create DataFrame")
}

fn benchmark_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_competencies");
    let n_questions = 40;
    let mapping = generate_mapping(n_questions);

    for n_rows in [1_000, 10_000, 50_000] {
        let df = generate_answers(n_rows, n_questions, 42);
        group.throughput(Throughput::Elements(n_rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_rows), &df, |b, df| {
            b.iter(|| aggregate_competencies(black_box(df), black_box(&mapping)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_aggregation);
criterion_main!(benches);
