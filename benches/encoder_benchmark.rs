//! Benchmark of encoder fitting and transformation
//!
//! Run with: cargo bench --bench encoder_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use polars::prelude::*;
use rand::prelude::*;
use rand::SeedableRng;

use dropout_risk::pipeline::{EncoderState, FeatureTaxonomy};

const PROVINCES: [&str; 6] = ["RM", "MI", "NA", "TO", "PA", "ND"];

/// A synthetic table covering every feature group of the INVALSI taxonomy
fn generate_test_dataframe(n_rows: usize, seed: u64) -> DataFrame {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);

    let sex: Vec<&str> = (0..n_rows)
        .map(|_| if rng.gen::<bool>() { "F" } else { "M" })
        .collect();
    let province: Vec<&str> = (0..n_rows)
        .map(|_| PROVINCES[rng.gen_range(0..PROVINCES.len())])
        .collect();
    let school: Vec<i64> = (0..n_rows).map(|_| rng.gen_range(1000..1200)).collect();
    let pon: Vec<bool> = (0..n_rows).map(|_| rng.gen::<f64>() < 0.3).collect();
    let students: Vec<i64> = (0..n_rows).map(|_| rng.gen_range(10..30)).collect();
    let score = |rng: &mut StdRng| -> Vec<f64> {
        (0..n_rows).map(|_| rng.gen_range(4.0..10.0)).collect()
    };
    let written_math = score(&mut rng);
    let oral_math = score(&mut rng);
    let wle: Vec<f64> = (0..n_rows).map(|_| rng.gen_range(100.0..300.0)).collect();
    let levels: Vec<i64> = (0..n_rows).map(|_| rng.gen_range(0..=5)).collect();

    df! {
        "sesso" => sex,
        "sigla_provincia_istat" => province,
        "CODICE_SCUOLA" => school,
        "Pon" => pon,
        "n_stud_prev" => students,
        "voto_scritto_mat" => written_math,
        "voto_orale_mat" => oral_math,
        "WLE_MAT_200" => wle,
        "LIVELLI" => levels,
    }
    .expect("Failed to create DataFrame")
}

fn benchmark_encoder(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoder");

    for n_rows in [1_000, 10_000, 50_000] {
        let df = generate_test_dataframe(n_rows, 42);
        let taxonomy = FeatureTaxonomy::invalsi().restricted_to(&df);
        let encoder = EncoderState::fit(&df, &taxonomy).expect("Failed to fit encoder");
        group.throughput(Throughput::Elements(n_rows as u64));

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &df, |b, df| {
            b.iter(|| EncoderState::fit(black_box(df), black_box(&taxonomy)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("transform", n_rows), &df, |b, df| {
            b.iter(|| encoder.transform(black_box(df)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_encoder);
criterion_main!(benches);
