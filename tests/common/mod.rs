//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use dropout_risk::pipeline::{
    ensure_dropout_column, resolve_missing_values, save_dataset, select_columns, FeatureKind,
    FeatureTaxonomy, FillPolicy,
};

/// Question → competency table used by the fixtures
pub const MAPPING_JSON: &str = r#"{
    "D1": ["CONOSCERE", "NUMERI"],
    "D2": ["NUMERI"],
    "D3": ["SPAZIO"]
}"#;

/// A small INVALSI-shaped export with `n` records.
///
/// - `LIVELLI` cycles through 0..=5, so half of the records are dropouts
/// - `voto_scritto_mat` is null on every 7th record
/// - `sigla_provincia_istat` is null on every 5th record
/// - `D1`..`D3` are 0/1 question answers, `Unnamed: 0` is an index artifact
pub fn invalsi_frame(n: usize) -> DataFrame {
    let index: Vec<i64> = (0..n as i64).collect();
    let levels: Vec<i64> = (0..n).map(|i| (i % 6) as i64).collect();
    let sex: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "F" } else { "M" }).collect();
    let school: Vec<i64> = (0..n).map(|i| 100 + (i % 3) as i64).collect();
    let pon: Vec<bool> = (0..n).map(|i| i % 4 == 0).collect();
    let students: Vec<i64> = (0..n).map(|i| 15 + (i % 10) as i64).collect();
    let written_math: Vec<Option<f64>> = (0..n)
        .map(|i| {
            if i % 7 == 3 {
                None
            } else {
                Some(4.0 + (i % 6) as f64)
            }
        })
        .collect();
    let oral_math: Vec<f64> = (0..n).map(|i| 5.0 + (i % 5) as f64).collect();
    let written_ita: Vec<f64> = (0..n).map(|i| 6.0 + (i % 4) as f64).collect();
    let oral_ita: Vec<f64> = (0..n).map(|i| 6.0 + (i % 3) as f64).collect();
    let province: Vec<Option<&str>> = (0..n)
        .map(|i| match i % 5 {
            0 => None,
            1 | 2 => Some("RM"),
            _ => Some("MI"),
        })
        .collect();
    let d1: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
    let d2: Vec<i64> = (0..n).map(|i| ((i / 2) % 2) as i64).collect();
    let d3: Vec<i64> = (0..n).map(|i| (i % 3 == 0) as i64).collect();

    df! {
        "Unnamed: 0" => index,
        "sesso" => sex,
        "CODICE_SCUOLA" => school,
        "Pon" => pon,
        "n_stud_prev" => students,
        "voto_scritto_ita" => written_ita,
        "voto_orale_ita" => oral_ita,
        "voto_scritto_mat" => written_math,
        "voto_orale_mat" => oral_math,
        "sigla_provincia_istat" => province,
        "D1" => d1,
        "D2" => d2,
        "D3" => d3,
        "LIVELLI" => levels,
    }
    .unwrap()
}

/// The fixture with every `dropout_every`-th record at level 4 and the rest
/// at level 1, missing values resolved by mean and only taxonomy columns kept
pub fn model_ready_frame(n: usize, dropout_every: usize) -> (DataFrame, FeatureTaxonomy) {
    model_ready_frame_with(n, |i| i % dropout_every == 0)
}

/// Like [`model_ready_frame`], with the dropout records picked by `is_dropout`
pub fn model_ready_frame_with(
    n: usize,
    is_dropout: impl Fn(usize) -> bool,
) -> (DataFrame, FeatureTaxonomy) {
    let mut df = invalsi_frame(n);
    let levels: Vec<i64> = (0..n).map(|i| if is_dropout(i) { 4 } else { 1 }).collect();
    df.with_column(Column::new("LIVELLI".into(), levels)).unwrap();
    ensure_dropout_column(&mut df).unwrap();
    let (df, _) = resolve_missing_values(df, FillPolicy::Mean).unwrap();

    let taxonomy = FeatureTaxonomy::invalsi().restricted_to(&df);
    let mut kept = taxonomy.feature_columns();
    kept.extend(taxonomy.group(FeatureKind::Target));
    let df = select_columns(&df, &kept).unwrap();
    (df, taxonomy)
}

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// Write `df` as a `;`-separated CSV inside `dir`
pub fn write_csv(dir: &Path, name: &str, df: &DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut df = df.clone();
    save_dataset(&mut df, &path, b';').expect("Failed to write CSV");
    path
}

/// Write the fixture mapping inside `dir`
pub fn write_mapping(dir: &Path) -> PathBuf {
    let path = dir.join("mapping.json");
    std::fs::write(&path, MAPPING_JSON).expect("Failed to write mapping");
    path
}

/// Read the `id`-like i64 column of `df` as a vector
pub fn i64_values(df: &DataFrame, name: &str) -> Vec<i64> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}
