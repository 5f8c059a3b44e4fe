//! Tests for the heterogeneous feature encoder

use faer::Mat;
use polars::prelude::*;

use dropout_risk::pipeline::EncoderState;

mod common;

use common::*;

fn values(m: &Mat<f64>) -> Vec<f64> {
    (0..m.nrows())
        .flat_map(|i| (0..m.ncols()).map(move |j| m[(i, j)]))
        .collect()
}

fn column_of(names: &[String], name: &str) -> usize {
    names.iter().position(|n| n == name).unwrap()
}

#[test]
fn test_width_and_feature_order() {
    let (df, taxonomy) = model_ready_frame(24, 2);
    let encoder = EncoderState::fit(&df, &taxonomy).unwrap();

    // 1 boolean + 1 ordinal + 4 continuous + 3 schools + 2 sexes + 3 provinces
    assert_eq!(encoder.width(), 14);
    assert_eq!(
        encoder.feature_names(),
        vec![
            "Pon",
            "n_stud_prev",
            "voto_orale_ita",
            "voto_orale_mat",
            "voto_scritto_ita",
            "voto_scritto_mat",
            "CODICE_SCUOLA=100",
            "CODICE_SCUOLA=101",
            "CODICE_SCUOLA=102",
            "sesso=F",
            "sesso=M",
            "sigla_provincia_istat=MI",
            "sigla_provincia_istat=ND",
            "sigla_provincia_istat=RM",
        ]
    );

    let features = encoder.transform(&df).unwrap();
    assert_eq!(features.nrows(), 24);
    assert_eq!(features.ncols(), encoder.width());
}

#[test]
fn test_encoding_is_deterministic() {
    let (df, taxonomy) = model_ready_frame(30, 3);
    let a = EncoderState::fit(&df, &taxonomy).unwrap();
    let b = EncoderState::fit(&df, &taxonomy).unwrap();
    assert_eq!(a, b);

    let x = a.transform(&df).unwrap();
    let y = b.transform(&df).unwrap();
    assert_eq!(values(&x), values(&y));
}

#[test]
fn test_numeric_columns_are_standardised_on_training() {
    let (df, taxonomy) = model_ready_frame(30, 3);
    let encoder = EncoderState::fit(&df, &taxonomy).unwrap();
    let features = encoder.transform(&df).unwrap();
    let names = encoder.feature_names();

    for name in ["n_stud_prev", "voto_orale_mat", "voto_scritto_ita"] {
        let j = column_of(&names, name);
        let values: Vec<f64> = (0..features.nrows()).map(|i| features[(i, j)]).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        assert!(mean.abs() < 1e-9, "{} mean {}", name, mean);
        assert!((variance - 1.0).abs() < 1e-9, "{} variance {}", name, variance);
    }
}

#[test]
fn test_one_hot_rows_and_unseen_categories() {
    let (df, taxonomy) = model_ready_frame(24, 2);
    let encoder = EncoderState::fit(&df, &taxonomy).unwrap();
    let names = encoder.feature_names();

    let mut unseen = df.head(Some(2));
    unseen
        .with_column(Column::new("sesso".into(), ["X", "F"]))
        .unwrap();
    unseen
        .with_column(Column::new("CODICE_SCUOLA".into(), [999i64, 101]))
        .unwrap();
    let features = encoder.transform(&unseen).unwrap();

    let sex_f = column_of(&names, "sesso=F");
    let sex_m = column_of(&names, "sesso=M");
    let school = column_of(&names, "CODICE_SCUOLA=100");

    // unseen values encode as an all-zero block
    assert_eq!(features[(0, sex_f)], 0.0);
    assert_eq!(features[(0, sex_m)], 0.0);
    assert_eq!(
        (school..school + 3).map(|j| features[(0, j)]).sum::<f64>(),
        0.0
    );

    assert_eq!(features[(1, sex_f)], 1.0);
    assert_eq!(features[(1, school + 1)], 1.0);
}

#[test]
fn test_missing_feature_column_fails() {
    let (df, taxonomy) = model_ready_frame(24, 2);
    let encoder = EncoderState::fit(&df, &taxonomy).unwrap();

    let partial = df.drop("voto_orale_mat").unwrap();
    let result = encoder.transform(&partial);
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("voto_orale_mat"));
}

#[test]
fn test_encoder_state_serializes() {
    let (df, taxonomy) = model_ready_frame(24, 2);
    let encoder = EncoderState::fit(&df, &taxonomy).unwrap();

    let json = serde_json::to_string(&encoder).unwrap();
    let restored: EncoderState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.feature_names(), encoder.feature_names());
    let restored_values = values(&restored.transform(&df).unwrap());
    let original_values = values(&encoder.transform(&df).unwrap());
    for (a, b) in restored_values.iter().zip(&original_values) {
        assert!((a - b).abs() < 1e-9);
    }
}
