//! Tests for missing value resolution

use polars::prelude::*;

use dropout_risk::pipeline::{
    analyze_missing_values, resolve_missing_values, FillPolicy, NOT_AVAILABLE, PROVINCE_COLUMN,
};

mod common;

use common::*;

fn math_scores(df: &DataFrame) -> Vec<f64> {
    df.column("voto_scritto_mat")
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

#[test]
fn test_mean_policy_fills_score_nulls() {
    let (resolved, report) = resolve_missing_values(invalsi_frame(14), FillPolicy::Mean).unwrap();

    assert_eq!(resolved.height(), 14);
    assert_eq!(resolved.column("voto_scritto_mat").unwrap().null_count(), 0);
    assert_eq!(report.filled.len(), 1);
    assert_eq!(report.filled[0].column, "voto_scritto_mat");
    assert_eq!(report.filled[0].filled, 2);
    assert!((report.filled[0].value - 6.0).abs() < 1e-12);

    let scores = math_scores(&resolved);
    assert!((scores[3] - 6.0).abs() < 1e-12);
    assert!((scores[10] - 6.0).abs() < 1e-12);
    assert_eq!(scores[0], 4.0);
}

#[test]
fn test_median_policy_fills_score_nulls() {
    let (resolved, report) =
        resolve_missing_values(invalsi_frame(14), FillPolicy::Median).unwrap();

    assert!((report.filled[0].value - 5.5).abs() < 1e-12);
    assert!((math_scores(&resolved)[3] - 5.5).abs() < 1e-12);
}

#[test]
fn test_remove_policy_drops_italian_scores_and_rows() {
    let (resolved, report) =
        resolve_missing_values(invalsi_frame(14), FillPolicy::Remove).unwrap();

    assert_eq!(resolved.height(), 12);
    assert_eq!(report.dropped_rows, 2);
    assert_eq!(
        report.dropped_columns,
        vec!["voto_scritto_ita".to_string(), "voto_orale_ita".to_string()]
    );
    assert!(resolved.column("voto_scritto_ita").is_err());
    assert!(resolved.column("voto_orale_ita").is_err());
    assert_eq!(resolved.column("voto_scritto_mat").unwrap().null_count(), 0);
}

#[test]
fn test_unknown_province_becomes_sentinel() {
    let (resolved, report) = resolve_missing_values(invalsi_frame(10), FillPolicy::Mean).unwrap();

    assert_eq!(report.provinces_filled, 2);
    let provinces: Vec<&str> = resolved
        .column(PROVINCE_COLUMN)
        .unwrap()
        .str()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert_eq!(provinces[0], NOT_AVAILABLE);
    assert_eq!(provinces[5], NOT_AVAILABLE);
    assert_eq!(provinces[1], "RM");
}

#[test]
fn test_resolution_is_idempotent() {
    for policy in [FillPolicy::Remove, FillPolicy::Mean, FillPolicy::Median] {
        let (once, _) = resolve_missing_values(invalsi_frame(20), policy).unwrap();
        let (twice, report) = resolve_missing_values(once.clone(), policy).unwrap();

        assert!(twice.equals_missing(&once), "policy {} changed the table", policy);
        assert!(report.filled.is_empty());
        assert!(report.dropped_columns.is_empty());
        assert_eq!(report.dropped_rows, 0);
        assert_eq!(report.provinces_filled, 0);
    }
}

#[test]
fn test_analyze_missing_values_sorted_descending() {
    let ratios = analyze_missing_values(&invalsi_frame(10)).unwrap();

    assert_eq!(ratios[0].0, PROVINCE_COLUMN);
    assert!((ratios[0].1 - 0.2).abs() < 1e-12);
    assert_eq!(ratios[1].0, "voto_scritto_mat");
    assert!((ratios[1].1 - 0.1).abs() < 1e-12);
    assert!(ratios[2..].iter().all(|(_, ratio)| *ratio == 0.0));
}
