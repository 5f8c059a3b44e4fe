//! Tests for dataset loading and saving

use polars::prelude::*;

use dropout_risk::pipeline::{load_dataset, save_dataset, LoadOptions};

mod common;

use common::*;

#[test]
fn test_csv_round_trip_drops_index_artifact() {
    let temp_dir = create_temp_dir();
    let path = write_csv(temp_dir.path(), "export.csv", &invalsi_frame(12));

    let loaded = load_dataset(&path, LoadOptions::default()).unwrap();

    assert_eq!(loaded.height(), 12);
    assert!(loaded.column("Unnamed: 0").is_err());
    assert_eq!(loaded.width(), invalsi_frame(12).width() - 1);
    assert_eq!(i64_values(&loaded, "LIVELLI"), i64_values(&invalsi_frame(12), "LIVELLI"));
    assert_eq!(loaded.column("voto_scritto_mat").unwrap().null_count(), 2);
    assert!(loaded.equals_missing(&invalsi_frame(12).drop("Unnamed: 0").unwrap()));
}

#[test]
fn test_csv_round_trip_keeps_zero_padded_codes() {
    let temp_dir = create_temp_dir();
    let path = temp_dir.path().join("codes.csv");
    let mut df = df! {
        "Cod_reg" => ["01", "12", "05"],
        "mese" => ["03", "11", "07"],
        "cod_provincia_ISTAT" => ["058", "015", "001"],
        "voto_orale_mat" => [6.0, 7.5, 8.0],
    }
    .unwrap();
    save_dataset(&mut df, &path, b';').unwrap();

    let loaded = load_dataset(&path, LoadOptions::default()).unwrap();

    assert_eq!(loaded.column("Cod_reg").unwrap().dtype(), &DataType::String);
    assert!(loaded.equals_missing(&df));
}

#[test]
fn test_parquet_round_trip() {
    let temp_dir = create_temp_dir();
    let path = temp_dir.path().join("export.parquet");
    let mut df = invalsi_frame(8).drop("Unnamed: 0").unwrap();
    save_dataset(&mut df, &path, b';').unwrap();

    let loaded = load_dataset(&path, LoadOptions::default()).unwrap();
    assert!(loaded.equals_missing(&df));
}

#[test]
fn test_custom_separator() {
    let temp_dir = create_temp_dir();
    let path = temp_dir.path().join("comma.csv");
    std::fs::write(&path, "sesso,LIVELLI\nF,1\nM,4\n").unwrap();

    let loaded = load_dataset(
        &path,
        LoadOptions {
            separator: b',',
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(loaded.get_column_names(), &["sesso", "LIVELLI"]);
    assert_eq!(i64_values(&loaded, "LIVELLI"), vec![1, 4]);
}

#[test]
fn test_unsupported_format_fails() {
    let temp_dir = create_temp_dir();
    let path = temp_dir.path().join("data.xlsx");
    std::fs::write(&path, "not a table").unwrap();

    let result = load_dataset(&path, LoadOptions::default());
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Unsupported file format"));
}

#[test]
fn test_missing_file_fails() {
    let temp_dir = create_temp_dir();
    let result = load_dataset(&temp_dir.path().join("absent.csv"), LoadOptions::default());
    assert!(result.is_err());
}
