//! Dataset loader and writer for CSV and Parquet files

use std::path::Path;

use std::sync::Arc;

use anyhow::{Context, Result};
use polars::prelude::*;

use super::taxonomy::{FeatureKind, FeatureTaxonomy};

/// Index column left behind by tools that save their row index
pub const INDEX_ARTIFACT_COLUMN: &str = "Unnamed: 0";

/// Default separator of raw INVALSI exports
pub const DEFAULT_SEPARATOR: u8 = b';';

/// Options for reading delimited files
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Field separator for CSV input
    pub separator: u8,
    /// Rows used for schema inference; 0 scans the whole file
    pub infer_schema_length: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            infer_schema_length: 10000,
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// String-categorical columns of `schema` forced back to text.
///
/// Codes such as `Cod_reg` or `mese` look numeric ("01", "05") and would
/// otherwise be inferred as integers and lose their leading zeros.
fn text_overrides(schema: &Schema) -> Schema {
    let taxonomy = FeatureTaxonomy::invalsi();
    let mut overrides = Schema::default();
    for name in taxonomy.group(FeatureKind::StrCategorical) {
        if schema.contains(name) {
            overrides.with_column(name.into(), DataType::String);
        }
    }
    overrides
}

fn csv_reader(path: &Path, options: LoadOptions) -> LazyCsvReader {
    let schema_length = if options.infer_schema_length == 0 {
        None
    } else {
        Some(options.infer_schema_length)
    };
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_separator(options.separator)
        .with_infer_schema_length(schema_length)
}

/// Load a dataset from a file (CSV or Parquet based on extension).
///
/// Index artifact columns (`Unnamed: 0` or an empty header) are dropped.
/// String-categorical INVALSI columns are always read as text from CSV.
pub fn load_dataset(path: &Path, options: LoadOptions) -> Result<DataFrame> {
    let extension = extension_of(path);

    let lf = match extension.as_str() {
        "csv" | "txt" => {
            let inferred = csv_reader(path, options)
                .finish()
                .and_then(|mut lf| lf.collect_schema())
                .with_context(|| format!("Failed to load CSV file: {}", path.display()))?;
            let overrides = text_overrides(&inferred);

            let reader = if overrides.is_empty() {
                csv_reader(path, options)
            } else {
                csv_reader(path, options).with_dtype_overwrite(Some(Arc::new(overrides)))
            };
            reader
                .finish()
                .with_context(|| format!("Failed to load CSV file: {}", path.display()))?
        }
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?,
        _ => anyhow::bail!(
            "Unsupported file format: {}. Supported formats: csv, parquet",
            extension
        ),
    };

    let df = lf
        .collect()
        .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

    Ok(drop_index_artifacts(df))
}

/// Remove saved row-index columns
pub fn drop_index_artifacts(df: DataFrame) -> DataFrame {
    let artifacts: Vec<String> = df
        .get_column_names()
        .iter()
        .filter(|name| name.as_str() == INDEX_ARTIFACT_COLUMN || name.trim().is_empty())
        .map(|name| name.to_string())
        .collect();

    if artifacts.is_empty() {
        df
    } else {
        df.drop_many(&artifacts)
    }
}

/// Save a dataset (CSV or Parquet based on extension).
///
/// CSV output has a header row and no index column, so
/// `load_dataset` with the same separator reproduces the table.
pub fn save_dataset(df: &mut DataFrame, path: &Path, separator: u8) -> Result<()> {
    let extension = extension_of(path);

    match extension.as_str() {
        "csv" | "txt" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .include_header(true)
                .with_separator(separator)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        ),
    }

    Ok(())
}

/// Rows, columns and estimated memory (MB) of a loaded table
pub fn dataset_stats(df: &DataFrame) -> (usize, usize, f64) {
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    (rows, cols, memory_mb)
}
