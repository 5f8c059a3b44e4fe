//! Dataset preparation subcommands: `clean` and `aggregate`

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use super::args::derived_path;
use crate::pipeline::{
    aggregate_competencies, clean_dataset, correlation_columns, correlation_matrix, dataset_stats,
    load_dataset, profile_dataset, save_dataset, CompetencyMapping, LoadOptions,
};
use crate::report::{display_correlations, display_profile};
use crate::utils::{create_spinner, finish_with_success, print_name_list, print_warning};

fn print_command_header(title: &str, input: &Path, output: &Path) {
    println!("\n {} {}", style("◆").cyan().bold(), title);
    println!("   Input:  {}", style(input.display()).dim());
    println!("   Output: {}", style(output.display()).dim());
    println!();
}

/// Profile a raw export, drop the fixed useless columns and save the result
pub fn run_clean(input: &Path, output: Option<&Path>, options: LoadOptions) -> Result<()> {
    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| derived_path(input, "cleaned"));
    print_command_header("Cleaning raw INVALSI export", input, &output_path);

    let spinner = create_spinner("Loading dataset...");
    let df = load_dataset(input, options)?;
    let (rows, cols, memory_mb) = dataset_stats(&df);
    finish_with_success(
        &spinner,
        &format!("Loaded {} rows × {} columns ({:.2} MB)", rows, cols, memory_mb),
    );

    let spinner = create_spinner("Profiling columns...");
    let profile = profile_dataset(&df)?;
    finish_with_success(&spinner, "Profile complete");
    display_profile(&profile);

    let (mut cleaned, dropped) = clean_dataset(df)?;
    println!();
    print_name_list("Dropped columns", &dropped, dropped.len());

    let spinner = create_spinner("Writing cleaned dataset...");
    save_dataset(&mut cleaned, &output_path, options.separator)?;
    finish_with_success(&spinner, &format!("Saved to {}", output_path.display()));

    println!();
    println!(
        "   {} rows × {} columns",
        style(cleaned.height()).yellow(),
        style(cleaned.width()).yellow()
    );
    println!("\n {} Cleaning complete!", style("✓").green().bold());
    Ok(())
}

/// Replace question columns with competency scores and save the result
pub fn run_aggregate(
    input: &Path,
    mapping_path: &Path,
    output: Option<&Path>,
    options: LoadOptions,
) -> Result<()> {
    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| derived_path(input, "competencies"));
    print_command_header("Aggregating questions into competencies", input, &output_path);

    let mapping = CompetencyMapping::from_json_file(mapping_path)
        .with_context(|| format!("Failed to load mapping: {}", mapping_path.display()))?;

    let spinner = create_spinner("Loading dataset...");
    let df = load_dataset(input, options)?;
    finish_with_success(&spinner, &format!("Loaded {} rows", df.height()));

    let spinner = create_spinner("Scoring competencies...");
    let (mut aggregated, summary) = aggregate_competencies(&df, &mapping)?;
    finish_with_success(
        &spinner,
        &format!(
            "{} question(s) aggregated into {} competency score(s)",
            summary.mapped_questions, summary.competencies
        ),
    );
    if !summary.unmapped_questions.is_empty() {
        print_warning(&format!(
            "{} question column(s) have no mapping entry and were skipped",
            summary.unmapped_questions.len()
        ));
        print_name_list("Unmapped questions", &summary.unmapped_questions, 10);
    }

    let spinner = create_spinner("Correlating grades, scores and competencies...");
    let report = correlation_matrix(&aggregated, &correlation_columns(&mapping.tags()))?;
    finish_with_success(
        &spinner,
        &format!("{} column(s) correlated", report.columns.len()),
    );
    display_correlations(&report);

    let spinner = create_spinner("Writing dataset with competencies...");
    save_dataset(&mut aggregated, &output_path, options.separator)?;
    finish_with_success(&spinner, &format!("Saved to {}", output_path.display()));

    println!("\n {} Aggregation complete!", style("✓").green().bold());
    Ok(())
}
