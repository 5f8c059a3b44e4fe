//! dropout-risk: school dropout prediction CLI
//!
//! Loads an INVALSI survey export, turns question responses into competency
//! scores, resolves missing values, balances the training split, encodes the
//! heterogeneous features and trains a feed-forward network.

use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use console::style;
use polars::prelude::DataFrame;

use dropout_risk::cli::{confirm_training, run_aggregate, run_clean, Cli, Commands, PipelineConfig};
use dropout_risk::model::{evaluate, fit, EncodedSplit, TrainedModel};
use dropout_risk::pipeline::{
    aggregate_competencies, balance_training_split, class_counts, dataset_stats,
    ensure_dropout_column, is_question_column, load_dataset, resolve_missing_values,
    save_dataset, select_columns, split_dataset, CompetencyMapping, EncoderState, FeatureKind,
    FeatureTaxonomy, LoadOptions,
};
use dropout_risk::report::{
    display_class_balance, display_metrics, export_history, HistoryParams, RunSummary,
};
use dropout_risk::utils::{
    create_spinner, finish_with_success, print_banner, print_completion, print_config,
    print_count, print_info, print_name_list, print_step_header, print_step_time, print_success,
    print_warning,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle subcommands
    if let Some(command) = &cli.command {
        return match command {
            Commands::Clean {
                input,
                output,
                separator,
                infer_schema_length,
            } => run_clean(
                input,
                output.as_deref(),
                LoadOptions {
                    separator: *separator,
                    infer_schema_length: *infer_schema_length,
                },
            ),
            Commands::Aggregate {
                input,
                mapping,
                output,
                separator,
                infer_schema_length,
            } => run_aggregate(
                input,
                mapping,
                output.as_deref(),
                LoadOptions {
                    separator: *separator,
                    infer_schema_length: *infer_schema_length,
                },
            ),
        };
    }

    // Validate everything before touching any file
    let config = PipelineConfig::from_cli(&cli)?;
    run_training(&config)
}

fn run_training(config: &PipelineConfig) -> Result<()> {
    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(config);

    let mut summary = RunSummary::default();

    // Step 1: Load dataset
    print_step_header(1, "Load Dataset");
    let step_start = Instant::now();
    let spinner = create_spinner("Loading dataset...");
    let df = load_dataset(&config.input, config.load)?;
    finish_with_success(&spinner, "Dataset loaded");

    let (rows, cols, memory_mb) = dataset_stats(&df);
    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    println!("      Rows: {}", rows);
    println!("      Columns: {}", cols);
    println!("      Estimated memory: {:.2} MB", memory_mb);
    summary.records_loaded = rows;
    summary.record_step("Load", step_start.elapsed());
    print_step_time(step_start.elapsed());

    // Step 2: Competency aggregation
    print_step_header(2, "Competency Aggregation");
    let step_start = Instant::now();
    let mut taxonomy = FeatureTaxonomy::invalsi();
    let mut df = match &config.mapping {
        Some(mapping_path) => {
            let mapping = CompetencyMapping::from_json_file(mapping_path)?;
            taxonomy = taxonomy.with_competencies(mapping.tags());
            summary.competencies = mapping.tags().len();
            aggregate_step(df, &mapping, config, &mut summary)?
        }
        None => {
            print_info("No mapping given; question columns are ignored");
            df
        }
    };
    summary.record_step("Competencies", step_start.elapsed());
    print_step_time(step_start.elapsed());

    // Step 3: Target
    print_step_header(3, "Dropout Target");
    let step_start = Instant::now();
    if ensure_dropout_column(&mut df)? {
        print_info("DROPOUT derived from LIVELLI (level 3 or above)");
    }
    let counts = class_counts(&df)?;
    counts.ensure_non_degenerate()?;
    println!(
        "      DROPOUT: {} - NO DROPOUT: {} - ratio {:.2}",
        style(counts.dropout).yellow().bold(),
        style(counts.no_dropout).yellow().bold(),
        counts.dropout_ratio()
    );
    summary.record_step("Target", step_start.elapsed());
    print_step_time(step_start.elapsed());

    // Step 4: Missing values
    print_step_header(4, "Missing Values");
    let step_start = Instant::now();
    let (df, resolution) = resolve_missing_values(df, config.fill_policy)?;
    for filled in &resolution.filled {
        print_count(
            &format!("null(s) in {}", filled.column),
            filled.filled,
            Some(&format!("(filled with {:.3})", filled.value)),
        );
    }
    if resolution.provinces_filled > 0 {
        print_count("unknown province(s)", resolution.provinces_filled, Some("(set to ND)"));
    }
    if !resolution.dropped_columns.is_empty() {
        taxonomy = taxonomy.without(&resolution.dropped_columns);
        print_name_list("Dropped columns", &resolution.dropped_columns, 10);
    }
    if resolution.dropped_rows > 0 {
        print_count("record(s) without math scores removed", resolution.dropped_rows, None);
    }

    let ignored = taxonomy.unclassified_columns(&df);
    if !ignored.is_empty() {
        print_warning(&format!(
            "{} column(s) are not part of the feature taxonomy and are ignored",
            ignored.len()
        ));
    }
    let missing = taxonomy.missing_features(&df);
    if !missing.is_empty() {
        print_warning(&format!(
            "{} taxonomy column(s) are absent from the dataset",
            missing.len()
        ));
        print_name_list("Absent columns", &missing, 10);
    }
    let taxonomy = taxonomy.restricted_to(&df);
    let mut kept: Vec<&str> = taxonomy.feature_columns();
    kept.extend(taxonomy.group(FeatureKind::Target));
    let df = select_columns(&df, &kept)?;
    summary.records_after_resolution = df.height();
    print_success(&format!("Policy '{}' applied", config.fill_policy));
    summary.record_step("Missing values", step_start.elapsed());
    print_step_time(step_start.elapsed());

    // Step 5: Split and balance
    print_step_header(5, "Split & Balance");
    let step_start = Instant::now();
    let splits = split_dataset(
        &df,
        config.test_fraction,
        config.validation_fraction,
        config.seed,
        config.stratify,
    )?;
    let spinner = create_spinner(&format!("Balancing training split ({})...", config.sampling));
    let balanced = balance_training_split(
        splits,
        &taxonomy,
        config.sampling,
        config.smote_neighbors,
        config.seed,
    )?;
    finish_with_success(&spinner, "Training split balanced");
    display_class_balance(&balanced.before, &balanced.after);
    let splits = balanced.splits;
    let taxonomy = balanced.taxonomy;
    summary.training_records = splits.training.height();
    summary.validation_records = splits.validation.height();
    summary.test_records = splits.test.height();
    summary.record_step("Split & balance", step_start.elapsed());
    print_step_time(step_start.elapsed());

    // Step 6: Encode
    print_step_header(6, "Feature Encoding");
    let step_start = Instant::now();
    let encoder = EncoderState::fit(&splits.training, &taxonomy)?;
    let training = EncodedSplit {
        features: encoder.transform(&splits.training)?,
        targets: config.problem_type.targets(&splits.training)?,
    };
    let validation = EncodedSplit {
        features: encoder.transform(&splits.validation)?,
        targets: config.problem_type.targets(&splits.validation)?,
    };
    let test = EncodedSplit {
        features: encoder.transform(&splits.test)?,
        targets: config.problem_type.targets(&splits.test)?,
    };
    summary.encoded_features = encoder.width();
    print_count("encoded feature(s)", encoder.width(), None);
    summary.record_step("Encoding", step_start.elapsed());
    print_step_time(step_start.elapsed());

    if config.confirm && !confirm_training(training.rows(), encoder.width(), config.epochs)? {
        println!("Cancelled by user.");
        return Ok(());
    }

    // Step 7: Train
    print_step_header(7, "Training");
    let step_start = Instant::now();
    let mut model = TrainedModel::build(config.problem_type, encoder, &config.network, config.seed)?;
    summary.parameters = model.network.parameter_count()?;
    let training_config = config.training(true);
    let outcome = fit(&mut model, &training, &validation, &training_config)?;
    if let Some(path) = &training_config.checkpoint_path {
        if outcome.checkpoints_written > 0 {
            print_success(&format!(
                "Best model (epoch {}) saved to {}",
                outcome.best_epoch,
                path.display()
            ));
        }
    }
    summary.epochs_run = outcome.epochs_run;
    summary.best_epoch = outcome.best_epoch;
    summary.stopped_early = outcome.stopped_early;
    summary.record_step("Training", step_start.elapsed());
    print_step_time(step_start.elapsed());

    // Step 8: Evaluate
    print_step_header(8, "Evaluation");
    let step_start = Instant::now();
    let train_metrics = evaluate(&model.network, config.problem_type, &training)?;
    let val_metrics = evaluate(&model.network, config.problem_type, &validation)?;
    let test_metrics = evaluate(&model.network, config.problem_type, &test)?;
    display_metrics(&[
        ("Training", &train_metrics),
        ("Validation", &val_metrics),
        ("Test", &test_metrics),
    ]);

    export_history(
        &HistoryParams {
            config,
            encoded_features: summary.encoded_features,
            before: balanced.before,
            after: balanced.after,
            outcome: &outcome,
            test_metrics: &test_metrics,
        },
        &config.history_path,
    )?;
    println!();
    print_success(&format!("History written to {}", config.history_path.display()));
    summary.record_step("Evaluation", step_start.elapsed());
    print_step_time(step_start.elapsed());

    summary.display();
    print_completion();

    Ok(())
}

/// Replace question columns by competency scores, unless the dataset already
/// carries the scores and no question columns
fn aggregate_step(
    df: DataFrame,
    mapping: &CompetencyMapping,
    config: &PipelineConfig,
    summary: &mut RunSummary,
) -> Result<DataFrame> {
    let has_questions = df
        .get_column_names()
        .iter()
        .any(|name| is_question_column(name));
    if !has_questions {
        print_info("No question columns found; using the competency columns already present");
        return Ok(df);
    }

    let spinner = create_spinner("Scoring competencies...");
    let (mut aggregated, aggregation) = aggregate_competencies(&df, mapping)?;
    finish_with_success(
        &spinner,
        &format!(
            "{} question(s) aggregated into {} competency score(s)",
            aggregation.mapped_questions, aggregation.competencies
        ),
    );
    if !aggregation.unmapped_questions.is_empty() {
        print_warning(&format!(
            "{} question column(s) have no mapping entry and were skipped",
            aggregation.unmapped_questions.len()
        ));
    }
    summary.unmapped_questions = aggregation.unmapped_questions.len();

    if let Some(path) = &config.save_aggregated {
        save_dataset(&mut aggregated, path, config.load.separator)?;
        print_success(&format!("Saved dataset with competencies to {}", path.display()));
    }
    Ok(aggregated)
}
