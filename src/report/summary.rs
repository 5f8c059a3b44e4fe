//! Console summaries rendered with comfy-table

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::model::EvaluationMetrics;
use crate::pipeline::{ClassCounts, CorrelationReport, DatasetProfile, STRONG_CORRELATION};

fn print_section(icon: &str, title: &str) {
    println!();
    println!("    {} {}", style(icon).cyan(), style(title).white().bold());
    println!("    {}", style("─".repeat(50)).dim());
    println!();
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn header(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
        .collect()
}

/// Facts about one pipeline run, filled in as stages complete
#[derive(Debug, Default)]
pub struct RunSummary {
    pub records_loaded: usize,
    pub competencies: usize,
    pub unmapped_questions: usize,
    pub records_after_resolution: usize,
    pub training_records: usize,
    pub validation_records: usize,
    pub test_records: usize,
    pub encoded_features: usize,
    pub parameters: usize,
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub stopped_early: bool,
    pub step_times: Vec<(String, Duration)>,
}

impl RunSummary {
    pub fn record_step(&mut self, name: &str, elapsed: Duration) {
        self.step_times.push((name.to_string(), elapsed));
    }

    pub fn display(&self) {
        print_section("📋", "RUN SUMMARY");

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(header(&["Metric", "Value"]));

        table.add_row(vec![Cell::new("📁 Records loaded"), Cell::new(self.records_loaded)]);
        if self.competencies > 0 {
            table.add_row(vec![
                Cell::new("🧩 Competency scores"),
                Cell::new(self.competencies),
            ]);
            table.add_row(vec![
                Cell::new("❔ Unmapped questions"),
                Cell::new(self.unmapped_questions).fg(if self.unmapped_questions == 0 {
                    Color::White
                } else {
                    Color::Yellow
                }),
            ]);
        }
        table.add_row(vec![
            Cell::new("🩹 Records after missing values"),
            Cell::new(self.records_after_resolution),
        ]);
        table.add_row(vec![
            Cell::new("🏋️  Training / validation / test"),
            Cell::new(format!(
                "{} / {} / {}",
                self.training_records, self.validation_records, self.test_records
            )),
        ]);
        table.add_row(vec![
            Cell::new("🔢 Encoded features"),
            Cell::new(self.encoded_features),
        ]);
        table.add_row(vec![
            Cell::new("🧠 Trainable parameters"),
            Cell::new(self.parameters),
        ]);
        table.add_row(vec![
            Cell::new("⏱️  Epochs run"),
            Cell::new(if self.stopped_early {
                format!("{} (early stop, best {})", self.epochs_run, self.best_epoch)
            } else {
                format!("{} (best {})", self.epochs_run, self.best_epoch)
            })
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
        ]);

        print_indented(&table);

        if !self.step_times.is_empty() {
            let total: Duration = self.step_times.iter().map(|(_, d)| *d).sum();
            println!();
            for (name, elapsed) in &self.step_times {
                println!(
                    "      {:<28} {}",
                    name,
                    style(format!("{:.2}s", elapsed.as_secs_f64())).dim()
                );
            }
            println!(
                "      {:<28} {}",
                style("Total").bold(),
                style(format!("{:.2}s", total.as_secs_f64())).bold()
            );
        }
    }
}

/// Class distribution before and after balancing
pub fn display_class_balance(before: &ClassCounts, after: &ClassCounts) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Training split", "DROPOUT", "NO DROPOUT", "Dropout ratio"]));

    for (label, counts) in [("Before", before), ("After", after)] {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(counts.dropout),
            Cell::new(counts.no_dropout),
            Cell::new(format!("{:.2}", counts.dropout_ratio())).fg(if counts.is_balanced() {
                Color::Green
            } else {
                Color::Yellow
            }),
        ]);
    }

    println!();
    print_indented(&table);
}

/// Final metrics of each evaluated split, side by side
pub fn display_metrics(splits: &[(&str, &EvaluationMetrics)]) {
    let Some((_, first)) = splits.first() else {
        return;
    };
    print_section("📊", "EVALUATION");

    let mut columns = vec!["Metric"];
    columns.extend(splits.iter().map(|(name, _)| *name));
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&columns));

    let names: Vec<&str> = first.named_values().iter().map(|(name, _)| *name).collect();
    for (row, name) in names.iter().enumerate() {
        let mut cells = vec![Cell::new(name)];
        for (_, metrics) in splits {
            let value = metrics.named_values()[row].1;
            let text = if name.starts_with("true_") || name.starts_with("false_") {
                format!("{}", value as u64)
            } else {
                format!("{:.4}", value)
            };
            cells.push(Cell::new(text));
        }
        table.add_row(cells);
    }

    print_indented(&table);
}

/// Profile of a raw export: null ratios, identifier-like and constant columns
pub fn display_profile(profile: &DatasetProfile) {
    print_section("🔍", "DATASET PROFILE");
    println!("      Rows: {}", profile.rows);
    println!("      Columns: {}", profile.columns);

    if !profile.null_ratios.is_empty() {
        println!();
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(header(&["Column with nulls", "Missing"]));
        for (name, ratio) in &profile.null_ratios {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(format!("{:.1}%", ratio * 100.0)).fg(if *ratio > 0.5 {
                    Color::Red
                } else {
                    Color::Yellow
                }),
            ]);
        }
        print_indented(&table);
    }

    if !profile.near_unique.is_empty() {
        println!();
        println!(
            "      {} {}:",
            style("Near-unique columns").yellow(),
            style(format!("({})", profile.near_unique.len())).dim()
        );
        for (name, ratio) in &profile.near_unique {
            println!("        {} {} ratio = {:.3}", style("•").dim(), name, ratio);
        }
    }

    if !profile.constant.is_empty() {
        println!();
        println!(
            "      {} {}:",
            style("Constant columns").yellow(),
            style(format!("({})", profile.constant.len())).dim()
        );
        for name in &profile.constant {
            println!("        {} {}", style("•").dim(), name);
        }
    }
}

fn correlation_color(r: f64) -> Color {
    if r.abs() > STRONG_CORRELATION {
        Color::Red
    } else if r.abs() > 0.4 {
        Color::Yellow
    } else {
        Color::White
    }
}

/// Correlation matrix of grades, scores and competencies, rounded to two decimals
pub fn display_correlations(report: &CorrelationReport) {
    print_section("🔗", "CORRELATIONS");
    if report.columns.len() < 2 {
        println!("      Not enough numeric columns to correlate");
        return;
    }
    println!("      Records used: {}", report.rows_used);
    println!();

    let mut columns = vec![""];
    columns.extend(report.columns.iter().map(String::as_str));
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&columns));

    for (name, row) in report.columns.iter().zip(&report.matrix) {
        let mut cells = vec![Cell::new(name).add_attribute(Attribute::Bold)];
        cells.extend(
            row.iter()
                .map(|r| Cell::new(format!("{:.2}", r)).fg(correlation_color(*r))),
        );
        table.add_row(cells);
    }
    print_indented(&table);

    let strong = report.strong_pairs(STRONG_CORRELATION);
    if !strong.is_empty() {
        println!();
        println!(
            "      {} {}:",
            style("Strongly correlated pairs").yellow(),
            style(format!("({})", strong.len())).dim()
        );
        for pair in &strong {
            println!(
                "        {} {} ~ {} r = {:.2}",
                style("•").dim(),
                pair.feature1,
                pair.feature2,
                pair.correlation
            );
        }
    }
}
