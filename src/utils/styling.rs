//! Terminal styling utilities

use console::{style, Emoji};
use std::path::Path;
use std::time::Duration;

use crate::cli::PipelineConfig;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static BRAIN: Emoji<'_, '_> = Emoji("🧠 ", "");
pub static SCALE: Emoji<'_, '_> = Emoji("⚖️  ", "");

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
    ╺┳┓┏━┓┏━┓┏━┓┏━┓╻ ╻╺┳╸   ┏━┓╻┏━┓╻┏
     ┃┃┣┳┛┃ ┃┣━┛┃ ┃┃ ┃ ┃ ╺━╸┣┳┛┃┗━┓┣┻┓
    ╺┻┛╹┗╸┗━┛╹  ┗━┛┗━┛ ╹    ╹┗╸╹┗━┛╹ ╹
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {} {}",
        style("◆").magenta().bold(),
        style("School dropout risk from INVALSI data").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print configuration card
pub fn print_config(config: &PipelineConfig) {
    let box_width = 56;
    let line = "─".repeat(box_width - 2);

    let dropout = match (config.network.input_dropout, config.network.hidden_dropout) {
        (Some(input), Some(hidden)) => format!("{:.2} / {:.2}", input, hidden),
        _ => "off".to_string(),
    };
    let patience = config
        .early_stopping_patience
        .map_or("off".to_string(), |p| p.to_string());

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("⚙️  Configuration").cyan().bold(),
        " ".repeat(box_width - 20)
    );
    println!("    ├{}┤", line);
    println!("    │  {} Input:    {:<37}│", FOLDER, truncate_path(&config.input, 36));
    println!(
        "    │  {} Mapping:  {:<37}│",
        FOLDER,
        config
            .mapping
            .as_deref()
            .map_or("none".to_string(), |p| truncate_path(p, 36))
    );
    println!(
        "    │  {} Output:   {:<37}│",
        SAVE,
        truncate_path(&config.checkpoint_dir, 36)
    );
    println!("    ├{}┤", line);
    println!(
        "    │  {} Problem type:   {:<31}│",
        TARGET,
        style(config.problem_type.to_string()).yellow()
    );
    println!(
        "    │  {} Sampling:       {:<31}│",
        SCALE,
        style(config.sampling.to_string()).yellow()
    );
    println!(
        "    │  {} Missing scores: {:<31}│",
        CHART,
        style(config.fill_policy.to_string()).yellow()
    );
    println!(
        "    │  {} Network:        {:<31}│",
        BRAIN,
        style(format!(
            "{}x{} {}",
            config.network.hidden_layers, config.network.neurons, config.network.activation
        ))
        .yellow()
    );
    println!(
        "    │  {} Batch norm:     {:<31}│",
        BRAIN,
        style(config.network.batch_normalization.to_string()).yellow()
    );
    println!(
        "    │  {} Dropout:        {:<31}│",
        BRAIN,
        style(dropout).yellow()
    );
    println!(
        "    │  {} Epochs/batch:   {:<31}│",
        CHART,
        style(format!("{} / {}", config.epochs, config.batch_size)).yellow()
    );
    println!(
        "    │  {} Early stopping: {:<31}│",
        CHART,
        style(patience).yellow()
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print a warning for a non-fatal condition to stderr
pub fn print_warning(message: &str) {
    eprintln!("    {} {}", WARN, style(message).yellow());
}

/// Print the elapsed time of a step
pub fn print_step_time(elapsed: Duration) {
    println!(
        "      {}",
        style(format!("completed in {:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("Dropout risk training complete!").green().bold()
    );
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, extra_info: Option<&str>) {
    if let Some(info) = extra_info {
        println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(info).dim()
        );
    } else {
        println!(
            "      Found {} {}",
            style(count).yellow().bold(),
            description
        );
    }
}

/// Print a list of names under a dim heading, truncated after `limit` entries
pub fn print_name_list(heading: &str, names: &[String], limit: usize) {
    if names.is_empty() {
        return;
    }
    println!(
        "      {} {}:",
        style(heading).yellow(),
        style(format!("({})", names.len())).dim()
    );
    for name in names.iter().take(limit) {
        println!("        {} {}", style("•").dim(), name);
    }
    if names.len() > limit {
        println!(
            "        {}",
            style(format!("... and {} more", names.len() - limit)).dim()
        );
    }
}

// Helper functions

fn truncate_path(path: &Path, max_len: usize) -> String {
    let path_str = path.display().to_string();
    truncate_string(&path_str, max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let tail: String = s
            .chars()
            .rev()
            .take(max_len.saturating_sub(3))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("/a/very/long/path.csv", 10), "...ath.csv");
    }
}
