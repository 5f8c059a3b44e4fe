//! Interactive prompts using dialoguer

use anyhow::Result;
use dialoguer::Confirm;

/// Prompt user to confirm proceeding with an action
pub fn confirm_step(message: &str) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(message)
        .default(true)
        .interact()?;
    Ok(confirmed)
}

/// Prompt user to confirm starting training
pub fn confirm_training(records: usize, features: usize, epochs: usize) -> Result<bool> {
    let message = format!(
        "Train on {} record(s) with {} encoded feature(s) for up to {} epoch(s)?",
        records, features, epochs
    );
    confirm_step(&message)
}
