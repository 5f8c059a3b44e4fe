//! Question to competency aggregation
//!
//! Every assessment question is tagged with one or more competencies
//! (ambiti and processi). A record's competency score is the share of that
//! competency's questions the student answered correctly, so question-level
//! columns collapse into one `[0, 1]` column per tag.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use rayon::prelude::*;

use super::target::column_to_bools;

/// Whether a column holds a single question's correctness (`D` + digit)
pub fn is_question_column(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('D') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Static question → competency tags table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompetencyMapping {
    questions: BTreeMap<String, Vec<String>>,
    denominators: BTreeMap<String, usize>,
}

impl CompetencyMapping {
    /// Build a mapping, counting how many questions tag each competency.
    ///
    /// A question listing the same tag twice counts once for it.
    pub fn new(questions: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut cleaned = BTreeMap::new();
        let mut denominators: BTreeMap<String, usize> = BTreeMap::new();

        for (question, tags) in questions {
            let mut tags = tags;
            tags.sort();
            tags.dedup();
            if tags.is_empty() {
                anyhow::bail!("Question '{}' has no competency tags", question);
            }
            for tag in &tags {
                *denominators.entry(tag.clone()).or_insert(0) += 1;
            }
            cleaned.insert(question, tags);
        }

        Ok(Self {
            questions: cleaned,
            denominators,
        })
    }

    /// Load a JSON object `{ "D1": ["tag", ...], ... }`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapping file: {}", path.display()))?;
        let questions: BTreeMap<String, Vec<String>> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse mapping file: {}", path.display()))?;
        Self::new(questions)
    }

    /// Competency tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        self.denominators.keys().map(String::as_str).collect()
    }

    /// Number of questions tagging `tag`
    pub fn denominator(&self, tag: &str) -> Option<usize> {
        self.denominators.get(tag).copied()
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn tags_of(&self, question: &str) -> Option<&[String]> {
        self.questions.get(question).map(Vec::as_slice)
    }
}

/// Outcome of replacing question columns by competency scores
#[derive(Debug, Clone, Default)]
pub struct AggregationSummary {
    /// Question columns found in the table and mapped
    pub mapped_questions: usize,
    /// Question columns found in the table without a mapping entry
    pub unmapped_questions: Vec<String>,
    /// Competency columns added
    pub competencies: usize,
}

/// Competency scores of one record.
///
/// `answers[q]` is the correctness of mapped question `q`; `question_tags[q]`
/// holds the indices of its tags. Correct answers are counted per tag and
/// divided once, so a fully correct respondent scores exactly 1.0.
fn score_record(answers: &[bool], question_tags: &[Vec<usize>], denominators: &[f64]) -> Vec<f64> {
    let mut correct = vec![0usize; denominators.len()];
    for (answered, tags) in answers.iter().zip(question_tags) {
        if *answered {
            for &tag in tags {
                correct[tag] += 1;
            }
        }
    }
    correct
        .iter()
        .zip(denominators)
        .map(|(&count, &denominator)| count as f64 / denominator)
        .collect()
}

/// Replace all question columns with one score column per competency tag.
///
/// Question columns without a mapping entry are skipped and dropped.
/// Competency columns are appended in sorted tag order.
pub fn aggregate_competencies(
    df: &DataFrame,
    mapping: &CompetencyMapping,
) -> Result<(DataFrame, AggregationSummary)> {
    let question_columns: Vec<String> = df
        .get_column_names()
        .iter()
        .filter(|name| is_question_column(name))
        .map(|name| name.to_string())
        .collect();

    let tags = mapping.tags();
    let tag_index: BTreeMap<&str, usize> = tags.iter().enumerate().map(|(i, t)| (*t, i)).collect();
    let denominators: Vec<f64> = tags
        .iter()
        .map(|tag| mapping.denominator(tag).unwrap_or(1) as f64)
        .collect();

    let mut summary = AggregationSummary {
        competencies: tags.len(),
        ..Default::default()
    };

    // column-major answers of the mapped questions present in the table
    let mut answers: Vec<Vec<bool>> = Vec::new();
    let mut question_tags: Vec<Vec<usize>> = Vec::new();
    for name in &question_columns {
        let Some(question_tag_names) = mapping.tags_of(name) else {
            summary.unmapped_questions.push(name.clone());
            continue;
        };
        let values = column_to_bools(df.column(name)?)?;
        answers.push(values.into_iter().map(|v| v.unwrap_or(false)).collect());
        question_tags.push(
            question_tag_names
                .iter()
                .filter_map(|tag| tag_index.get(tag.as_str()).copied())
                .collect(),
        );
    }
    summary.mapped_questions = answers.len();

    let scores: Vec<Vec<f64>> = (0..df.height())
        .into_par_iter()
        .map(|row| {
            let record: Vec<bool> = answers.iter().map(|column| column[row]).collect();
            score_record(&record, &question_tags, &denominators)
        })
        .collect();

    let mut out = df.drop_many(&question_columns);
    for (tag_idx, tag) in tags.iter().enumerate() {
        let values: Vec<f64> = scores.iter().map(|record| record[tag_idx]).collect();
        out.with_column(Column::new((*tag).into(), values))?;
    }

    Ok((out, summary))
}
