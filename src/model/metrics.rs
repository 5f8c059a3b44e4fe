//! Epoch metrics and per-epoch history

use std::collections::BTreeMap;

use faer::Mat;
use serde::{Deserialize, Serialize};

use super::problem::ProblemType;

/// Binary confusion counts at the problem type's threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl ConfusionCounts {
    pub fn record(&mut self, truth: bool, predicted: bool) {
        match (truth, predicted) {
            (true, true) => self.true_positives += 1,
            (false, false) => self.true_negatives += 1,
            (false, true) => self.false_positives += 1,
            (true, false) => self.false_negatives += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }

    /// TP / (TP + FP), 0.0 when nothing was predicted positive
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// TP / (TP + FN), 0.0 when there are no positives
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Metrics of one pass over a split
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub problem_type: ProblemType,
    pub loss: f64,
    /// Accuracy, binary accuracy or mean absolute error
    pub primary: f64,
    pub confusion: ConfusionCounts,
}

impl EvaluationMetrics {
    pub fn precision(&self) -> f64 {
        self.confusion.precision()
    }

    pub fn recall(&self) -> f64 {
        self.confusion.recall()
    }

    /// Metric name/value pairs with Keras-style names
    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("loss", self.loss),
            (self.problem_type.primary_metric(), self.primary),
            ("precision", self.precision()),
            ("recall", self.recall()),
            ("true_positives", self.confusion.true_positives as f64),
            ("true_negatives", self.confusion.true_negatives as f64),
            ("false_positives", self.confusion.false_positives as f64),
            ("false_negatives", self.confusion.false_negatives as f64),
        ]
    }
}

/// Running totals over the batches of an epoch
#[derive(Debug, Clone)]
pub struct MetricAccumulator {
    problem_type: ProblemType,
    rows: usize,
    loss_sum: f64,
    correct: usize,
    abs_error_sum: f64,
    confusion: ConfusionCounts,
}

impl MetricAccumulator {
    pub fn new(problem_type: ProblemType) -> Self {
        Self {
            problem_type,
            rows: 0,
            loss_sum: 0.0,
            correct: 0,
            abs_error_sum: 0.0,
            confusion: ConfusionCounts::default(),
        }
    }

    /// Add one batch; `loss` is the batch's mean loss
    pub fn update(&mut self, probs: &Mat<f64>, targets: &Mat<f64>, loss: f64) {
        let problem = self.problem_type;
        for i in 0..probs.nrows() {
            let truth = problem.truth_is_positive(targets, i);
            let predicted = problem.prediction_is_positive(probs, i);
            self.confusion.record(truth, predicted);
            if truth == predicted {
                self.correct += 1;
            }
            self.abs_error_sum += (0..probs.ncols())
                .map(|j| (probs[(i, j)] - targets[(i, j)]).abs())
                .sum::<f64>()
                / probs.ncols().max(1) as f64;
        }
        self.loss_sum += loss * probs.nrows() as f64;
        self.rows += probs.nrows();
    }

    pub fn finish(&self) -> EvaluationMetrics {
        let rows = self.rows.max(1) as f64;
        let primary = match self.problem_type {
            ProblemType::PureRegression => self.abs_error_sum / rows,
            ProblemType::Classification | ProblemType::Regression => self.correct as f64 / rows,
        };
        EvaluationMetrics {
            problem_type: self.problem_type,
            loss: self.loss_sum / rows,
            primary,
            confusion: self.confusion,
        }
    }
}

/// Per-epoch values of every metric, keyed by name (`loss`, `val_loss`, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricHistory {
    pub metrics: BTreeMap<String, Vec<f64>>,
}

impl MetricHistory {
    /// Append one epoch's values under `prefix` (`""` or `"val_"`)
    pub fn record(&mut self, prefix: &str, metrics: &EvaluationMetrics) {
        for (name, value) in metrics.named_values() {
            self.metrics
                .entry(format!("{}{}", prefix, name))
                .or_default()
                .push(value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(Vec::as_slice)
    }

    pub fn epochs(&self) -> usize {
        self.metrics.get("loss").map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_denominators_give_zero() {
        let counts = ConfusionCounts {
            true_negatives: 4,
            false_negatives: 0,
            ..Default::default()
        };
        assert_eq!(counts.precision(), 0.0);
        assert_eq!(counts.recall(), 0.0);
        assert_eq!(counts.accuracy(), 1.0);
    }

    #[test]
    fn test_accumulator_classification() {
        let probs = Mat::from_fn(4, 2, |i, j| {
            let p1 = [0.9, 0.2, 0.7, 0.4][i];
            if j == 1 {
                p1
            } else {
                1.0 - p1
            }
        });
        let labels = [true, false, false, true];
        let targets = Mat::from_fn(4, 2, |i, j| if (j == 1) == labels[i] { 1.0 } else { 0.0 });

        let mut acc = MetricAccumulator::new(ProblemType::Classification);
        acc.update(&probs, &targets, 0.5);
        let metrics = acc.finish();

        assert_eq!(metrics.confusion.true_positives, 1);
        assert_eq!(metrics.confusion.false_positives, 1);
        assert_eq!(metrics.confusion.true_negatives, 1);
        assert_eq!(metrics.confusion.false_negatives, 1);
        assert_eq!(metrics.confusion.total(), 4);
        assert_eq!(metrics.primary, 0.5);
        assert_eq!(metrics.loss, 0.5);
    }

    #[test]
    fn test_history_uses_keras_names() {
        let metrics = EvaluationMetrics {
            problem_type: ProblemType::PureRegression,
            loss: 0.1,
            primary: 0.2,
            confusion: ConfusionCounts::default(),
        };
        let mut history = MetricHistory::default();
        history.record("", &metrics);
        history.record("val_", &metrics);

        assert_eq!(history.get("mae"), Some(&[0.2][..]));
        assert_eq!(history.get("val_loss"), Some(&[0.1][..]));
        assert!(history.get("val_false_negatives").is_some());
        assert_eq!(history.epochs(), 1);
    }
}
