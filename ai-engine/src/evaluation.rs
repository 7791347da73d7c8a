//! Held-out evaluation of predicted probabilities

use fraud_core::{FraudError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` when only one class is present
    pub roc_auc: Option<f64>,
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.confusion;
        writeln!(f, "Threshold:       {:.2}", self.threshold)?;
        writeln!(f, "True Negatives:  {}", c.true_negatives)?;
        writeln!(f, "False Positives: {}", c.false_positives)?;
        writeln!(f, "False Negatives: {}", c.false_negatives)?;
        writeln!(f, "True Positives:  {}", c.true_positives)?;
        writeln!(f, "Accuracy:        {:.4}", self.accuracy)?;
        writeln!(f, "Precision:       {:.4}", self.precision)?;
        writeln!(f, "Recall:          {:.4}", self.recall)?;
        writeln!(f, "F1-Score:        {:.4}", self.f1)?;
        match self.roc_auc {
            Some(auc) => write!(f, "ROC-AUC:         {:.4}", auc),
            None => write!(f, "ROC-AUC:         n/a"),
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// A row is flagged when its probability is strictly above `threshold`
pub fn evaluate(probabilities: &[f64], labels: &[u8], threshold: f64) -> Result<EvaluationReport> {
    if probabilities.len() != labels.len() {
        return Err(FraudError::InvalidFeatureVector(format!(
            "{} probabilities but {} labels",
            probabilities.len(),
            labels.len()
        )));
    }
    if probabilities.is_empty() {
        return Err(FraudError::InsufficientData(
            "nothing to evaluate".to_string(),
        ));
    }

    let mut confusion = ConfusionMatrix::default();
    for (&p, &label) in probabilities.iter().zip(labels) {
        match (p > threshold, label == 1) {
            (false, false) => confusion.true_negatives += 1,
            (true, false) => confusion.false_positives += 1,
            (false, true) => confusion.false_negatives += 1,
            (true, true) => confusion.true_positives += 1,
        }
    }

    let precision = ratio(
        confusion.true_positives,
        confusion.true_positives + confusion.false_positives,
    );
    let recall = ratio(
        confusion.true_positives,
        confusion.true_positives + confusion.false_negatives,
    );
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Ok(EvaluationReport {
        threshold,
        confusion,
        accuracy: ratio(
            confusion.true_positives + confusion.true_negatives,
            confusion.total(),
        ),
        precision,
        recall,
        f1,
        roc_auc: roc_auc(probabilities, labels),
    })
}

/// Area under the ROC curve via the rank-sum statistic; tied scores share
/// their average rank.
pub fn roc_auc(probabilities: &[f64], labels: &[u8]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && probabilities[order[end + 1]] == probabilities[order[start]] {
            end += 1;
        }
        // ranks are 1-based
        let average_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            if labels[idx] == 1 {
                positive_rank_sum += average_rank;
            }
        }
        start = end + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}
