//! Precision, recall and F1 against a ground-truth entity list.

use crate::compare::key_set;
use crate::entity::Entity;
use serde::{Deserialize, Serialize};

/// Key-set scores of a prediction list.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Score {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

/// Score `predictions` against `ground_truth`.
///
/// Absent or empty ground truth gives an all-zero score. That is not the
/// same as "no overlap": callers that care must check for ground truth
/// themselves.
pub fn score(ground_truth: Option<&[Entity]>, predictions: &[Entity]) -> Score {
    let Some(ground_truth) = ground_truth.filter(|gt| !gt.is_empty()) else {
        return Score::default();
    };

    let truth = key_set(ground_truth);
    let predicted = key_set(predictions);

    let true_positives = truth.intersection(&predicted).count();
    let false_positives = predicted.len() - true_positives;
    let false_negatives = truth.len() - true_positives;

    let precision = ratio(true_positives, true_positives + false_positives);
    let recall = ratio(true_positives, true_positives + false_negatives);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    Score {
        precision,
        recall,
        f1,
        true_positives,
        false_positives,
        false_negatives,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
