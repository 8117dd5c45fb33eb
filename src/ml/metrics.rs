//! Evaluation metrics for binary classifiers
//!
//! Includes:
//! - ROC-AUC via average ranks (ties share their mean rank)
//! - Log loss, used for early stopping
//! - Accuracy at a 0.5 threshold

use thiserror::Error;

/// Errors that make a metric undefined
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("ROC-AUC is undefined when labels hold a single class ({positives} positives, {negatives} negatives)")]
    SingleClass { positives: usize, negatives: usize },

    #[error("Arrays must have the same length: {labels} labels, {scores} scores")]
    LengthMismatch { labels: usize, scores: usize },

    #[error("Metric is undefined for empty input")]
    Empty,
}

/// Metrics calculator
pub struct Metrics;

impl Metrics {
    fn check_lengths(labels: &[f64], scores: &[f64]) -> Result<(), MetricError> {
        if labels.len() != scores.len() {
            return Err(MetricError::LengthMismatch {
                labels: labels.len(),
                scores: scores.len(),
            });
        }
        if labels.is_empty() {
            return Err(MetricError::Empty);
        }
        Ok(())
    }

    /// Area under the ROC curve for 0/1 labels and arbitrary scores
    ///
    /// Equals the Mann-Whitney U statistic of the positive class divided by
    /// `positives * negatives`, with tied scores given their average rank.
    pub fn roc_auc(labels: &[f64], scores: &[f64]) -> Result<f64, MetricError> {
        Self::check_lengths(labels, scores)?;

        let positives = labels.iter().filter(|&&y| y > 0.5).count();
        let negatives = labels.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(MetricError::SingleClass {
                positives,
                negatives,
            });
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

        // 1-based average ranks over tie groups
        let mut positive_rank_sum = 0.0;
        let mut start = 0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && scores[order[end]] == scores[order[start]] {
                end += 1;
            }
            let avg_rank = (start + 1 + end) as f64 / 2.0;
            let tied_positives = order[start..end]
                .iter()
                .filter(|&&i| labels[i] > 0.5)
                .count();
            positive_rank_sum += avg_rank * tied_positives as f64;
            start = end;
        }

        let p = positives as f64;
        let n = negatives as f64;
        Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
    }

    /// Mean binary cross-entropy, probabilities clipped away from 0 and 1
    pub fn log_loss(labels: &[f64], probabilities: &[f64]) -> Result<f64, MetricError> {
        Self::check_lengths(labels, probabilities)?;

        let eps = 1e-15;
        let total: f64 = labels
            .iter()
            .zip(probabilities.iter())
            .map(|(&y, &p)| {
                let p = p.clamp(eps, 1.0 - eps);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum();
        Ok(total / labels.len() as f64)
    }

    /// Share of rows where `score >= 0.5` matches the label
    pub fn accuracy(labels: &[f64], scores: &[f64]) -> Result<f64, MetricError> {
        Self::check_lengths(labels, scores)?;

        let correct = labels
            .iter()
            .zip(scores.iter())
            .filter(|&(&y, &s)| (s >= 0.5) == (y > 0.5))
            .count();
        Ok(correct as f64 / labels.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_auc_with_ties() {
        let labels = [1.0, 0.0, 0.0, 1.0, 0.0];
        let scores = [1.0, 0.0, 1.0, 1.0, 0.0];

        let auc = Metrics::roc_auc(&labels, &scores).unwrap();
        assert!((auc - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(Metrics::roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(Metrics::roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
        assert_eq!(Metrics::roc_auc(&labels, &[0.5; 4]).unwrap(), 0.5);
    }

    #[test]
    fn test_roc_auc_is_scale_invariant() {
        let labels = [0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
        let scores = [0.1, 0.4, 0.35, 0.8, 0.2, 0.7];
        let scaled: Vec<f64> = scores.iter().map(|s| s * 100.0 - 3.0).collect();

        let a = Metrics::roc_auc(&labels, &scores).unwrap();
        let b = Metrics::roc_auc(&labels, &scaled).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class_is_error() {
        let err = Metrics::roc_auc(&[1.0, 1.0], &[0.2, 0.3]).unwrap_err();
        assert_eq!(
            err,
            MetricError::SingleClass {
                positives: 2,
                negatives: 0
            }
        );
        assert!(Metrics::roc_auc(&[1.0], &[0.2, 0.3]).is_err());
    }

    #[test]
    fn test_log_loss() {
        let loss = Metrics::log_loss(&[1.0, 0.0], &[0.5, 0.5]).unwrap();
        assert!((loss - std::f64::consts::LN_2).abs() < 1e-12);

        let confident = Metrics::log_loss(&[1.0, 0.0], &[0.99, 0.01]).unwrap();
        assert!(confident < loss);
    }

    #[test]
    fn test_accuracy() {
        let acc = Metrics::accuracy(&[0.0, 1.0, 1.0, 0.0, 1.0], &[0.1, 0.9, 0.3, 0.2, 0.6]).unwrap();
        assert!((acc - 0.8).abs() < 1e-10);
    }
}
