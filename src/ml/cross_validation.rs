//! Stratified K-fold assignment
//!
//! Rows are grouped by label, each group is shuffled with a seeded RNG, and
//! the groups are dealt onto folds round-robin with one pointer carried
//! across groups. Every fold therefore holds `floor(n/K)` or `ceil(n/K)`
//! rows and every class is spread across folds within one row.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

use crate::data::{Column, Frame};
use crate::error::{DataError, PipelineError, Result};

/// Name of the fold column attached to the training frame
pub const FOLD_COL: &str = "fold";

/// Cross-validation split for one fold
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub fold: usize,
    pub train_indices: Vec<usize>,
    pub valid_indices: Vec<usize>,
}

/// Cross-validator
pub struct CrossValidator;

impl CrossValidator {
    /// Fold id in `[0, n_splits)` for every row
    ///
    /// # Arguments
    /// * `labels` - Class label per row (compared exactly)
    /// * `n_splits` - Number of folds K (>= 2)
    /// * `seed` - Seed for the per-class shuffle
    pub fn stratified_folds(labels: &[f64], n_splits: usize, seed: u64) -> Result<Vec<usize>> {
        if n_splits < 2 {
            return Err(PipelineError::Configuration(format!(
                "n_splits must be >= 2, got {}",
                n_splits
            )));
        }
        if labels.len() < n_splits {
            return Err(DataError::TooFewRows {
                rows: labels.len(),
                n_splits,
            }
            .into());
        }

        // Groups in ascending label order, rows in input order within a group
        let mut groups: BTreeMap<u64, (f64, Vec<usize>)> = BTreeMap::new();
        for (row, &label) in labels.iter().enumerate() {
            groups
                .entry(label_key(label))
                .or_insert_with(|| (label, Vec::new()))
                .1
                .push(row);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut folds = vec![0usize; labels.len()];
        let mut next_fold = 0usize;

        for (label, rows) in groups.values_mut() {
            if rows.len() < n_splits {
                tracing::warn!(
                    "Class {} has {} rows, fewer than {} folds; some folds will not contain it",
                    label,
                    rows.len(),
                    n_splits
                );
            }
            rows.shuffle(&mut rng);
            for &row in rows.iter() {
                folds[row] = next_fold;
                next_fold = (next_fold + 1) % n_splits;
            }
        }

        Ok(folds)
    }

    /// Train/validation indices for every fold of an assignment
    pub fn splits(folds: &[usize], n_splits: usize) -> Vec<CVSplit> {
        (0..n_splits)
            .map(|fold| {
                let (valid_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..folds.len()).partition(|&row| folds[row] == fold);
                CVSplit {
                    fold,
                    train_indices,
                    valid_indices,
                }
            })
            .collect()
    }

    /// Row count per fold
    pub fn fold_sizes(folds: &[usize], n_splits: usize) -> Vec<usize> {
        let mut sizes = vec![0usize; n_splits];
        for &fold in folds {
            sizes[fold] += 1;
        }
        sizes
    }
}

/// Attach a fold assignment as an integer `fold` column
pub fn add_fold(frame: Frame, folds: &[usize]) -> std::result::Result<Frame, DataError> {
    let values = folds.iter().map(|&f| f as i64).collect();
    frame.with_column(Column::int(FOLD_COL, values))
}

/// Order-preserving integer key for a finite label
fn label_key(label: f64) -> u64 {
    // Map the float's bit pattern onto an unsigned total order
    let bits = label.to_bits();
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n_pos: usize, n_neg: usize) -> Vec<f64> {
        let mut y = vec![1.0; n_pos];
        y.extend(vec![0.0; n_neg]);
        y
    }

    #[test]
    fn test_balanced_ten_rows_five_folds() {
        let y = labels(5, 5);
        let folds = CrossValidator::stratified_folds(&y, 5, 42).unwrap();

        assert_eq!(CrossValidator::fold_sizes(&folds, 5), vec![2; 5]);
        for split in CrossValidator::splits(&folds, 5) {
            let positives = split.valid_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 1, "fold {} should hold one row of each class", split.fold);
        }
    }

    #[test]
    fn test_coverage_and_balance() {
        for (n_pos, n_neg, k) in [(7, 13, 3), (50, 3, 4), (1, 9, 5), (33, 34, 10)] {
            let y = labels(n_pos, n_neg);
            let folds = CrossValidator::stratified_folds(&y, k, 7).unwrap();

            assert_eq!(folds.len(), y.len());
            assert!(folds.iter().all(|&f| f < k));

            let sizes = CrossValidator::fold_sizes(&folds, k);
            let n = y.len();
            for size in sizes {
                assert!(size == n / k || size == (n + k - 1) / k);
            }
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let y: Vec<f64> = (0..100).map(|i| ((i * 7) % 3 == 0) as i32 as f64).collect();
        let a = CrossValidator::stratified_folds(&y, 5, 42).unwrap();
        let b = CrossValidator::stratified_folds(&y, 5, 42).unwrap();
        let c = CrossValidator::stratified_folds(&y, 5, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_rare_class_is_tolerated() {
        let y = labels(2, 8);
        let folds = CrossValidator::stratified_folds(&y, 5, 1).unwrap();
        let with_positive: Vec<usize> = (0..2).map(|i| folds[i]).collect();
        assert_ne!(with_positive[0], with_positive[1]);
    }

    #[test]
    fn test_splits_are_disjoint_and_exhaustive() {
        let y = labels(6, 9);
        let folds = CrossValidator::stratified_folds(&y, 3, 0).unwrap();
        let splits = CrossValidator::splits(&folds, 3);

        let mut seen = vec![0; y.len()];
        for split in &splits {
            assert_eq!(split.train_indices.len() + split.valid_indices.len(), y.len());
            for &i in &split.valid_indices {
                seen[i] += 1;
                assert!(!split.train_indices.contains(&i));
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_add_fold_column() {
        let frame = Frame::new(vec![Column::float("x", vec![1.0, 2.0, 3.0])]).unwrap();
        let frame = add_fold(frame, &[2, 0, 1]).unwrap();
        assert_eq!(frame.column_names(), vec!["x", "fold"]);
        assert_eq!(frame.column(FOLD_COL).unwrap().data.cell(0), Some("2".to_string()));

        let short = Frame::new(vec![Column::float("x", vec![1.0])]).unwrap();
        assert!(add_fold(short, &[0, 1]).is_err());
    }

    #[test]
    fn test_too_few_rows() {
        let err = CrossValidator::stratified_folds(&[0.0, 1.0], 3, 0).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Data(DataError::TooFewRows { rows: 2, n_splits: 3 })
        ));
        assert!(CrossValidator::stratified_folds(&[0.0, 1.0], 1, 0).is_err());
    }
}
