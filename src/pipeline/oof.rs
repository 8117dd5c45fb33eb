//! Out-of-fold aggregation
//!
//! Each fold contributes one slice of validation predictions. The builder
//! rejects a row seen twice and only finishes once every fold has
//! contributed and every row is covered.

use std::collections::BTreeMap;

use crate::data::{Column, Frame};
use crate::error::DataError;
use crate::ml::metrics::Metrics;

/// Name of the prediction column added to OOF and inference tables
pub const PRED_COL: &str = "pred";

/// Validation predictions of one fold
#[derive(Debug, Clone, PartialEq)]
pub struct FoldSlice {
    pub fold: usize,
    /// Training row positions of the fold, in training-frame order
    pub rows: Vec<usize>,
    pub predictions: Vec<f64>,
}

/// Collects fold slices into a complete out-of-fold table
#[derive(Debug)]
pub struct OofBuilder {
    n_rows: usize,
    n_splits: usize,
    covered: Vec<bool>,
    slices: BTreeMap<usize, FoldSlice>,
}

impl OofBuilder {
    pub fn new(n_rows: usize, n_splits: usize) -> Self {
        Self {
            n_rows,
            n_splits,
            covered: vec![false; n_rows],
            slices: BTreeMap::new(),
        }
    }

    /// Append one fold's slice
    pub fn push(&mut self, slice: FoldSlice) -> Result<(), DataError> {
        if slice.rows.len() != slice.predictions.len() {
            return Err(DataError::LengthMismatch {
                what: format!("fold {} predictions", slice.fold),
                expected: slice.rows.len(),
                actual: slice.predictions.len(),
            });
        }
        if slice.fold >= self.n_splits {
            return Err(DataError::LengthMismatch {
                what: "fold id".to_string(),
                expected: self.n_splits,
                actual: slice.fold + 1,
            });
        }
        if let Some(&row) = slice.rows.iter().find(|&&r| r >= self.n_rows) {
            return Err(DataError::LengthMismatch {
                what: format!("row index in fold {}", slice.fold),
                expected: self.n_rows,
                actual: row + 1,
            });
        }

        if self.slices.contains_key(&slice.fold) {
            return Err(DataError::DuplicateRow {
                row: slice.rows.first().copied().unwrap_or_default(),
                fold: slice.fold,
            });
        }

        // Check everything before marking anything, so a rejected slice leaves no trace
        let mut seen = vec![false; self.n_rows];
        for &row in &slice.rows {
            if self.covered[row] || seen[row] {
                return Err(DataError::DuplicateRow {
                    row,
                    fold: slice.fold,
                });
            }
            seen[row] = true;
        }
        for &row in &slice.rows {
            self.covered[row] = true;
        }

        self.slices.insert(slice.fold, slice);
        Ok(())
    }

    /// Finalise, requiring all folds and every row
    pub fn finish(self) -> Result<OofTable, DataError> {
        let missing_folds: Vec<usize> = (0..self.n_splits)
            .filter(|f| !self.slices.contains_key(f))
            .collect();
        let covered = self.covered.iter().filter(|&&c| c).count();

        if !missing_folds.is_empty() || covered != self.n_rows {
            return Err(DataError::IncompleteFolds {
                missing_folds,
                covered,
                rows: self.n_rows,
            });
        }

        let mut table = OofTable {
            rows: Vec::with_capacity(self.n_rows),
            predictions: Vec::with_capacity(self.n_rows),
            fold_ends: Vec::with_capacity(self.n_splits),
        };
        for slice in self.slices.into_values() {
            table.rows.extend(slice.rows);
            table.predictions.extend(slice.predictions);
            table.fold_ends.push(table.rows.len());
        }
        Ok(table)
    }
}

/// Complete out-of-fold predictions, rows in fold order
#[derive(Debug, Clone, PartialEq)]
pub struct OofTable {
    pub rows: Vec<usize>,
    pub predictions: Vec<f64>,
    /// Exclusive end of each fold's rows
    fold_ends: Vec<usize>,
}

impl OofTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Labels reordered to match the table rows
    pub fn labels(&self, labels: &[f64]) -> Vec<f64> {
        self.rows.iter().map(|&r| labels[r]).collect()
    }

    /// Training frame rows in fold order with the prediction column attached
    pub fn to_frame(&self, frame: &Frame) -> Result<Frame, DataError> {
        frame
            .take(&self.rows)
            .with_column(Column::float(PRED_COL, self.predictions.clone()))
    }

    /// ROC-AUC over the rows of folds `0..=k`, for every k
    ///
    /// `None` where the cumulative rows hold a single class.
    pub fn running_scores(&self, labels: &[f64]) -> Vec<Option<f64>> {
        let ordered = self.labels(labels);
        self.fold_ends
            .iter()
            .enumerate()
            .map(|(fold, &end)| {
                match Metrics::roc_auc(&ordered[..end], &self.predictions[..end]) {
                    Ok(score) => Some(score),
                    Err(e) => {
                        tracing::warn!("Running score after fold {} is undefined: {}", fold, e);
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(fold: usize, rows: Vec<usize>, predictions: Vec<f64>) -> FoldSlice {
        FoldSlice {
            fold,
            rows,
            predictions,
        }
    }

    #[test]
    fn test_builds_in_fold_order() {
        let mut builder = OofBuilder::new(5, 2);
        builder.push(slice(1, vec![1, 3], vec![0.1, 0.3])).unwrap();
        builder.push(slice(0, vec![0, 2, 4], vec![0.0, 0.2, 0.4])).unwrap();

        let table = builder.finish().unwrap();
        assert_eq!(table.rows, vec![0, 2, 4, 1, 3]);
        assert_eq!(table.predictions, vec![0.0, 0.2, 0.4, 0.1, 0.3]);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_duplicate_row_rejected() {
        let mut builder = OofBuilder::new(4, 2);
        builder.push(slice(0, vec![0, 1], vec![0.5, 0.5])).unwrap();
        let err = builder.push(slice(1, vec![1, 2], vec![0.5, 0.5])).unwrap_err();
        assert_eq!(err, DataError::DuplicateRow { row: 1, fold: 1 });

        // Rejected slice left no rows behind
        builder.push(slice(1, vec![2, 3], vec![0.5, 0.5])).unwrap();
        assert!(builder.finish().is_ok());
    }

    #[test]
    fn test_incomplete_table_rejected() {
        let mut builder = OofBuilder::new(4, 3);
        builder.push(slice(0, vec![0, 1], vec![0.5, 0.5])).unwrap();
        let err = builder.finish().unwrap_err();
        assert_eq!(
            err,
            DataError::IncompleteFolds {
                missing_folds: vec![1, 2],
                covered: 2,
                rows: 4
            }
        );
    }

    #[test]
    fn test_running_scores() {
        // Fold 0 holds only positives, so its running score is undefined
        let labels = [1.0, 0.0, 0.0, 1.0, 0.0];
        let mut builder = OofBuilder::new(5, 2);
        builder.push(slice(0, vec![0, 3], vec![1.0, 1.0])).unwrap();
        builder.push(slice(1, vec![1, 2, 4], vec![0.0, 1.0, 0.0])).unwrap();
        let table = builder.finish().unwrap();

        let scores = table.running_scores(&labels);
        assert_eq!(scores[0], None);
        assert!((scores[1].unwrap() - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_to_frame_attaches_predictions() {
        let frame = Frame::new(vec![Column::text("id", vec![Some("a"), Some("b")])]).unwrap();
        let mut builder = OofBuilder::new(2, 2);
        builder.push(slice(0, vec![1], vec![0.9])).unwrap();
        builder.push(slice(1, vec![0], vec![0.1])).unwrap();

        let out = builder.finish().unwrap().to_frame(&frame).unwrap();
        assert_eq!(out.column("id").unwrap().data.cell(0), Some("b".to_string()));
        assert_eq!(out.float_values(PRED_COL).unwrap(), &[0.9, 0.1]);
    }
}
