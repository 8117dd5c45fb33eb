//! Binary target decoding
//!
//! The target column must hold exactly two distinct values. They are ordered
//! numerically when both parse as numbers or booleans (`False < True`),
//! lexicographically otherwise; the greater one is the positive class.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::frame::Frame;
use super::preprocess::parse_float;
use crate::error::DataError;

/// Mapping between the two raw target values and 0/1 labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryTarget {
    pub column: String,
    pub negative: String,
    pub positive: String,
}

impl BinaryTarget {
    /// Learn the class mapping from a frame and return the decoded labels
    pub fn fit(frame: &Frame, column: &str) -> Result<(Self, Vec<f64>), DataError> {
        let cells = Self::cells(frame, column)?;

        let mut classes: Vec<&str> = cells.iter().map(String::as_str).collect();
        classes.sort_by(|a, b| compare_values(a, b));
        classes.dedup();

        if classes.len() != 2 {
            return Err(DataError::DegenerateTarget {
                column: column.to_string(),
                found: classes.iter().map(|s| s.to_string()).collect(),
            });
        }

        let target = Self {
            column: column.to_string(),
            negative: classes[0].to_string(),
            positive: classes[1].to_string(),
        };
        let labels = target.decode(&cells)?;
        Ok((target, labels))
    }

    fn cells(frame: &Frame, column: &str) -> Result<Vec<String>, DataError> {
        let data = &frame.column(column)?.data;
        (0..data.len())
            .map(|row| {
                data.cell(row).ok_or_else(|| DataError::MissingTarget {
                    column: column.to_string(),
                    row,
                })
            })
            .collect()
    }

    fn decode(&self, cells: &[String]) -> Result<Vec<f64>, DataError> {
        cells
            .iter()
            .map(|cell| {
                if *cell == self.positive {
                    Ok(1.0)
                } else if *cell == self.negative {
                    Ok(0.0)
                } else {
                    Err(DataError::DegenerateTarget {
                        column: self.column.clone(),
                        found: vec![self.negative.clone(), self.positive.clone(), cell.clone()],
                    })
                }
            })
            .collect()
    }
}

fn compare_values(a: &str, b: &str) -> Ordering {
    match (parse_float(a), parse_float(b)) {
        (Some(x), Some(y)) if !x.is_nan() && !y.is_nan() => x.total_cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}
