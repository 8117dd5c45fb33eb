//! Submission assembly
//!
//! Joins ensemble predictions onto the sample submission by identifier,
//! keeping the sample's row order.

use std::collections::HashMap;

use super::oof::PRED_COL;
use crate::data::{Column, ColumnData, Frame};
use crate::error::DataError;

/// Build `{id_col, target_col}` rows in sample order
///
/// With a `threshold`, the target is written as `True`/`False`; otherwise
/// the averaged prediction is written as is.
pub fn build_submission(
    sample: &Frame,
    predictions: &Frame,
    id_col: &str,
    target_col: &str,
    threshold: Option<f64>,
) -> Result<Frame, DataError> {
    if sample.len() != predictions.len() {
        return Err(DataError::LengthMismatch {
            what: "sample submission vs predictions".to_string(),
            expected: sample.len(),
            actual: predictions.len(),
        });
    }

    let pred_ids = &predictions.column(id_col)?.data;
    let pred_values = predictions.float_values(PRED_COL)?;
    let by_id: HashMap<String, f64> = (0..predictions.len())
        .filter_map(|row| pred_ids.cell(row).map(|id| (id, pred_values[row])))
        .collect();

    let sample_ids = &sample.column(id_col)?.data;
    let mut ids = Vec::with_capacity(sample.len());
    let mut values = Vec::with_capacity(sample.len());
    for row in 0..sample.len() {
        let id = sample_ids.cell(row).unwrap_or_default();
        let value = by_id.get(&id).copied().ok_or_else(|| DataError::UnknownId {
            column: id_col.to_string(),
            id: id.clone(),
        })?;
        ids.push(Some(id));
        values.push(value);
    }

    let target = match threshold {
        Some(t) => ColumnData::Text(
            values
                .into_iter()
                .map(|v| Some(if v >= t { "True" } else { "False" }.to_string()))
                .collect(),
        ),
        None => ColumnData::Float(values),
    };

    Frame::new(vec![
        Column::new(id_col, ColumnData::Text(ids)),
        Column::new(target_col, target),
    ])
}
