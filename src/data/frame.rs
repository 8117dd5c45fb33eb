//! Columnar in-memory table
//!
//! A [`Frame`] holds named, equally long columns. Raw CSV input arrives as
//! text columns; feature typing turns them into categorical or float columns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DataError;

/// Categorical column: per-row codes into a sorted list of levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Categorical {
    /// Code per row, `None` for missing values
    pub codes: Vec<Option<u32>>,
    /// Distinct level strings, sorted
    pub levels: Vec<String>,
}

impl Categorical {
    /// Build a categorical column from optional strings
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let values: Vec<Option<String>> = values
            .into_iter()
            .map(|v| v.map(|s| s.as_ref().to_string()))
            .collect();

        let mut levels: Vec<String> = values.iter().flatten().cloned().collect();
        levels.sort();
        levels.dedup();

        let index: HashMap<&str, u32> = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i as u32))
            .collect();

        let codes = values
            .iter()
            .map(|v| v.as_deref().map(|s| index[s]))
            .collect();

        Self { codes, levels }
    }

    /// Level string at a row
    pub fn get(&self, row: usize) -> Option<&str> {
        self.codes[row].map(|c| self.levels[c as usize].as_str())
    }

    fn take(&self, rows: &[usize]) -> Self {
        Self {
            codes: rows.iter().map(|&r| self.codes[r]).collect(),
            levels: self.levels.clone(),
        }
    }
}

/// Column storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    /// Untyped text, as read from CSV (`None` = empty cell)
    Text(Vec<Option<String>>),
    /// Nominal values
    Categorical(Categorical),
    /// Floating point values, `NaN` = missing
    Float(Vec<f64>),
    /// Integer values (fold ids)
    Int(Vec<i64>),
}

impl ColumnData {
    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Categorical(c) => c.codes.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short type name used in logs and errors
    pub fn dtype(&self) -> &'static str {
        match self {
            ColumnData::Text(_) => "text",
            ColumnData::Categorical(_) => "categorical",
            ColumnData::Float(_) => "float",
            ColumnData::Int(_) => "int",
        }
    }

    /// Render one cell as a string, `None` for missing
    pub fn cell(&self, row: usize) -> Option<String> {
        match self {
            ColumnData::Text(v) => v[row].clone(),
            ColumnData::Categorical(c) => c.get(row).map(str::to_string),
            ColumnData::Float(v) => {
                let x = v[row];
                if x.is_nan() {
                    None
                } else {
                    Some(x.to_string())
                }
            }
            ColumnData::Int(v) => Some(v[row].to_string()),
        }
    }

    fn take(&self, rows: &[usize]) -> Self {
        match self {
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
            ColumnData::Categorical(c) => ColumnData::Categorical(c.take(rows)),
            ColumnData::Float(v) => ColumnData::Float(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Int(v) => ColumnData::Int(rows.iter().map(|&r| v[r]).collect()),
        }
    }
}

/// Named column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn float(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, ColumnData::Float(values))
    }

    pub fn int(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self::new(name, ColumnData::Int(values))
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        Self::new(
            name,
            ColumnData::Text(values.into_iter().map(|v| v.map(Into::into)).collect()),
        )
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Table of equally long named columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Frame {
    /// Create a frame, checking that all columns have the same length
    pub fn new(columns: Vec<Column>) -> Result<Self, DataError> {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);
        for column in &columns {
            if column.len() != n_rows {
                return Err(DataError::LengthMismatch {
                    what: format!("column {}", column.name),
                    expected: n_rows,
                    actual: column.len(),
                });
            }
        }
        Ok(Self { columns, n_rows })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<&Column, DataError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DataError::MissingColumn {
                column: name.to_string(),
            })
    }

    /// Float values of a column
    pub fn float_values(&self, name: &str) -> Result<&[f64], DataError> {
        match &self.column(name)?.data {
            ColumnData::Float(v) => Ok(v),
            other => Err(DataError::Cast {
                column: name.to_string(),
                row: 0,
                value: other.dtype().to_string(),
                target: "float",
            }),
        }
    }

    /// Keep only the named columns, in the given order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame, DataError> {
        let columns = names
            .iter()
            .map(|n| self.column(n.as_ref()).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Frame {
            columns,
            n_rows: self.n_rows,
        })
    }

    /// Rows at the given positions, in the given order
    pub fn take(&self, rows: &[usize]) -> Frame {
        Frame {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(rows)))
                .collect(),
            n_rows: rows.len(),
        }
    }

    /// Add a column, replacing any existing column with the same name
    pub fn with_column(mut self, column: Column) -> Result<Frame, DataError> {
        if !self.columns.is_empty() && column.len() != self.n_rows {
            return Err(DataError::LengthMismatch {
                what: format!("column {}", column.name),
                expected: self.n_rows,
                actual: column.len(),
            });
        }
        if self.columns.is_empty() {
            self.n_rows = column.len();
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame::new(vec![
            Column::text("id", vec![Some("a"), Some("b"), Some("c")]),
            Column::float("x", vec![1.0, f64::NAN, 3.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_categorical_levels_sorted() {
        let cat = Categorical::from_values(vec![Some("mars"), None, Some("earth"), Some("mars")]);
        assert_eq!(cat.levels, vec!["earth", "mars"]);
        assert_eq!(cat.codes, vec![Some(1), None, Some(0), Some(1)]);
        assert_eq!(cat.get(2), Some("earth"));
    }

    #[test]
    fn test_take_and_select() {
        let frame = sample_frame();
        let subset = frame.take(&[2, 0]);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.column("id").unwrap().data.cell(0), Some("c".to_string()));

        let selected = frame.select(&["x"]).unwrap();
        assert_eq!(selected.column_names(), vec!["x"]);
        assert!(frame.select(&["missing"]).is_err());
    }

    #[test]
    fn test_with_column_checks_length() {
        let frame = sample_frame();
        assert!(frame.clone().with_column(Column::float("pred", vec![0.5])).is_err());

        let frame = frame.with_column(Column::float("x", vec![0.0; 3])).unwrap();
        assert_eq!(frame.columns().len(), 2);
        assert_eq!(frame.float_values("x").unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_missing_float_renders_empty() {
        let frame = sample_frame();
        assert_eq!(frame.column("x").unwrap().data.cell(1), None);
    }
}
