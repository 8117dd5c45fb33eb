//! Feature typing
//!
//! Casts the configured categorical columns to categorical and the configured
//! numerical columns to `f64`. Other columns are left as they are.

use super::frame::{Categorical, Column, ColumnData, Frame};
use crate::error::DataError;
use crate::utils::config::ExperimentConfig;

/// Apply the configured feature types to a raw frame
pub fn preprocess(config: &ExperimentConfig, frame: Frame) -> Result<Frame, DataError> {
    let mut frame = frame;

    for name in &config.categorical_features {
        let column = frame.column(name)?;
        let cast = Column::new(name.clone(), cast_categorical(&column.data));
        frame = frame.with_column(cast)?;
    }

    for name in &config.numerical_features {
        let column = frame.column(name)?;
        let cast = Column::new(name.clone(), cast_float(name, &column.data)?);
        frame = frame.with_column(cast)?;
    }

    Ok(frame)
}

/// Cast any column to categorical
pub fn cast_categorical(data: &ColumnData) -> ColumnData {
    match data {
        ColumnData::Categorical(c) => ColumnData::Categorical(c.clone()),
        other => ColumnData::Categorical(Categorical::from_values(
            (0..other.len()).map(|row| other.cell(row)),
        )),
    }
}

/// Cast any column to `f64`; empty cells become `NaN`
pub fn cast_float(name: &str, data: &ColumnData) -> Result<ColumnData, DataError> {
    let values = match data {
        ColumnData::Float(v) => v.clone(),
        ColumnData::Int(v) => v.iter().map(|&x| x as f64).collect(),
        ColumnData::Text(v) => v
            .iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                None => Ok(f64::NAN),
                Some(s) => parse_float(s).ok_or_else(|| DataError::Cast {
                    column: name.to_string(),
                    row,
                    value: s.clone(),
                    target: "float",
                }),
            })
            .collect::<Result<Vec<_>, _>>()?,
        ColumnData::Categorical(c) => (0..c.codes.len())
            .map(|row| match c.get(row) {
                None => Ok(f64::NAN),
                Some(s) => parse_float(s).ok_or_else(|| DataError::Cast {
                    column: name.to_string(),
                    row,
                    value: s.to_string(),
                    target: "float",
                }),
            })
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(ColumnData::Float(values))
}

/// Parse a number or a boolean literal
pub fn parse_float(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Some(f64::NAN);
    }
    if s.eq_ignore_ascii_case("true") {
        return Some(1.0);
    }
    if s.eq_ignore_ascii_case("false") {
        return Some(0.0);
    }
    s.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExperimentConfig {
        ExperimentConfig {
            categorical_features: vec!["HomePlanet".to_string()],
            numerical_features: vec!["Age".to_string(), "VIP".to_string()],
            ..Default::default()
        }
    }

    fn raw_frame() -> Frame {
        Frame::new(vec![
            Column::text("PassengerId", vec![Some("0001_01"), Some("0002_01"), Some("0003_01")]),
            Column::text("HomePlanet", vec![Some("Europa"), Some("Earth"), None]),
            Column::text("Age", vec![Some("39.0"), None, Some("24")]),
            Column::text("VIP", vec![Some("False"), Some("True"), Some("false")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_preprocess_casts_configured_columns() {
        let frame = preprocess(&config(), raw_frame()).unwrap();

        match &frame.column("HomePlanet").unwrap().data {
            ColumnData::Categorical(c) => {
                assert_eq!(c.levels, vec!["Earth", "Europa"]);
                assert_eq!(c.codes, vec![Some(1), Some(0), None]);
            }
            other => panic!("expected categorical, got {}", other.dtype()),
        }

        let age = frame.float_values("Age").unwrap();
        assert_eq!(age[0], 39.0);
        assert!(age[1].is_nan());
        assert_eq!(age[2], 24.0);

        assert_eq!(frame.float_values("VIP").unwrap(), &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unlisted_columns_pass_through() {
        let frame = preprocess(&config(), raw_frame()).unwrap();
        assert_eq!(
            frame.column("PassengerId").unwrap(),
            raw_frame().column("PassengerId").unwrap()
        );
        assert_eq!(frame.column_names(), raw_frame().column_names());
    }

    #[test]
    fn test_missing_column_fails() {
        let mut cfg = config();
        cfg.numerical_features.push("Spa".to_string());
        let err = preprocess(&cfg, raw_frame()).unwrap_err();
        assert_eq!(
            err,
            DataError::MissingColumn {
                column: "Spa".to_string()
            }
        );
    }

    #[test]
    fn test_unparsable_number_reports_row() {
        let frame = Frame::new(vec![Column::text("Age", vec![Some("12"), Some("old")])]).unwrap();
        let cfg = ExperimentConfig {
            categorical_features: vec![],
            numerical_features: vec!["Age".to_string()],
            ..Default::default()
        };
        match preprocess(&cfg, frame).unwrap_err() {
            DataError::Cast { column, row, value, .. } => {
                assert_eq!(column, "Age");
                assert_eq!(row, 1);
                assert_eq!(value, "old");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
