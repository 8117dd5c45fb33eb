//! CSV loading and saving for frames
//!
//! Every input column is read as text; typing happens in
//! [`crate::data::preprocess`]. Empty cells become missing values.

use csv::{ReaderBuilder, Writer};
use std::path::Path;

use super::frame::{Column, ColumnData, Frame};
use crate::error::{PipelineError, Result};

/// Data loader for CSV files
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file with a header row into a frame of text columns
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Frame> {
        let path = path.as_ref();
        let csv_err = |source: csv::Error| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(csv_err)?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            for (i, field) in record.iter().enumerate() {
                let cell = if field.is_empty() {
                    None
                } else {
                    Some(field.to_string())
                };
                values[i].push(cell);
            }
        }

        let columns = headers
            .into_iter()
            .zip(values)
            .map(|(name, v)| Column::new(name, ColumnData::Text(v)))
            .collect();

        let frame = Frame::new(columns)?;
        tracing::debug!("Loaded {} rows from {:?}", frame.len(), path);
        Ok(frame)
    }

    /// Write a frame as CSV, missing values as empty cells
    pub fn save_csv<P: AsRef<Path>>(frame: &Frame, path: P) -> Result<()> {
        let path = path.as_ref();
        let csv_err = |source: csv::Error| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut writer = Writer::from_path(path).map_err(csv_err)?;
        writer
            .write_record(frame.column_names())
            .map_err(csv_err)?;

        for row in 0..frame.len() {
            let record: Vec<String> = frame
                .columns()
                .iter()
                .map(|c| c.data.cell(row).unwrap_or_default())
                .collect();
            writer.write_record(&record).map_err(csv_err)?;
        }

        writer.flush().map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_csv() {
        let frame = Frame::new(vec![
            Column::text("PassengerId", vec![Some("0001_01"), Some("0002_01")]),
            Column::text("HomePlanet", vec![Some("Europa"), None]),
            Column::float("pred", vec![0.25, 1.0]),
        ])
        .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("frame.csv");

        DataLoader::save_csv(&frame, &path).unwrap();
        let loaded = DataLoader::load_csv(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.column_names(), vec!["PassengerId", "HomePlanet", "pred"]);
        let planet = &loaded.column("HomePlanet").unwrap().data;
        assert_eq!(planet.cell(0), Some("Europa".to_string()));
        assert_eq!(planet.cell(1), None);
        assert_eq!(
            loaded.column("pred").unwrap().data.cell(0),
            Some("0.25".to_string())
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = DataLoader::load_csv(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::Csv { .. }));
    }
}
