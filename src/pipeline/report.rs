//! Score and run reports written next to the artifacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Running ROC-AUC recorded after a fold, `None` when undefined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoldScore {
    pub roc_auc: Option<f64>,
}

/// ROC-AUC over the complete out-of-fold table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    pub roc_auc: f64,
}

/// Contents of `scores.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub folds: BTreeMap<usize, FoldScore>,
    pub overall: OverallScore,
}

impl ScoreReport {
    pub fn new(running: &[Option<f64>], overall: f64) -> Self {
        Self {
            folds: running
                .iter()
                .enumerate()
                .map(|(fold, &roc_auc)| (fold, FoldScore { roc_auc }))
                .collect(),
            overall: OverallScore { roc_auc: overall },
        }
    }
}

/// Contents of `run.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub experiment: String,
    pub run_env: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub n_splits: usize,
    pub n_rows: usize,
    /// Best boosting round per fold, when the model reports one
    pub best_iterations: Vec<Option<usize>>,
    pub overall: OverallScore,
}

/// Write any report as pretty JSON
pub fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PipelineError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| PipelineError::Report {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    std::fs::write(path, content).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_score_report_json() {
        let report = ScoreReport::new(&[None, Some(0.75)], 0.8);
        let json = serde_json::to_value(&report).unwrap();

        assert!(json["folds"]["0"]["roc_auc"].is_null());
        assert_eq!(json["folds"]["1"]["roc_auc"], 0.75);
        assert_eq!(json["overall"]["roc_auc"], 0.8);
    }

    #[test]
    fn test_write_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("scores.json");
        let report = ScoreReport::new(&[Some(0.5)], 0.5);

        write_json(&report, &path).unwrap();
        let loaded: ScoreReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, report);
    }
}
