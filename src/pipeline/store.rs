//! File-based model store
//!
//! One bincode artifact per fold, `model_<fold>.bin`, inside the experiment
//! output directory. Each artifact carries its fold id so a renamed or
//! misplaced file is caught on load.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::models::Classifier;

/// Artifact format tag written into every envelope
pub const ARTIFACT_FORMAT: &str = "kfold_gbm/1";

#[derive(Serialize, Deserialize)]
struct ArtifactEnvelope<M> {
    format: String,
    fold: usize,
    model: M,
}

/// Per-fold artifact store rooted at one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifact path for a fold
    pub fn path(&self, fold: usize) -> PathBuf {
        self.dir.join(format!("model_{}.bin", fold))
    }

    /// Artifact paths of folds `0..n_splits` that do not exist
    pub fn missing(&self, n_splits: usize) -> Vec<PathBuf> {
        (0..n_splits)
            .map(|fold| self.path(fold))
            .filter(|path| !path.is_file())
            .collect()
    }

    /// Remove the artifacts of folds `0..n_splits` left by an earlier run
    ///
    /// Called before training so a run that fails part way cannot leave a
    /// mix of old and new fold models that loads as a complete ensemble.
    pub fn clear(&self, n_splits: usize) -> Result<()> {
        for fold in 0..n_splits {
            let path = self.path(fold);
            if path.is_file() {
                fs::remove_file(&path).map_err(|source| PipelineError::ArtifactIo {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!("Removed stale artifact {:?}", path);
            }
        }
        Ok(())
    }

    /// Write a fold's model, creating the directory and overwriting any previous artifact
    pub fn save<C: Classifier>(&self, fold: usize, model: &C) -> Result<PathBuf> {
        let path = self.path(fold);
        fs::create_dir_all(&self.dir).map_err(|source| PipelineError::ArtifactIo {
            path: self.dir.clone(),
            source,
        })?;

        let envelope = ArtifactEnvelope {
            format: ARTIFACT_FORMAT.to_string(),
            fold,
            model,
        };
        let bytes = bincode::serialize(&envelope).map_err(|e| PipelineError::ArtifactCorrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        // Rename into place so an interrupted write never leaves a truncated artifact
        let tmp = path.with_extension("bin.tmp");
        fs::write(&tmp, bytes).map_err(|source| PipelineError::ArtifactIo {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| PipelineError::ArtifactIo {
            path: path.clone(),
            source,
        })?;

        tracing::debug!("Saved fold {} model to {:?}", fold, path);
        Ok(path)
    }

    /// Read a fold's model
    pub fn load<C: Classifier>(&self, fold: usize) -> Result<C> {
        let path = self.path(fold);
        let bytes = fs::read(&path).map_err(|source| PipelineError::ArtifactIo {
            path: path.clone(),
            source,
        })?;

        let envelope: ArtifactEnvelope<C> =
            bincode::deserialize(&bytes).map_err(|e| PipelineError::ArtifactCorrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        if envelope.format != ARTIFACT_FORMAT {
            return Err(PipelineError::ArtifactCorrupt {
                path,
                reason: format!("unknown format {:?}", envelope.format),
            });
        }
        if envelope.fold != fold {
            return Err(PipelineError::ArtifactCorrupt {
                path,
                reason: format!("artifact holds fold {}, expected {}", envelope.fold, fold),
            });
        }

        Ok(envelope.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Frame};
    use crate::models::classifier::LabeledFrame;
    use crate::models::{GbmClassifier, GbmParams};
    use tempfile::tempdir;

    fn fitted() -> (GbmClassifier, Frame) {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..20).map(|i| (i % 3 == 0) as i32 as f64).collect();
        let frame = Frame::new(vec![Column::float("x", x)]).unwrap();
        let split = LabeledFrame::new(frame.clone(), y).unwrap();
        let model = GbmClassifier::fit(&GbmParams::default(), &split, &split).unwrap();
        (model, frame)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("exp").join("1"));
        let (model, frame) = fitted();

        let path = store.save(2, &model).unwrap();
        assert_eq!(path, store.path(2));
        assert!(path.ends_with("model_2.bin"));

        let loaded: GbmClassifier = store.load(2).unwrap();
        assert_eq!(
            loaded.predict_proba(&frame).unwrap(),
            model.predict_proba(&frame).unwrap()
        );

        // Overwrite is allowed
        store.save(2, &model).unwrap();
        assert!(!store.dir().join("model_2.bin.tmp").exists());
        assert_eq!(fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_clear_removes_fold_artifacts() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let (model, _) = fitted();

        for fold in 0..3 {
            store.save(fold, &model).unwrap();
        }
        fs::write(dir.path().join("val_pred.csv"), "id,pred\n").unwrap();

        store.clear(3).unwrap();
        assert_eq!(store.missing(3).len(), 3);
        assert!(dir.path().join("val_pred.csv").is_file());

        // Nothing to remove is fine, as is a missing directory
        store.clear(3).unwrap();
        ModelStore::new(dir.path().join("absent")).clear(3).unwrap();
    }

    #[test]
    fn test_missing_and_mismatched_artifacts() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let (model, _) = fitted();

        store.save(0, &model).unwrap();
        assert_eq!(store.missing(3), vec![store.path(1), store.path(2)]);

        assert!(matches!(
            store.load::<GbmClassifier>(1),
            Err(PipelineError::ArtifactIo { .. })
        ));

        fs::copy(store.path(0), store.path(1)).unwrap();
        assert!(matches!(
            store.load::<GbmClassifier>(1),
            Err(PipelineError::ArtifactCorrupt { .. })
        ));

        fs::write(store.path(2), b"not a model").unwrap();
        assert!(matches!(
            store.load::<GbmClassifier>(2),
            Err(PipelineError::ArtifactCorrupt { .. })
        ));
    }
}
