//! Ensemble inference
//!
//! Loads all K fold models and averages their outputs row-wise with equal
//! weights. A missing artifact fails the load before any model is read.

use tracing::info;

use super::oof::PRED_COL;
use super::store::ModelStore;
use crate::data::{Column, Frame};
use crate::error::{DataError, PipelineError, Result};
use crate::models::{Classifier, PredictionKind};

/// The K fold models of one experiment
#[derive(Debug)]
pub struct EnsemblePredictor<C: Classifier> {
    models: Vec<C>,
    kind: PredictionKind,
}

impl<C: Classifier> EnsemblePredictor<C> {
    /// Build from already loaded models
    pub fn from_models(models: Vec<C>, kind: PredictionKind) -> Result<Self> {
        if models.is_empty() {
            return Err(PipelineError::Configuration(
                "an ensemble needs at least one model".to_string(),
            ));
        }
        Ok(Self { models, kind })
    }

    /// Load `model_0 .. model_{n_splits-1}` from the store
    pub fn load(store: &ModelStore, n_splits: usize, kind: PredictionKind) -> Result<Self> {
        let missing = store.missing(n_splits);
        if !missing.is_empty() {
            return Err(PipelineError::ArtifactMissing {
                expected: n_splits,
                missing,
            });
        }

        let models = (0..n_splits)
            .map(|fold| store.load::<C>(fold))
            .collect::<Result<Vec<_>>>()?;

        info!("Loaded {} models from {:?}", models.len(), store.dir());
        Self::from_models(models, kind)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> &[C] {
        &self.models
    }

    /// Row-wise mean of every model's output
    pub fn predict(&self, frame: &Frame) -> Result<Vec<f64>> {
        let mut sum = vec![0.0; frame.len()];
        for model in &self.models {
            let pred = model
                .predict(frame, self.kind)
                .map_err(PipelineError::Predict)?;
            if pred.len() != sum.len() {
                return Err(DataError::LengthMismatch {
                    what: "model predictions".to_string(),
                    expected: sum.len(),
                    actual: pred.len(),
                }
                .into());
            }
            for (s, p) in sum.iter_mut().zip(pred) {
                *s += p;
            }
        }

        let k = self.models.len() as f64;
        Ok(sum.into_iter().map(|s| s / k).collect())
    }

    /// The input frame with the averaged prediction column attached
    pub fn attach(&self, frame: Frame) -> Result<Frame> {
        let pred = self.predict(&frame)?;
        Ok(frame.with_column(Column::float(PRED_COL, pred))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::classifier::LabeledFrame;
    use crate::models::ModelError;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    /// Returns a fixed output regardless of input
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Fixed(Vec<f64>);

    impl Classifier for Fixed {
        type Params = Vec<f64>;

        fn fit(params: &Vec<f64>, _: &LabeledFrame, _: &LabeledFrame) -> std::result::Result<Self, ModelError> {
            Ok(Fixed(params.clone()))
        }

        fn predict_proba(&self, _: &Frame) -> std::result::Result<Vec<f64>, ModelError> {
            Ok(self.0.clone())
        }
    }

    fn test_frame() -> Frame {
        Frame::new(vec![Column::text("id", vec![Some("a"), Some("b"), Some("c")])]).unwrap()
    }

    #[test]
    fn test_identical_models_average_to_themselves() {
        let models = vec![Fixed(vec![1.0, 0.0, 1.0]); 3];
        let ensemble = EnsemblePredictor::from_models(models, PredictionKind::Probability).unwrap();
        assert_eq!(ensemble.predict(&test_frame()).unwrap(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_disagreeing_models_average() {
        let models = vec![
            Fixed(vec![1.0, 1.0, 0.0]),
            Fixed(vec![0.0, 1.0, 1.0]),
            Fixed(vec![1.0, 0.0, 1.0]),
        ];
        let ensemble = EnsemblePredictor::from_models(models, PredictionKind::Label).unwrap();
        let out = ensemble.attach(test_frame()).unwrap();

        for p in out.float_values(PRED_COL).unwrap() {
            assert!((p - 2.0 / 3.0).abs() < 1e-12);
        }
        assert_eq!(out.column_names(), vec!["id", "pred"]);
    }

    #[test]
    fn test_missing_artifacts_fail_before_loading() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        store.save(0, &Fixed(vec![0.5])).unwrap();
        // Corrupt artifact would fail on load, but the missing check comes first
        std::fs::write(store.path(1), b"garbage").unwrap();

        match EnsemblePredictor::<Fixed>::load(&store, 3, PredictionKind::Probability) {
            Err(PipelineError::ArtifactMissing { expected, missing }) => {
                assert_eq!(expected, 3);
                assert_eq!(missing, vec![store.path(2)]);
            }
            other => panic!("expected ArtifactMissing, got {:?}", other.map(|e| e.len())),
        }
    }

    #[test]
    fn test_load_all_artifacts() {
        let dir = tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        for (fold, v) in [0.2, 0.4, 0.9].iter().enumerate() {
            store.save(fold, &Fixed(vec![*v])).unwrap();
        }

        let ensemble = EnsemblePredictor::<Fixed>::load(&store, 3, PredictionKind::Probability).unwrap();
        assert_eq!(ensemble.len(), 3);
        let frame = Frame::new(vec![Column::float("x", vec![0.0])]).unwrap();
        assert!((ensemble.predict(&frame).unwrap()[0] - 0.5).abs() < 1e-12);
    }
}
