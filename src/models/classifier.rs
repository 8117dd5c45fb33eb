//! Classifier capability used by the fold trainer and the ensemble
//!
//! Any binary classifier that can be fitted on a training split (with a
//! validation split for early stopping), predict probabilities and be
//! serialized with serde can back the pipeline.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::data::Frame;

/// What a fitted model contributes for each row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionKind {
    /// Positive-class probability in [0, 1]
    #[default]
    Probability,
    /// Hard 0/1 label, probability thresholded at 0.5
    Label,
}

impl PredictionKind {
    /// Turn probabilities into the configured output
    pub fn apply(&self, probabilities: Vec<f64>) -> Vec<f64> {
        match self {
            PredictionKind::Probability => probabilities,
            PredictionKind::Label => probabilities
                .into_iter()
                .map(|p| if p >= 0.5 { 1.0 } else { 0.0 })
                .collect(),
        }
    }
}

/// A training or validation split: feature columns plus 0/1 labels
#[derive(Debug, Clone)]
pub struct LabeledFrame {
    pub features: Frame,
    pub labels: Vec<f64>,
}

impl LabeledFrame {
    pub fn new(features: Frame, labels: Vec<f64>) -> Result<Self, ModelError> {
        if features.len() != labels.len() {
            return Err(ModelError::InvalidData(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Binary classifier that the fold trainer fits and the store persists
pub trait Classifier: Sized + Send + Sync + Serialize + DeserializeOwned {
    /// Hyperparameter record
    type Params: Clone + Send + Sync;

    /// Fit a fresh model; `valid` drives early stopping when the model has it
    fn fit(params: &Self::Params, train: &LabeledFrame, valid: &LabeledFrame)
        -> Result<Self, ModelError>;

    /// Positive-class probability for every row of `frame`
    ///
    /// The frame may hold extra columns; the model picks its own features by name.
    fn predict_proba(&self, frame: &Frame) -> Result<Vec<f64>, ModelError>;

    /// Probabilities or labels, as configured
    fn predict(&self, frame: &Frame, kind: PredictionKind) -> Result<Vec<f64>, ModelError> {
        Ok(kind.apply(self.predict_proba(frame)?))
    }

    /// Boosting rounds kept after early stopping, if meaningful
    fn best_iteration(&self) -> Option<usize> {
        None
    }
}
