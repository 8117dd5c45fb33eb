//! Machine learning models module
//!
//! This module provides:
//! - The [`Classifier`] capability the pipeline trains and persists
//! - A gradient-boosted tree classifier implementing it
//! - The regression trees the booster is built from

pub mod classifier;
pub mod gbm;
pub mod tree;

use thiserror::Error;

pub use classifier::{Classifier, PredictionKind};
pub use gbm::{EvalMetric, GbmClassifier, GbmParams, Objective};

/// Errors that can occur with a model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Prediction failed: {0}")]
    PredictionFailed(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}
