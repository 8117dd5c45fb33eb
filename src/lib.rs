//! # kfold_gbm - K-fold gradient boosting ensembles
//!
//! Trains one gradient boosted tree classifier per stratified fold of a
//! tabular dataset, scores the out-of-fold predictions with ROC-AUC and
//! averages the K models on unseen data.
//!
//! - Feature typing and CSV frames
//! - Stratified fold assignment
//! - Second-order boosted trees with categorical splits and early stopping
//! - Per-fold model artifacts and ensemble inference
//! - Submission assembly and run directories for local, Kaggle and Vertex runs

pub mod data;
pub mod error;
pub mod ml;
pub mod models;
pub mod pipeline;
pub mod utils;

pub use data::{preprocess, BinaryTarget, DataLoader, Frame};
pub use error::{DataError, PipelineError, Result};
pub use ml::{CrossValidator, Metrics};
pub use models::{Classifier, GbmClassifier, GbmParams, PredictionKind};
pub use pipeline::{EnsemblePredictor, ModelStore, OofBuilder, ScoreReport};
pub use utils::{DirectorySettings, ExperimentConfig, PathProvider, RunEnv};
