//! Fold training
//!
//! Every fold goes through `Pending -> Split -> Fitting -> Validated ->
//! Persisted`. Folds share nothing mutable: each writes its own artifact and
//! returns its validation slice, and the slices are merged in fold order
//! after all folds finish.

use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

use super::oof::{FoldSlice, OofBuilder, OofTable};
use super::report::ScoreReport;
use super::store::ModelStore;
use crate::data::{BinaryTarget, Frame};
use crate::error::{PipelineError, Result};
use crate::ml::cross_validation::{add_fold, CVSplit, CrossValidator};
use crate::ml::metrics::Metrics;
use crate::models::classifier::LabeledFrame;
use crate::models::{Classifier, ModelError};
use crate::utils::config::ExperimentConfig;

/// Lifecycle of one fold, forward only
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FoldStage {
    Pending,
    Split,
    Fitting,
    Validated,
    Persisted,
}

impl FoldStage {
    fn advance(&mut self, fold: usize, next: FoldStage) {
        debug_assert!(next > *self, "fold {} cannot move from {:?} to {:?}", fold, self, next);
        debug!("Fold {}: {:?} -> {:?}", fold, self, next);
        *self = next;
    }
}

/// What one fold produced
#[derive(Debug, Clone)]
pub struct FoldResult {
    pub slice: FoldSlice,
    pub artifact: PathBuf,
    pub best_iteration: Option<usize>,
    pub stage: FoldStage,
}

/// Everything a training run produced
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Training frame with `fold`, in fold order, with the `pred` column
    pub oof: Frame,
    pub scores: ScoreReport,
    pub folds: Vec<usize>,
    pub target: BinaryTarget,
    pub best_iterations: Vec<Option<usize>>,
}

/// Trains one classifier per fold and persists it
pub struct FoldTrainer<'a, C: Classifier> {
    config: &'a ExperimentConfig,
    params: &'a C::Params,
    store: &'a ModelStore,
}

impl<'a, C: Classifier> FoldTrainer<'a, C> {
    pub fn new(config: &'a ExperimentConfig, params: &'a C::Params, store: &'a ModelStore) -> Self {
        Self {
            config,
            params,
            store,
        }
    }

    /// Split, fit, validate and persist a single fold
    pub fn train_fold(&self, features: &Frame, labels: &[f64], split: &CVSplit) -> Result<FoldResult> {
        let fold = split.fold;
        let fit_err = |source: ModelError| PipelineError::Fit { fold, source };
        let mut stage = FoldStage::Pending;

        info!("Training fold {}...", fold);

        let train = LabeledFrame::new(
            features.take(&split.train_indices),
            split.train_indices.iter().map(|&i| labels[i]).collect(),
        )
        .map_err(fit_err)?;
        let valid = LabeledFrame::new(
            features.take(&split.valid_indices),
            split.valid_indices.iter().map(|&i| labels[i]).collect(),
        )
        .map_err(fit_err)?;
        stage.advance(fold, FoldStage::Split);

        stage.advance(fold, FoldStage::Fitting);
        let model = C::fit(self.params, &train, &valid).map_err(fit_err)?;

        let predictions = model
            .predict(&valid.features, self.config.prediction)
            .map_err(PipelineError::Predict)?;
        stage.advance(fold, FoldStage::Validated);

        let artifact = self.store.save(fold, &model)?;
        stage.advance(fold, FoldStage::Persisted);

        info!(
            "Fold {} done: {} train rows, {} valid rows",
            fold,
            train.len(),
            valid.len()
        );

        Ok(FoldResult {
            slice: FoldSlice {
                fold,
                rows: split.valid_indices.clone(),
                predictions,
            },
            artifact,
            best_iteration: model.best_iteration(),
            stage,
        })
    }

    /// Train every fold of an assignment, in fold order
    pub fn train_all(&self, features: &Frame, labels: &[f64], folds: &[usize]) -> Result<Vec<FoldResult>> {
        let splits = CrossValidator::splits(folds, self.config.n_splits);

        if self.config.parallel_folds {
            splits
                .par_iter()
                .map(|split| self.train_fold(features, labels, split))
                .collect()
        } else {
            splits
                .iter()
                .map(|split| self.train_fold(features, labels, split))
                .collect()
        }
    }
}

/// Full training run on a feature-typed frame holding the target column
///
/// Decodes the target, assigns stratified folds, trains and persists K
/// models, assembles the out-of-fold table and scores it.
pub fn train<C: Classifier>(
    config: &ExperimentConfig,
    params: &C::Params,
    frame: Frame,
    store: &ModelStore,
) -> Result<TrainOutcome> {
    let (target, labels) = BinaryTarget::fit(&frame, &config.target_col)?;
    let folds = CrossValidator::stratified_folds(&labels, config.n_splits, config.seed)?;
    let frame = add_fold(frame, &folds)?;
    let features = frame.select(config.feature_cols().as_slice())?;

    info!(
        "Training {} folds on {} rows ({} features)",
        config.n_splits,
        frame.len(),
        features.columns().len()
    );

    store.clear(config.n_splits)?;
    let trainer = FoldTrainer::<C>::new(config, params, store);
    let results = trainer.train_all(&features, &labels, &folds)?;

    let mut builder = OofBuilder::new(frame.len(), config.n_splits);
    let mut best_iterations = Vec::with_capacity(results.len());
    for result in results {
        best_iterations.push(result.best_iteration);
        builder.push(result.slice)?;
    }
    let table: OofTable = builder.finish()?;

    let running = table.running_scores(&labels);
    for (fold, score) in running.iter().enumerate() {
        if let Some(score) = score {
            info!("Score after fold {}: roc_auc = {:.5}", fold, score);
        }
    }

    let oof_labels = table.labels(&labels);
    let overall = Metrics::roc_auc(&oof_labels, &table.predictions)?;
    let accuracy = Metrics::accuracy(&oof_labels, &table.predictions)?;
    info!(
        "Overall out-of-fold roc_auc = {:.5}, accuracy = {:.5}",
        overall, accuracy
    );

    Ok(TrainOutcome {
        oof: table.to_frame(&frame)?,
        scores: ScoreReport::new(&running, overall),
        folds,
        target,
        best_iterations,
    })
}
