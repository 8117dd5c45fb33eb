//! End-to-end runs behind the CLI commands
//!
//! Each run reads its inputs from the dataset directory of a
//! [`PathProvider`] and writes its outputs to the output directory.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use super::inference::EnsemblePredictor;
use super::report::{write_json, RunSummary};
use super::store::ModelStore;
use super::submission::build_submission;
use super::train::{train, TrainOutcome};
use crate::data::{preprocess, DataLoader, Frame};
use crate::error::Result;
use crate::models::GbmClassifier;
use crate::utils::config::ExperimentConfig;
use crate::utils::settings::PathProvider;

pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";
pub const SAMPLE_SUBMISSION_FILE: &str = "sample_submission.csv";
pub const VAL_PRED_FILE: &str = "val_pred.csv";
pub const TEST_PRED_FILE: &str = "test_pred.csv";
pub const SCORES_FILE: &str = "scores.json";
pub const RUN_FILE: &str = "run.json";
pub const SUBMISSION_FILE: &str = "submission.csv";

/// Train all folds, write OOF predictions and reports, then predict `test.csv` if present
pub fn run_train(config: &ExperimentConfig, paths: &dyn PathProvider, run_env: &str) -> Result<TrainOutcome> {
    config.validate()?;
    let started_at = Utc::now();

    let raw = DataLoader::load_csv(paths.comp_dataset_dir().join(TRAIN_FILE))?;
    let frame = preprocess(config, raw)?;
    let n_rows = frame.len();

    let output_dir = paths.output_dir();
    let store = ModelStore::new(output_dir);
    let outcome = train::<GbmClassifier>(config, &config.params, frame, &store)?;

    DataLoader::save_csv(&outcome.oof, output_dir.join(VAL_PRED_FILE))?;
    write_json(&outcome.scores, output_dir.join(SCORES_FILE))?;

    let summary = RunSummary {
        experiment: config.name.clone(),
        run_env: run_env.to_string(),
        started_at,
        finished_at: Utc::now(),
        n_splits: config.n_splits,
        n_rows,
        best_iterations: outcome.best_iterations.clone(),
        overall: outcome.scores.overall,
    };
    write_json(&summary, output_dir.join(RUN_FILE))?;
    info!("Training outputs written to {:?}", output_dir);

    if paths.comp_dataset_dir().join(TEST_FILE).is_file() {
        run_infer(config, paths)?;
    } else {
        info!("No {} found, skipping inference", TEST_FILE);
    }

    Ok(outcome)
}

/// Feature-type `test.csv` and attach the ensemble prediction from `store`
pub fn predict_test(config: &ExperimentConfig, paths: &dyn PathProvider, store: &ModelStore) -> Result<Frame> {
    let raw = DataLoader::load_csv(paths.comp_dataset_dir().join(TEST_FILE))?;
    let frame = preprocess(config, raw)?;
    let ensemble = EnsemblePredictor::<GbmClassifier>::load(store, config.n_splits, config.prediction)?;

    for (name, importance) in mean_feature_importance(ensemble.models()).iter().take(10) {
        info!("Feature importance {:<16} {:.4}", name, importance);
    }
    ensemble.attach(frame)
}

/// Gain importance averaged over fold models, highest first
pub fn mean_feature_importance(models: &[GbmClassifier]) -> Vec<(String, f64)> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for model in models {
        for (name, importance) in model.feature_importance() {
            *totals.entry(name).or_insert(0.0) += importance;
        }
    }

    let k = models.len().max(1) as f64;
    let mut ranked: Vec<(String, f64)> = totals.into_iter().map(|(name, sum)| (name, sum / k)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Predict `test.csv` with the models in the output directory
pub fn run_infer(config: &ExperimentConfig, paths: &dyn PathProvider) -> Result<PathBuf> {
    config.validate()?;
    let store = ModelStore::new(paths.output_dir());
    let pred = predict_test(config, paths, &store)?;

    let path = paths.output_dir().join(TEST_PRED_FILE);
    DataLoader::save_csv(&pred, &path)?;
    info!("Test predictions saved to {:?}", path);
    Ok(path)
}

/// Predict `test.csv` with the experiment's artifacts and write `submission.csv`
pub fn run_submit(config: &ExperimentConfig, paths: &dyn PathProvider, threshold: Option<f64>) -> Result<PathBuf> {
    config.validate()?;
    let store = ModelStore::new(paths.artifact_exp_dir());
    let pred = predict_test(config, paths, &store)?;

    let sample = DataLoader::load_csv(paths.comp_dataset_dir().join(SAMPLE_SUBMISSION_FILE))?;
    let submission = build_submission(&sample, &pred, &config.id_col, &config.target_col, threshold)?;

    let path = paths.output_dir().join(SUBMISSION_FILE);
    DataLoader::save_csv(&submission, &path)?;
    info!("Submission saved to {:?}", path);
    Ok(path)
}
