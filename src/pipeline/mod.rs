//! Training and inference pipeline
//!
//! - Fold training and the out-of-fold table
//! - Per-fold model store
//! - Ensemble inference and submission assembly
//! - Score and run reports

pub mod inference;
pub mod oof;
pub mod report;
pub mod runner;
pub mod store;
pub mod submission;
pub mod train;

pub use inference::EnsemblePredictor;
pub use oof::{FoldSlice, OofBuilder, OofTable, PRED_COL};
pub use report::{RunSummary, ScoreReport};
pub use runner::{run_infer, run_submit, run_train};
pub use store::ModelStore;
pub use submission::build_submission;
pub use train::{train, FoldResult, FoldStage, FoldTrainer, TrainOutcome};
