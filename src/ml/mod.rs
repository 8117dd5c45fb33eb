//! Fold assignment and evaluation metrics

pub mod cross_validation;
pub mod metrics;

pub use cross_validation::{add_fold, CVSplit, CrossValidator, FOLD_COL};
pub use metrics::{MetricError, Metrics};
