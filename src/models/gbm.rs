//! Gradient boosted tree classifier
//!
//! Binary logistic boosting over second-order regression trees, with native
//! categorical splits, learned missing-value directions and early stopping
//! on a validation split.

use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::classifier::{Classifier, LabeledFrame};
use super::tree::{FeatureKind, RegressionTree, TreeParams};
use super::ModelError;
use crate::data::{ColumnData, Frame};
use crate::ml::metrics::{MetricError, Metrics};

/// Learning objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Objective {
    /// Logistic loss on 0/1 labels, outputs probabilities
    #[default]
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
}

/// Metric watched on the validation split for early stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMetric {
    #[default]
    Auc,
    Logloss,
}

impl EvalMetric {
    pub fn evaluate(&self, labels: &[f64], probabilities: &[f64]) -> Result<f64, MetricError> {
        match self {
            EvalMetric::Auc => Metrics::roc_auc(labels, probabilities),
            EvalMetric::Logloss => Metrics::log_loss(labels, probabilities),
        }
    }

    pub fn higher_is_better(&self) -> bool {
        matches!(self, EvalMetric::Auc)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EvalMetric::Auc => "auc",
            EvalMetric::Logloss => "logloss",
        }
    }
}

/// GBM hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    /// Learning objective
    pub objective: Objective,
    /// Maximum number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum hessian sum required in each child
    pub min_child_weight: f64,
    /// L2 penalty on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction required to split
    pub gamma: f64,
    /// Subsample ratio of the training rows per round
    pub subsample: f64,
    /// Validation metric for early stopping
    pub eval_metric: EvalMetric,
    /// Rounds without improvement before stopping, 0 disables
    pub early_stopping_rounds: usize,
    /// Seed for row subsampling
    pub seed: u64,
    /// Split categorical columns on category sets instead of ordinal codes
    pub enable_categorical: bool,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            objective: Objective::BinaryLogistic,
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 1.0,
            eval_metric: EvalMetric::Auc,
            early_stopping_rounds: 10,
            seed: 42,
            enable_categorical: true,
        }
    }
}

impl GbmParams {
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |msg: String| Err(ModelError::InvalidParams(msg));

        if self.n_estimators == 0 {
            return invalid("n_estimators must be >= 1".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return invalid(format!("subsample must be in (0, 1], got {}", self.subsample));
        }
        if self.min_child_weight < 0.0 || self.reg_lambda < 0.0 || self.gamma < 0.0 {
            return invalid("min_child_weight, reg_lambda and gamma must be >= 0".to_string());
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_child_weight: self.min_child_weight,
            reg_lambda: self.reg_lambda,
            gamma: self.gamma,
            learning_rate: self.learning_rate,
        }
    }
}

/// How a feature column is encoded into the model matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Encoding {
    Numeric,
    /// Set splits over the training levels
    Categorical { levels: Vec<String> },
    /// Training level index used as an ordered number
    Ordinal { levels: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FeatureSpec {
    name: String,
    encoding: Encoding,
}

impl FeatureSpec {
    fn kind(&self) -> FeatureKind {
        match self.encoding {
            Encoding::Categorical { .. } => FeatureKind::Categorical,
            Encoding::Numeric | Encoding::Ordinal { .. } => FeatureKind::Numeric,
        }
    }

    fn from_column(name: &str, data: &ColumnData, enable_categorical: bool) -> Result<Self, ModelError> {
        let encoding = match data {
            ColumnData::Float(_) | ColumnData::Int(_) => Encoding::Numeric,
            ColumnData::Categorical(c) if enable_categorical => Encoding::Categorical {
                levels: c.levels.clone(),
            },
            ColumnData::Categorical(c) => Encoding::Ordinal {
                levels: c.levels.clone(),
            },
            ColumnData::Text(_) => {
                return Err(ModelError::InvalidData(format!(
                    "column {} is untyped text; run feature typing first",
                    name
                )))
            }
        };
        Ok(Self {
            name: name.to_string(),
            encoding,
        })
    }

    /// Values of this feature for every row, `NaN` for missing or unseen
    fn encode(&self, data: &ColumnData) -> Result<Vec<f64>, ModelError> {
        match (&self.encoding, data) {
            (Encoding::Numeric, ColumnData::Float(v)) => Ok(v.clone()),
            (Encoding::Numeric, ColumnData::Int(v)) => Ok(v.iter().map(|&x| x as f64).collect()),
            (Encoding::Categorical { levels } | Encoding::Ordinal { levels }, ColumnData::Categorical(c)) => {
                // Column level index -> model code, matched by level string
                let remap: Vec<Option<u32>> = c
                    .levels
                    .iter()
                    .map(|l| levels.binary_search(l).ok().map(|i| i as u32))
                    .collect();
                Ok(c.codes
                    .iter()
                    .map(|code| {
                        code.and_then(|k| remap[k as usize])
                            .map_or(f64::NAN, |m| m as f64)
                    })
                    .collect())
            }
            (_, other) => Err(ModelError::InvalidData(format!(
                "column {} has type {}, model expects {}",
                self.name,
                other.dtype(),
                match self.encoding {
                    Encoding::Numeric => "float",
                    _ => "categorical",
                }
            ))),
        }
    }
}

/// Gradient boosted tree classifier for binary targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmClassifier {
    params: GbmParams,
    features: Vec<FeatureSpec>,
    base_margin: f64,
    trees: Vec<RegressionTree>,
    best_iteration: Option<usize>,
}

impl GbmClassifier {
    /// Number of trees kept
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Total split gain per feature, normalised to sum to 1
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let mut totals = vec![0.0; self.features.len()];
        for tree in &self.trees {
            tree.accumulate_gain(&mut totals);
        }
        let sum: f64 = totals.iter().sum();

        self.features
            .iter()
            .zip(totals)
            .map(|(f, g)| (f.name.clone(), if sum > 0.0 { g / sum } else { 0.0 }))
            .collect()
    }

    /// Encode the model's features from `frame` into a dense matrix
    fn encode(&self, frame: &Frame) -> Result<Array2<f64>, ModelError> {
        encode_matrix(&self.features, frame)
    }

    fn margins(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.base_margin
                    + self
                        .trees
                        .iter()
                        .map(|t| t.predict_row(row))
                        .sum::<f64>()
            })
            .collect()
    }
}

fn encode_matrix(features: &[FeatureSpec], frame: &Frame) -> Result<Array2<f64>, ModelError> {
    let mut x = Array2::<f64>::zeros((frame.len(), features.len()));
    for (j, spec) in features.iter().enumerate() {
        let column = frame
            .column(&spec.name)
            .map_err(|e| ModelError::InvalidData(e.to_string()))?;
        let values = spec.encode(&column.data)?;
        for (i, v) in values.into_iter().enumerate() {
            x[[i, j]] = v;
        }
    }
    Ok(x)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn check_labels(labels: &[f64]) -> Result<(), ModelError> {
    match labels.iter().position(|&y| y != 0.0 && y != 1.0) {
        Some(row) => Err(ModelError::InvalidData(format!(
            "label {} at row {} is not 0 or 1",
            labels[row], row
        ))),
        None => Ok(()),
    }
}

impl Classifier for GbmClassifier {
    type Params = GbmParams;

    fn fit(params: &GbmParams, train: &LabeledFrame, valid: &LabeledFrame) -> Result<Self, ModelError> {
        params.validate()?;
        if train.is_empty() {
            return Err(ModelError::InvalidData("Empty training split".to_string()));
        }
        check_labels(&train.labels)?;
        check_labels(&valid.labels)?;

        let features = train
            .features
            .columns()
            .iter()
            .map(|c| FeatureSpec::from_column(&c.name, &c.data, params.enable_categorical))
            .collect::<Result<Vec<_>, _>>()?;
        if features.is_empty() {
            return Err(ModelError::InvalidData("No feature columns".to_string()));
        }
        let kinds: Vec<FeatureKind> = features.iter().map(FeatureSpec::kind).collect();

        let x = encode_matrix(&features, &train.features)?;
        let y = &train.labels;
        let n = y.len();

        info!(
            "Training GBM classifier with {} samples and {} features",
            n,
            features.len()
        );

        let prior = (y.iter().sum::<f64>() / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_margin = (prior / (1.0 - prior)).ln();

        let mut model = Self {
            params: params.clone(),
            features,
            base_margin,
            trees: Vec::with_capacity(params.n_estimators),
            best_iteration: None,
        };

        let valid_x = if valid.is_empty() {
            None
        } else {
            Some(model.encode(&valid.features)?)
        };

        let metric = params.eval_metric;
        let mut early_stopping = params.early_stopping_rounds > 0 && valid_x.is_some();
        if early_stopping {
            if let Err(e) = metric.evaluate(&valid.labels, &vec![prior; valid.len()]) {
                warn!("Validation {} is undefined ({}); early stopping disabled", metric.name(), e);
                early_stopping = false;
            }
        }

        let tree_params = params.tree_params();
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let all_rows: Vec<usize> = (0..n).collect();
        let sample_size = ((n as f64 * params.subsample).ceil() as usize).clamp(1, n);

        let mut margin = vec![base_margin; n];
        let mut valid_margin = vec![base_margin; valid.len()];
        let mut best: Option<(usize, f64)> = None;

        for round in 0..params.n_estimators {
            let (grad, hess): (Vec<f64>, Vec<f64>) = margin
                .iter()
                .zip(y.iter())
                .map(|(&m, &label)| {
                    let p = sigmoid(m);
                    (p - label, (p * (1.0 - p)).max(1e-16))
                })
                .unzip();

            let rows = if sample_size < n {
                let mut rows = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                rows.sort_unstable();
                rows
            } else {
                all_rows.clone()
            };

            let tree = RegressionTree::fit(&x, &kinds, &grad, &hess, &rows, &tree_params);
            for (i, row) in x.rows().into_iter().enumerate() {
                margin[i] += tree.predict_row(row);
            }

            if let Some(vx) = &valid_x {
                for (i, row) in vx.rows().into_iter().enumerate() {
                    valid_margin[i] += tree.predict_row(row);
                }
            }
            model.trees.push(tree);

            if !early_stopping {
                if (round + 1) % 10 == 0 {
                    debug!("Round {}: {} trees", round + 1, model.trees.len());
                }
                continue;
            }

            let probabilities: Vec<f64> = valid_margin.iter().map(|&m| sigmoid(m)).collect();
            let score = metric
                .evaluate(&valid.labels, &probabilities)
                .map_err(|e| ModelError::TrainingFailed(e.to_string()))?;

            if (round + 1) % 10 == 0 {
                debug!("Round {}: valid {} = {:.5}", round + 1, metric.name(), score);
            }

            let improved = match best {
                None => true,
                Some((_, b)) if metric.higher_is_better() => score > b,
                Some((_, b)) => score < b,
            };
            if improved {
                best = Some((round, score));
            } else if let Some((best_round, best_score)) = best {
                if round - best_round >= params.early_stopping_rounds {
                    info!(
                        "Early stopping at round {}, best round {} ({} = {:.5})",
                        round + 1,
                        best_round + 1,
                        metric.name(),
                        best_score
                    );
                    break;
                }
            }
        }

        if let Some((best_round, _)) = best {
            model.trees.truncate(best_round + 1);
            model.best_iteration = Some(best_round);
        }

        info!("Classifier training completed with {} trees", model.trees.len());
        Ok(model)
    }

    fn predict_proba(&self, frame: &Frame) -> Result<Vec<f64>, ModelError> {
        let x = self.encode(frame).map_err(|e| match e {
            ModelError::InvalidData(msg) => ModelError::PredictionFailed(msg),
            other => other,
        })?;
        Ok(self.margins(&x).into_iter().map(sigmoid).collect())
    }

    fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }
}
