//! Experiment configuration
//!
//! The configuration is built once (defaults or a TOML file), validated, and
//! then only borrowed by the pipeline stages.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::models::{GbmParams, PredictionKind};

/// Experiment configuration shared read-only by every stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Experiment name, used for the output directory
    pub name: String,
    /// Identifier column carried through to prediction exports
    pub id_col: String,
    /// Columns cast to categorical
    pub categorical_features: Vec<String>,
    /// Columns cast to f64
    pub numerical_features: Vec<String>,
    /// Binary target column (training data only)
    pub target_col: String,
    /// Number of folds K
    pub n_splits: usize,
    /// Seed for the fold shuffle
    pub seed: u64,
    /// What each model contributes to the OOF table and to the ensemble mean
    pub prediction: PredictionKind,
    /// Train folds on a thread pool instead of one after another
    pub parallel_folds: bool,
    /// Classifier hyperparameters
    pub params: GbmParams,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: "example_xgb".to_string(),
            id_col: "PassengerId".to_string(),
            categorical_features: ["HomePlanet", "Cabin", "Destination"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            numerical_features: [
                "CryoSleep",
                "Age",
                "VIP",
                "RoomService",
                "FoodCourt",
                "ShoppingMall",
                "Spa",
                "VRDeck",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            target_col: "Transported".to_string(),
            n_splits: 5,
            seed: 42,
            prediction: PredictionKind::Probability,
            parallel_folds: false,
            params: GbmParams::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ExperimentConfig = toml::from_str(&content)
            .map_err(|e| PipelineError::Configuration(format!("{:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        std::fs::write(path, content).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Categorical features followed by numerical features
    pub fn feature_cols(&self) -> Vec<String> {
        self.categorical_features
            .iter()
            .chain(self.numerical_features.iter())
            .cloned()
            .collect()
    }

    /// Reject configurations the pipeline cannot run
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(PipelineError::Configuration(msg));

        if self.name.trim().is_empty() {
            return fail("experiment name is empty".to_string());
        }
        if self.n_splits < 2 {
            return fail(format!("n_splits must be >= 2, got {}", self.n_splits));
        }
        if self.target_col.is_empty() {
            return fail("target_col is empty".to_string());
        }

        let features = self.feature_cols();
        if features.is_empty() {
            return fail("no categorical or numerical features configured".to_string());
        }

        let mut seen = HashSet::new();
        for feature in &features {
            if !seen.insert(feature.as_str()) {
                return fail(format!("feature {} is listed more than once", feature));
            }
            if feature == &self.target_col {
                return fail(format!("target column {} is listed as a feature", feature));
            }
            if feature == &self.id_col {
                return fail(format!("id column {} is listed as a feature", feature));
            }
        }

        self.params
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))
    }
}
