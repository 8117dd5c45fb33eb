//! Run environment and directory layout
//!
//! The pipeline reads its inputs and writes its outputs through a
//! [`PathProvider`]; [`DirectorySettings`] resolves those paths for a local
//! checkout, a Kaggle notebook or a Vertex AI job with a mounted bucket.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PipelineError, Result};

/// Where the pipeline is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunEnv {
    Local,
    Kaggle,
    Vertex,
}

impl RunEnv {
    /// Detect the environment from its variables
    pub fn detect(vars: &EnvVars) -> Self {
        if vars.kaggle_data_proxy_token.is_some() {
            return RunEnv::Kaggle;
        }
        if let Some(bucket) = &vars.bucket_name {
            if Path::new("/gcs").join(bucket).exists() {
                return RunEnv::Vertex;
            }
        }
        RunEnv::Local
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunEnv::Local => "local",
            RunEnv::Kaggle => "kaggle",
            RunEnv::Vertex => "vertex",
        }
    }
}

impl fmt::Display for RunEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunEnv {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(RunEnv::Local),
            "kaggle" => Ok(RunEnv::Kaggle),
            "vertex" => Ok(RunEnv::Vertex),
            other => Err(PipelineError::Configuration(format!(
                "Invalid environment type. Must be 'local', 'kaggle', or 'vertex'. Got: {}",
                other
            ))),
        }
    }
}

/// Environment variables the directory layout depends on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    pub kaggle_data_proxy_token: Option<String>,
    pub bucket_name: Option<String>,
    pub competition_name: String,
}

impl EnvVars {
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            kaggle_data_proxy_token: var("KAGGLE_DATA_PROXY_TOKEN"),
            bucket_name: var("BUCKET_NAME"),
            competition_name: var("KAGGLE_COMPETITION_NAME").unwrap_or_default(),
        }
    }
}

/// Source of the three directories the pipeline touches
pub trait PathProvider {
    /// Directory holding `train.csv`, `test.csv` and `sample_submission.csv`
    fn comp_dataset_dir(&self) -> &Path;
    /// Directory for models, predictions and reports of this run
    fn output_dir(&self) -> &Path;
    /// Directory the artifacts of this experiment are read from for submission
    fn artifact_exp_dir(&self) -> &Path;
}

/// Resolved directory layout for one experiment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySettings {
    pub exp_name: String,
    pub run_env: RunEnv,
    pub root_dir: PathBuf,
    pub input_dir: PathBuf,
    pub comp_dataset_dir: PathBuf,
    pub output_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub artifact_exp_dir: PathBuf,
}

impl DirectorySettings {
    /// Resolve from the process environment, detecting the run environment if not given
    pub fn resolve(exp_name: &str, run_env: Option<RunEnv>) -> Result<Self> {
        let vars = EnvVars::from_env();
        let run_env = run_env.unwrap_or_else(|| RunEnv::detect(&vars));
        Self::resolve_with(exp_name, run_env, &vars)
    }

    /// Resolve for an explicit environment and variable set
    pub fn resolve_with(exp_name: &str, run_env: RunEnv, vars: &EnvVars) -> Result<Self> {
        let competition = vars.competition_name.as_str();

        let settings = match run_env {
            RunEnv::Local => {
                let input_dir = PathBuf::from("./data/input");
                let artifact_dir = PathBuf::from("./data/output");
                Self {
                    exp_name: exp_name.to_string(),
                    run_env,
                    root_dir: PathBuf::from("."),
                    comp_dataset_dir: input_dir.join(competition),
                    output_dir: artifact_dir.join(exp_name).join("1"),
                    artifact_exp_dir: artifact_dir.join(exp_name).join("1"),
                    input_dir,
                    artifact_dir,
                }
            }
            RunEnv::Kaggle => {
                let input_dir = PathBuf::from("/kaggle/input");
                let artifact_dir = input_dir
                    .join(format!("{}-artifacts", competition).to_lowercase())
                    .join("other");
                Self {
                    exp_name: exp_name.to_string(),
                    run_env,
                    root_dir: PathBuf::from("/kaggle/working"),
                    comp_dataset_dir: input_dir.join(competition),
                    output_dir: PathBuf::from("/kaggle/working"),
                    artifact_exp_dir: artifact_dir.join(exp_name).join("1"),
                    input_dir,
                    artifact_dir,
                }
            }
            RunEnv::Vertex => {
                let bucket = vars.bucket_name.as_deref().ok_or_else(|| {
                    PipelineError::Configuration(
                        "BUCKET_NAME must be set for the vertex environment".to_string(),
                    )
                })?;
                let bucket_root = PathBuf::from("/gcs").join(bucket);
                let input_dir = bucket_root.join("input");
                let artifact_dir = bucket_root.join("output");
                Self {
                    exp_name: exp_name.to_string(),
                    run_env,
                    root_dir: bucket_root.join("working"),
                    comp_dataset_dir: input_dir.join(competition),
                    output_dir: artifact_dir.join(exp_name).join("1"),
                    artifact_exp_dir: artifact_dir.join(exp_name).join("1"),
                    input_dir,
                    artifact_dir,
                }
            }
        };

        tracing::info!("OUTPUT_DIR: {:?}", settings.output_dir);
        tracing::info!("ARTIFACT_EXP_DIR: {:?}", settings.artifact_exp_dir);
        tracing::info!("COMP_DATASET_DIR: {:?}", settings.comp_dataset_dir);

        Ok(settings)
    }
}

impl PathProvider for DirectorySettings {
    fn comp_dataset_dir(&self) -> &Path {
        &self.comp_dataset_dir
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn artifact_exp_dir(&self) -> &Path {
        &self.artifact_exp_dir
    }
}

/// Fixed directories, for tests and embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPaths {
    pub comp_dataset_dir: PathBuf,
    pub output_dir: PathBuf,
    pub artifact_exp_dir: PathBuf,
}

impl StaticPaths {
    /// Read inputs from `input`, write outputs and read artifacts in `output`
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        Self {
            comp_dataset_dir: input.into(),
            artifact_exp_dir: output.clone(),
            output_dir: output,
        }
    }
}

impl PathProvider for StaticPaths {
    fn comp_dataset_dir(&self) -> &Path {
        &self.comp_dataset_dir
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn artifact_exp_dir(&self) -> &Path {
        &self.artifact_exp_dir
    }
}
