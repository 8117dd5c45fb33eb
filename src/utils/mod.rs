//! Utility module
//!
//! This module provides:
//! - Experiment configuration
//! - Run environment and directory layout
//! - Logging setup

pub mod config;
pub mod logging;
pub mod settings;

pub use config::ExperimentConfig;
pub use logging::setup_logging;
pub use settings::{DirectorySettings, EnvVars, PathProvider, RunEnv, StaticPaths};
