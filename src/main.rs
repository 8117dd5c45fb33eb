//! kfold_gbm - K-fold gradient boosting ensembles
//!
//! ```bash
//! kfold_gbm init-config experiment.toml
//! kfold_gbm --config experiment.toml train
//! kfold_gbm --config experiment.toml --run-env kaggle submit --threshold 0.5
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use kfold_gbm::pipeline::{run_infer, run_submit, run_train};
use kfold_gbm::utils::{setup_logging, DirectorySettings, ExperimentConfig, RunEnv};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "kfold_gbm")]
#[command(about = "Stratified K-fold gradient boosting ensembles for binary tabular prediction")]
struct Cli {
    /// Experiment configuration (TOML); defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the experiment name from the configuration
    #[arg(short, long, global = true)]
    exp_name: Option<String>,

    /// Run environment; detected from the environment when omitted
    #[arg(long, value_enum, global = true)]
    run_env: Option<RunEnv>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train K fold models, write OOF predictions and scores
    Train,

    /// Predict test.csv with the models in the output directory
    Infer,

    /// Predict test.csv with the experiment artifacts and write submission.csv
    Submit {
        /// Write True/False at this probability threshold instead of the averaged value
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Write the default configuration
    InitConfig {
        /// Output file path
        path: PathBuf,
    },
}

/// Configuration and directories for one experiment run
fn experiment(
    config_path: Option<&PathBuf>,
    exp_name: Option<String>,
    run_env: Option<RunEnv>,
) -> anyhow::Result<(ExperimentConfig, DirectorySettings)> {
    let mut config = match config_path {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("Failed to load configuration {:?}", path))?,
        None => ExperimentConfig::default(),
    };
    if let Some(name) = exp_name {
        config.name = name;
    }
    config.validate()?;

    let settings = DirectorySettings::resolve(&config.name, run_env)?;
    info!(
        "Experiment {} ({} environment, {} folds)",
        config.name, settings.run_env, config.n_splits
    );
    Ok((config, settings))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Train => {
            let (config, settings) = experiment(config_path, cli.exp_name, cli.run_env)?;
            let outcome = run_train(&config, &settings, settings.run_env.as_str())?;

            println!("\nCross-Validation Results");
            println!("========================");
            for (fold, score) in &outcome.scores.folds {
                match score.roc_auc {
                    Some(auc) => println!("After fold {:>2}: roc_auc {:.5}", fold, auc),
                    None => println!("After fold {:>2}: roc_auc undefined", fold),
                }
            }
            println!("Overall:        roc_auc {:.5}", outcome.scores.overall.roc_auc);
        }

        Commands::Infer => {
            let (config, settings) = experiment(config_path, cli.exp_name, cli.run_env)?;
            let path = run_infer(&config, &settings)?;
            println!("Test predictions saved to: {}", path.display());
        }

        Commands::Submit { threshold } => {
            let (config, settings) = experiment(config_path, cli.exp_name, cli.run_env)?;
            let path = run_submit(&config, &settings, threshold)?;
            println!("Submission saved to: {}", path.display());
        }

        Commands::InitConfig { path } => {
            ExperimentConfig::default().save(&path)?;
            info!("Default configuration written to {:?}", path);
        }
    }

    Ok(())
}
