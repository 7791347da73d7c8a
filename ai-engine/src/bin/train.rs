//! Offline training: fit statistics, train the network, evaluate on a held-out split.
//!
//! Usage:
//!   fraud-train --input creditcard.csv [--config config/fraud.toml] [--epochs 50]
//!               [--balance undersample|oversample|none]

use anyhow::{Context, Result};
use clap::Parser;
use fraud_engine::config::DEFAULT_CONFIG_PATH;
use fraud_engine::telemetry::init_tracing;
use fraud_engine::{
    evaluate, AppConfig, BalanceMethod, LabeledDataset, NeuralPredictor, Preprocessor,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "fraud-train", about = "Fit feature statistics and train the fraud network")]
struct Args {
    /// Labelled CSV with Time, V1..V28, Amount, Class columns
    #[arg(long, short)]
    input: PathBuf,

    /// TOML configuration file (optional; defaults apply when absent)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured epoch ceiling
    #[arg(long)]
    epochs: Option<usize>,

    /// Class rebalancing applied before the train/test split
    #[arg(long, default_value_t = BalanceMethod::Undersample)]
    balance: BalanceMethod,

    /// Decision threshold for the evaluation report
    #[arg(long, default_value_t = 0.5)]
    threshold: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load_from_path(&args.config)?;
    if let Some(epochs) = args.epochs {
        config.training.max_epochs = epochs;
    }
    init_tracing(&config.logging)?;

    let dataset = LabeledDataset::from_csv_path(&args.input)
        .with_context(|| format!("Failed to load dataset {}", args.input.display()))?;
    let dataset = dataset.balance(args.balance, config.training.seed)?;
    let (train, test) =
        dataset.stratified_split(config.training.test_split, config.training.seed)?;
    info!(
        train_rows = train.len(),
        test_rows = test.len(),
        train_positive_rate = train.positive_rate(),
        "Split dataset"
    );

    // Statistics come from the training split only
    let stats = Preprocessor::fit(train.rows())?;
    stats.save(&config.artifacts.statistics_path)?;

    let train_rows = Preprocessor::transform_batch(train.rows(), &stats)?;
    let (predictor, report) = NeuralPredictor::train(&train_rows, train.labels(), &config.training)?;
    predictor.save(&config.artifacts.network_path)?;

    info!(
        epochs = report.epochs_run,
        best_epoch = report.best_epoch,
        best_val_loss = report.best_val_loss,
        stop_reason = ?report.stop_reason,
        "✅ Training complete"
    );

    let test_rows = Preprocessor::transform_batch(test.rows(), &stats)?;
    let probabilities = predictor.score_batch(&test_rows);
    let evaluation = evaluate(&probabilities, test.labels(), args.threshold)?;

    println!("{}", "=".repeat(60));
    println!("EVALUATION ({} held-out rows)", test.len());
    println!("{}", "=".repeat(60));
    println!("{}", evaluation);
    println!();
    println!("Statistics: {}", config.artifacts.statistics_path.display());
    println!("Network:    {}", config.artifacts.network_path.display());

    Ok(())
}
