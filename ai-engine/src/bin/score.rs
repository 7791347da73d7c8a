//! Score JSONL transactions and record every result.
//!
//! Each input line is an object with the 30 named features and an optional
//! `transaction_id`:
//!
//!   {"transaction_id": "tx-1", "Time": 0, "V1": -1.35, ..., "Amount": 149.62}
//!
//! Usage:
//!   fraud-score [--input transactions.jsonl] [--config config/fraud.toml]

use anyhow::{Context, Result};
use clap::Parser;
use fraud_engine::config::DEFAULT_CONFIG_PATH;
use fraud_engine::telemetry::init_tracing;
use fraud_engine::{AppConfig, FeatureVector, JsonlRecorder, RecorderHandle, ScoringEngine};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fraud-score", about = "Score transactions from JSONL input")]
struct Args {
    /// JSONL input; stdin when omitted
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// TOML configuration file (optional; defaults apply when absent)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print the engine status as JSON and exit
    #[arg(long)]
    status: bool,

    /// Dump Prometheus metrics to stderr when done
    #[arg(long)]
    metrics: bool,
}

#[derive(Deserialize)]
struct TransactionInput {
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(flatten)]
    features: HashMap<String, f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load_from_path(&args.config)?;
    init_tracing(&config.logging)?;

    let engine = ScoringEngine::new(config.artifacts.clone())?;
    if args.status {
        println!("{}", serde_json::to_string_pretty(&engine.status())?);
        return Ok(());
    }
    info!(backend = %engine.active_backend(), "Scoring engine ready");

    let recorder = RecorderHandle::spawn(Box::new(JsonlRecorder::open(&config.recorder)?));

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut scored = 0usize;
    let mut rejected = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let outcome = serde_json::from_str::<TransactionInput>(&line)
            .map_err(|e| e.to_string())
            .and_then(|input| {
                let transaction_id = input
                    .transaction_id
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                FeatureVector::from_named(&input.features)
                    .and_then(|raw| engine.score_and_record(transaction_id.clone(), &raw, &recorder))
                    .map(|result| (transaction_id, result))
                    .map_err(|e| e.to_string())
            });

        match outcome {
            Ok((transaction_id, result)) => {
                scored += 1;
                writeln!(
                    out,
                    "{}",
                    json!({
                        "transaction_id": transaction_id,
                        "probability": result.probability,
                        "risk_tier": result.risk_tier,
                        "backend": result.backend,
                    })
                )?;
            }
            Err(error) => {
                rejected += 1;
                warn!(line = line_no + 1, error = %error, "Rejected input line");
                writeln!(out, "{}", json!({ "line": line_no + 1, "error": error }))?;
            }
        }
    }
    out.flush()?;

    let recorder = recorder.shutdown().await?;
    let last = recorder.recent(1).first().map(|r| r.id);
    info!(scored, rejected, last_record_id = ?last, "Scoring run finished");

    if args.metrics {
        eprintln!("{}", engine.metrics().encode_text()?);
    }
    Ok(())
}
