//! Prediction recording
//!
//! Every `ScoreResult` is handed to a `PredictionRecorder` right after it is
//! produced. Storage is pluggable; two implementations ship here:
//!
//! - `InMemoryRecorder`: bounded ring, used in tests and dry runs
//! - `JsonlRecorder`: buffered append-only JSONL log with a bounded in-memory
//!   history for `recent`
//!
//! `RecorderHandle` moves a recorder onto a background task so scoring never
//! waits on storage.

use crate::config::RecorderConfig;
use chrono::{DateTime, Utc};
use fraud_core::{Backend, FraudError, Result, RiskTier, ScoreResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Unwritten records kept across failed flushes, in multiples of `buffer_size`
const MAX_PENDING_BUFFERS: usize = 10;

/// One stored prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: u64,
    pub transaction_id: String,
    pub probability: f64,
    pub risk_tier: RiskTier,
    pub backend: Backend,
    pub recorded_at: DateTime<Utc>,
}

impl PredictionRecord {
    fn new(id: u64, transaction_id: &str, result: &ScoreResult) -> Self {
        Self {
            id,
            transaction_id: transaction_id.to_string(),
            probability: result.probability,
            risk_tier: result.risk_tier,
            backend: result.backend,
            recorded_at: Utc::now(),
        }
    }
}

pub trait PredictionRecorder: Send {
    /// Persist one result and return its id
    fn store(&mut self, transaction_id: &str, result: &ScoreResult) -> Result<u64>;

    /// Up to `n` most recent records, newest first
    fn recent(&self, n: usize) -> Vec<PredictionRecord>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct InMemoryRecorder {
    records: VecDeque<PredictionRecord>,
    capacity: usize,
    next_id: u64,
}

impl InMemoryRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryRecorder {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl PredictionRecorder for InMemoryRecorder {
    fn store(&mut self, transaction_id: &str, result: &ScoreResult) -> Result<u64> {
        let id = self.next_id;
        self.next_id += 1;
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records
            .push_back(PredictionRecord::new(id, transaction_id, result));
        Ok(id)
    }

    fn recent(&self, n: usize) -> Vec<PredictionRecord> {
        self.records.iter().rev().take(n).cloned().collect()
    }
}

pub struct JsonlRecorder {
    path: PathBuf,
    buffer: Vec<PredictionRecord>,
    buffer_size: usize,
    history: VecDeque<PredictionRecord>,
    history_size: usize,
    next_id: u64,
}

impl JsonlRecorder {
    /// Open (or create on first flush) the log. Existing records seed the
    /// history and the id sequence.
    pub fn open(config: &RecorderConfig) -> Result<Self> {
        let history_size = config.history_size.max(1);
        let mut history = VecDeque::with_capacity(history_size.min(1024));
        let mut last_id = 0;

        match File::open(&config.log_path) {
            Ok(file) => {
                for (line_no, line) in BufReader::new(file).lines().enumerate() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) if e.kind() == ErrorKind::InvalidData => {
                            warn!(
                                path = %config.log_path.display(),
                                line = line_no + 1,
                                error = %e,
                                "Skipping unreadable prediction record"
                            );
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<PredictionRecord>(&line) {
                        Ok(record) => {
                            last_id = last_id.max(record.id);
                            if history.len() == history_size {
                                history.pop_front();
                            }
                            history.push_back(record);
                        }
                        Err(e) => warn!(
                            path = %config.log_path.display(),
                            line = line_no + 1,
                            error = %e,
                            "Skipping unreadable prediction record"
                        ),
                    }
                }
                info!(
                    path = %config.log_path.display(),
                    last_id,
                    "📝 Resuming prediction log"
                );
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path: config.log_path.clone(),
            buffer: Vec::with_capacity(config.buffer_size.max(1)),
            buffer_size: config.buffer_size.max(1),
            history,
            history_size,
            next_id: last_id + 1,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Upper bound on `pending()` while the log cannot be written
    pub fn max_pending(&self) -> usize {
        self.buffer_size * MAX_PENDING_BUFFERS
    }

    /// Append buffered records. Each record leaves the buffer as soon as its
    /// line is written, so a failure part way through never duplicates lines
    /// on the next attempt.
    fn write_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut written = 0;
        let outcome = self.append_lines(&mut written);
        self.buffer.drain(..written);

        if let Err(e) = outcome {
            let overflow = self.buffer.len().saturating_sub(self.max_pending());
            if overflow > 0 {
                self.buffer.drain(..overflow);
                warn!(
                    path = %self.path.display(),
                    dropped = overflow,
                    pending = self.buffer.len(),
                    "Prediction log unwritable, dropping oldest unwritten records"
                );
            }
            return Err(e);
        }

        debug!(path = %self.path.display(), records = written, "Flushed predictions");
        Ok(())
    }

    fn append_lines(&self, written: &mut usize) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                FraudError::RecorderError(format!("failed to create log dir: {}", e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| FraudError::RecorderError(format!("failed to open log file: {}", e)))?;
        for record in &self.buffer {
            let mut line = serde_json::to_vec(record)?;
            line.push(b'\n');
            file.write_all(&line)?;
            *written += 1;
        }
        file.flush()?;
        Ok(())
    }
}

impl PredictionRecorder for JsonlRecorder {
    fn store(&mut self, transaction_id: &str, result: &ScoreResult) -> Result<u64> {
        let id = self.next_id;
        self.next_id += 1;

        let record = PredictionRecord::new(id, transaction_id, result);
        if self.history.len() == self.history_size {
            self.history.pop_front();
        }
        self.history.push_back(record.clone());
        self.buffer.push(record);

        if self.buffer.len() >= self.buffer_size {
            self.write_buffer()?;
        }
        Ok(id)
    }

    fn recent(&self, n: usize) -> Vec<PredictionRecord> {
        self.history.iter().rev().take(n).cloned().collect()
    }

    fn flush(&mut self) -> Result<()> {
        self.write_buffer()
    }
}

impl Drop for JsonlRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.write_buffer() {
            warn!(path = %self.path.display(), error = %e, "Failed to flush predictions on drop");
        }
    }
}

enum Command {
    Store {
        transaction_id: String,
        result: ScoreResult,
    },
    Flush(oneshot::Sender<Result<()>>),
}

/// Background owner of a recorder
pub struct RecorderHandle {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<Box<dyn PredictionRecorder>>,
}

impl RecorderHandle {
    /// Spawn the recording task. Must be called inside a tokio runtime.
    pub fn spawn(mut recorder: Box<dyn PredictionRecorder>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Store {
                        transaction_id,
                        result,
                    } => {
                        if let Err(e) = recorder.store(&transaction_id, &result) {
                            warn!(transaction_id = %transaction_id, error = %e, "Failed to record prediction");
                        }
                    }
                    Command::Flush(reply) => {
                        let _ = reply.send(recorder.flush());
                    }
                }
            }

            if let Err(e) = recorder.flush() {
                warn!(error = %e, "Final prediction flush failed");
            }
            recorder
        });

        Self { tx, task }
    }

    /// Queue a result for storage without waiting
    pub fn submit(&self, transaction_id: impl Into<String>, result: ScoreResult) -> Result<()> {
        self.tx
            .send(Command::Store {
                transaction_id: transaction_id.into(),
                result,
            })
            .map_err(|_| FraudError::RecorderError("recorder task has stopped".to_string()))
    }

    /// Wait until everything submitted so far has been written
    pub async fn flush(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply_tx))
            .map_err(|_| FraudError::RecorderError("recorder task has stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| FraudError::RecorderError("recorder task dropped flush".to_string()))?
    }

    /// Drain the queue, flush, and hand the recorder back
    pub async fn shutdown(self) -> Result<Box<dyn PredictionRecorder>> {
        let Self { tx, task } = self;
        drop(tx);
        task.await
            .map_err(|e| FraudError::RecorderError(format!("recorder task failed: {}", e)))
    }
}
