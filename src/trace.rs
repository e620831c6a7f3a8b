//! JSONL output for attempt traces and evaluation reports.
//!
//! [`JsonlSink`] hands rows to a writer thread over a channel, so a forecast
//! loop never waits on disk. Any `Serialize` row works; the CLI uses the same
//! sink for attempt traces and for `eval` results.
//!
//! Attempt traces carry a `question_key` derived from the question bounds, so
//! traces from several questions can share one file and still be grouped.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::distribution::types::Violation;
use crate::domain::QuestionBounds;
use crate::pipeline::AttemptStatus;

/// One line per attempt in a forecast trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptTrace {
    /// Same for every attempt of one question; see [`question_key`].
    pub question_key: String,
    pub timestamp_ms: i64,
    pub attempt_index: usize,
    /// blake3 of the raw attempt text, so traces can be joined to transcripts.
    pub text_hash: String,
    pub status: AttemptStatus,
    pub anchor_count: Option<usize>,
    pub error_code: Option<String>,
    pub error: Option<String>,
    pub violations: Vec<Violation>,
}

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("failed to write jsonl output: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode jsonl row: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("jsonl writer has shut down")]
    Disconnected,
    #[error("jsonl writer thread panicked")]
    WorkerPanicked,
}

/// Receives one [`AttemptTrace`] per attempt. Failures are the caller's to log.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: AttemptTrace) -> Result<(), TraceError>;
}

/// Sender half of a JSONL file. Clone it freely; the file is closed once every
/// clone is dropped and the [`JsonlWorker`] is joined.
pub struct JsonlSink<T> {
    sender: mpsc::Sender<T>,
}

/// The sink used for forecast traces.
pub type JsonlTraceSink = JsonlSink<AttemptTrace>;

impl<T> Clone for JsonlSink<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T: Serialize + Send + 'static> JsonlSink<T> {
    /// Truncate `path` and start the writer thread.
    pub fn create(path: impl AsRef<Path>) -> Result<(Self, JsonlWorker), TraceError> {
        let file = File::create(path)?;
        let (sender, receiver) = mpsc::channel::<T>();
        let handle = std::thread::spawn(move || write_rows(BufWriter::new(file), receiver));
        Ok((Self { sender }, JsonlWorker { handle }))
    }

    pub fn send(&self, row: T) -> Result<(), TraceError> {
        self.sender.send(row).map_err(|_| TraceError::Disconnected)
    }
}

impl TraceSink for JsonlSink<AttemptTrace> {
    fn record(&self, event: AttemptTrace) -> Result<(), TraceError> {
        self.send(event)
    }
}

/// Writer thread of a [`JsonlSink`].
pub struct JsonlWorker {
    handle: JoinHandle<Result<u64, TraceError>>,
}

impl JsonlWorker {
    /// Wait for the writer to drain and return the number of lines written.
    /// Blocks until every sink clone has been dropped.
    pub fn join(self) -> Result<u64, TraceError> {
        self.handle.join().map_err(|_| TraceError::WorkerPanicked)?
    }
}

fn write_rows<T: Serialize>(
    mut writer: impl Write,
    receiver: mpsc::Receiver<T>,
) -> Result<u64, TraceError> {
    let mut written = 0;
    for row in receiver {
        serde_json::to_writer(&mut writer, &row)?;
        writer.write_all(b"\n")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Stable id for a question, from the bounds that shape its distribution.
/// Display-only nominal bounds are ignored.
pub fn question_key(bounds: &QuestionBounds) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&bounds.lower_bound.to_le_bytes());
    hasher.update(&bounds.upper_bound.to_le_bytes());
    hasher.update(&[
        u8::from(bounds.open_lower_bound),
        u8::from(bounds.open_upper_bound),
    ]);
    match bounds.zero_point {
        Some(z) => hasher.update(&[1]).update(&z.to_le_bytes()),
        None => hasher.update(&[0]),
    };
    hasher.update(&[match bounds.log_scale {
        None => 0,
        Some(false) => 1,
        Some(true) => 2,
    }]);
    hasher.finalize().to_hex()[..16].to_string()
}

pub fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_key_ignores_display_bounds() {
        let plain = QuestionBounds::closed(0.0, 100.0);
        let mut labelled = plain.clone();
        labelled.nominal_lower_bound = Some(0.0);
        assert_eq!(question_key(&plain), question_key(&labelled));
        assert_eq!(question_key(&plain).len(), 16);
    }

    #[test]
    fn question_key_tracks_shape_changes() {
        let base = QuestionBounds::closed(0.0, 100.0);
        let keys = [
            question_key(&base),
            question_key(&base.clone().open(true, false)),
            question_key(&base.clone().open(false, true)),
            question_key(&QuestionBounds::closed(1.0, 100.0).log_scaled(0.0)),
            question_key(&QuestionBounds::closed(0.0, 101.0)),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn worker_counts_rows_from_every_clone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.jsonl");
        let (sink, worker) = JsonlSink::<Vec<u32>>::create(&path).unwrap();
        let clone = sink.clone();
        sink.send(vec![1, 2]).unwrap();
        clone.send(vec![3]).unwrap();
        drop(sink);
        drop(clone);

        assert_eq!(worker.join().unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[1,2]\n[3]\n");
    }
}
