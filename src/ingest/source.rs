// Record sources - restartable, lazily read inputs for the two ingestion passes
// Each call to `open` starts an independent pass from the beginning of the input

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};
use crate::ingest::record::RawRecord;

/// A fault raised by the input itself rather than by one of its values.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceFault {
    /// One row could not be decoded; the pass continues with the next row
    RowSkipped { position: u64, reason: String },
    /// The reader cannot go on; the pass ends at this point
    StreamBroken { position: u64, reason: String },
}

impl SourceFault {
    pub fn position(&self) -> u64 {
        match self {
            SourceFault::RowSkipped { position, .. } | SourceFault::StreamBroken { position, .. } => *position,
        }
    }

    pub fn ends_pass(&self) -> bool {
        matches!(self, SourceFault::StreamBroken { .. })
    }
}

impl fmt::Display for SourceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFault::RowSkipped { position, reason } => {
                write!(f, "skipped malformed row near line {}: {}", position, reason)
            }
            SourceFault::StreamBroken { position, reason } => {
                write!(f, "input unreadable near line {}: {}", position, reason)
            }
        }
    }
}

pub type SourceItem = Result<RawRecord, SourceFault>;

/// Pull-based record stream; each `next().await` yields one record.
pub type RecordStream = BoxStream<'static, SourceItem>;

const CHANNEL_CAPACITY: usize = 1024;

/// An input that can be scanned more than once.
pub trait RecordSource: Send + Sync {
    /// Human-readable description for log lines
    fn describe(&self) -> String;

    /// Start a fresh pass over the input
    fn open(&self) -> AppResult<RecordStream>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Jsonl,
}

impl SourceFormat {
    /// `.jsonl` and `.ndjson` are line-delimited JSON; everything else is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("jsonl") | Some("ndjson") => SourceFormat::Jsonl,
            _ => SourceFormat::Csv,
        }
    }
}

/// Build the source for `path`, detecting the format when none is given.
pub fn open_source(path: impl Into<PathBuf>, format: Option<SourceFormat>) -> Box<dyn RecordSource> {
    let path = path.into();
    match format.unwrap_or_else(|| SourceFormat::from_path(&path)) {
        SourceFormat::Csv => Box::new(CsvSource::new(path)),
        SourceFormat::Jsonl => Box::new(JsonlSource::new(path)),
    }
}

/// CSV with a header row. Ragged rows are accepted and cells are trimmed.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for CsvSource {
    fn describe(&self) -> String {
        format!("CSV {}", self.path.display())
    }

    fn open(&self) -> AppResult<RecordStream> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| {
                AppError::SourceError(format!("Failed to open {}: {}", self.path.display(), e))
            })?;
        let headers = reader.headers()?.clone();
        let runtime = Handle::try_current()
            .map_err(|e| AppError::SourceError(format!("CSV reader needs a tokio runtime: {}", e)))?;

        // The csv reader is blocking; rows are decoded off the runtime threads
        let (tx, rx) = mpsc::channel::<SourceItem>(CHANNEL_CAPACITY);
        runtime.spawn_blocking(move || {
            let mut rows_read: u64 = 0;
            for result in reader.into_records() {
                rows_read += 1;
                let item = match result {
                    Ok(row) => Ok(headers.iter().zip(row.iter()).collect::<RawRecord>()),
                    Err(err) => Err(csv_fault(&err, rows_read + 1)),
                };
                let ends_pass = matches!(item, Err(ref fault) if fault.ends_pass());
                if tx.blocking_send(item).is_err() || ends_pass {
                    break;
                }
            }
        });

        Ok(receiver_stream(rx))
    }
}

fn csv_fault(err: &csv::Error, fallback_line: u64) -> SourceFault {
    let position = err.position().map(|pos| pos.line()).unwrap_or(fallback_line);
    match err.kind() {
        csv::ErrorKind::Utf8 { .. } | csv::ErrorKind::UnequalLengths { .. } => SourceFault::RowSkipped {
            position,
            reason: err.to_string(),
        },
        _ => SourceFault::StreamBroken {
            position,
            reason: err.to_string(),
        },
    }
}

fn receiver_stream(rx: mpsc::Receiver<SourceItem>) -> RecordStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}

/// One JSON object per line. Scalars become cell text; nulls and nested values are dropped.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Convert one JSONL line into a record.
pub fn parse_jsonl_line(line: &str) -> Result<RawRecord, String> {
    let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let Value::Object(object) = value else {
        return Err("line is not a JSON object".to_string());
    };

    let mut record = RawRecord::new();
    for (column, value) in object {
        let text = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };
        record.insert(column, text.trim());
    }
    Ok(record)
}

impl RecordSource for JsonlSource {
    fn describe(&self) -> String {
        format!("JSONL {}", self.path.display())
    }

    fn open(&self) -> AppResult<RecordStream> {
        let file = File::open(&self.path).map_err(|e| {
            AppError::SourceError(format!("Failed to open {}: {}", self.path.display(), e))
        })?;
        let lines = JsonlLines {
            reader: BufReader::new(tokio::fs::File::from_std(file)),
            position: 0,
            finished: false,
        };
        Ok(stream::unfold(lines, |mut lines| async move {
            let item = lines.next_item().await?;
            Some((item, lines))
        })
        .boxed())
    }
}

/// Line reader that works on raw bytes, so one undecodable line is skipped
/// instead of ending the pass.
struct JsonlLines {
    reader: BufReader<tokio::fs::File>,
    position: u64,
    finished: bool,
}

impl JsonlLines {
    async fn next_item(&mut self) -> Option<SourceItem> {
        let mut buf = Vec::new();
        while !self.finished {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf).await {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    self.position += 1;
                    let position = self.position;
                    let text = match std::str::from_utf8(&buf) {
                        Ok(text) => text.trim(),
                        Err(e) => {
                            return Some(Err(SourceFault::RowSkipped {
                                position,
                                reason: format!("line is not valid UTF-8: {}", e),
                            }))
                        }
                    };
                    if text.is_empty() {
                        continue;
                    }
                    return Some(
                        parse_jsonl_line(text)
                            .map_err(|reason| SourceFault::RowSkipped { position, reason }),
                    );
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(SourceFault::StreamBroken {
                        position: self.position + 1,
                        reason: err.to_string(),
                    }));
                }
            }
        }
        None
    }
}

/// In-memory source, replayed from the start on every pass.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    items: Vec<SourceItem>,
}

impl VecSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            items: records.into_iter().map(Ok).collect(),
        }
    }

    /// A source that also replays faults at fixed positions.
    pub fn with_items(items: Vec<SourceItem>) -> Self {
        Self { items }
    }
}

impl RecordSource for VecSource {
    fn describe(&self) -> String {
        format!("in-memory source ({} items)", self.items.len())
    }

    fn open(&self) -> AppResult<RecordStream> {
        Ok(stream::iter(self.items.clone()).boxed())
    }
}
