//! File-backed acquisition bridge: one JSON line per stream event.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use micue_core::MarkerEvent;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bridge::AcquisitionBridge;
use crate::error::BridgeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogEntry {
    Start { subject: String, stream: String },
    Marker { marker: MarkerEvent },
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Milliseconds since `start_streams` was called.
    pub t_ms: u64,
    #[serde(flatten)]
    pub entry: LogEntry,
}

/// `Markers_<subject>_Trial<NNNN>`, with the subject reduced to
/// filename-safe characters.
pub fn stream_name(subject_id: &str, trial: u32) -> String {
    let subject: String = subject_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("Markers_{subject}_Trial{trial:04}")
}

/// Highest `-N` suffix tried before giving up on a free file name.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Opens `<dir>/<stream>.jsonl`, or `<stream>-2.jsonl`, `-3`, ... when taken.
/// Existing files are never truncated.
fn create_unique(dir: &Path, stream: &str) -> Result<(PathBuf, File), BridgeError> {
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let name = if attempt == 1 {
            format!("{stream}.jsonl")
        } else {
            format!("{stream}-{attempt}.jsonl")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                if attempt > 1 {
                    warn!(stream, path = %path.display(), "earlier recording kept; writing to a new file");
                }
                return Ok((path, file));
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(BridgeError::NoFreeName(stream.to_string()))
}

pub struct JsonlRecorder {
    dir: PathBuf,
    trial: u32,
    origin: Option<Instant>,
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl JsonlRecorder {
    pub fn new(dir: impl Into<PathBuf>, trial: u32) -> Self {
        Self {
            dir: dir.into(),
            trial,
            origin: None,
            writer: None,
            path: None,
        }
    }

    /// File of the current stream, once started.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn write(&mut self, entry: LogEntry, at: Instant) -> Result<(), BridgeError> {
        let (Some(origin), Some(writer)) = (self.origin, self.writer.as_mut()) else {
            return Err(BridgeError::NotStarted);
        };
        let t_ms = at.saturating_duration_since(origin).as_millis() as u64;
        let line = serde_json::to_string(&LogRecord { t_ms, entry })
            .map_err(BridgeError::Encode)?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

impl AcquisitionBridge for JsonlRecorder {
    fn name(&self) -> &str {
        "jsonl-recorder"
    }

    fn start_streams(&mut self, subject_id: &str) -> Result<(), BridgeError> {
        self.start_streams_at(subject_id, Instant::now())
    }

    fn send_marker(&mut self, marker_json: &str) -> Result<(), BridgeError> {
        self.send_marker_at(marker_json, Instant::now())
    }

    fn stop_streams(&mut self) -> Result<(), BridgeError> {
        self.stop_streams_at(Instant::now())
    }

    fn start_streams_at(&mut self, subject_id: &str, at: Instant) -> Result<(), BridgeError> {
        fs::create_dir_all(&self.dir)?;
        let stream = stream_name(subject_id, self.trial);
        let (path, file) = create_unique(&self.dir, &stream)?;
        info!(path = %path.display(), "recording markers");
        self.origin = Some(at);
        self.writer = Some(BufWriter::new(file));
        self.path = Some(path);
        self.write(
            LogEntry::Start {
                subject: subject_id.to_string(),
                stream,
            },
            at,
        )
    }

    fn send_marker_at(&mut self, marker_json: &str, at: Instant) -> Result<(), BridgeError> {
        let marker = MarkerEvent::from_wire(marker_json)?;
        self.write(LogEntry::Marker { marker }, at)
    }

    fn stop_streams_at(&mut self, at: Instant) -> Result<(), BridgeError> {
        self.write(LogEntry::Stop, at)?;
        self.writer = None;
        Ok(())
    }
}

/// Reads a recorder file back. Blank lines are skipped.
pub fn read_marker_log(reader: impl BufRead) -> Result<Vec<LogRecord>, BridgeError> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|source| BridgeError::Record { line: i + 1, source })?;
        records.push(record);
    }
    Ok(records)
}
