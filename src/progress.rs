//! Ingestion progress reporting.
//!
//! Reports the stages of a knowledge-base import so users see what is being
//! read. Progress is emitted on **stderr** so stdout remains parseable for
//! scripts.

use std::io::Write;

/// A single progress event for an ingestion batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// Files were selected; admission filtering has not run yet.
    Reading { selected: u64 },
    /// Admitted files are being read and encoded.
    Processing { admitted: u64 },
    /// The entry was built.
    Done { entry: String, files: u64 },
}

/// Receives progress events. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  processing 1,234 files...".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Reading { selected } => {
                format!(
                    "ingest  reading {} selected files...\n",
                    format_number(*selected)
                )
            }
            IngestProgressEvent::Processing { admitted } => {
                format!("ingest  processing {} files...\n", format_number(*admitted))
            }
            IngestProgressEvent::Done { entry, files } => {
                format!(
                    "ingest  {}  {} files indexed\n",
                    entry,
                    format_number(*files)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Reading { selected } => serde_json::json!({
                "event": "progress",
                "phase": "reading",
                "selected": selected
            }),
            IngestProgressEvent::Processing { admitted } => serde_json::json!({
                "event": "progress",
                "phase": "processing",
                "admitted": admitted
            }),
            IngestProgressEvent::Done { entry, files } => serde_json::json!({
                "event": "progress",
                "phase": "done",
                "entry": entry,
                "files": files
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter, used by the HTTP server.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

/// Format a count with thousands separators: `1234567` → `"1,234,567"`.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
