// Experiment progress tracing
// Append-only JSONL trace of stage starts and completions

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A single entry in the experiment trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// ISO 8601 timestamp of when this entry was created
    pub timestamp: String,

    /// Experiment run this entry belongs to
    pub run_id: Uuid,

    /// Stage name (e.g., "cleaning", "feature generation", "validation")
    pub stage: String,

    /// Data split the stage worked on ("devel" or "eval")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<String>,

    /// Progress [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    /// Wall-clock seconds spent in the stage, set on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,

    /// Optional structured data (e.g., example counts)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn new(run_id: Uuid, stage: String, progress: f32, message: String) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id,
            stage,
            split: None,
            progress: progress.clamp(0.0, 1.0),
            message,
            elapsed_secs: None,
            data: None,
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Trace writer over an append-only JSONL file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append a trace entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.write_all(entry.to_json_line()?.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Builder for trace entries of one stage
pub struct TraceBuilder {
    run_id: Uuid,
    stage: String,
    split: Option<String>,
}

impl TraceBuilder {
    pub fn stage(run_id: Uuid, stage: impl Into<String>) -> Self {
        TraceBuilder {
            run_id,
            stage: stage.into(),
            split: None,
        }
    }

    pub fn split(mut self, split: impl Into<String>) -> Self {
        self.split = Some(split.into());
        self
    }

    fn entry(self, progress: f32, message: String) -> TraceEntry {
        let mut entry = TraceEntry::new(self.run_id, self.stage, progress, message);
        entry.split = self.split;
        entry
    }

    /// Start entry (progress = 0.0)
    pub fn start(self, message: impl Into<String>) -> TraceEntry {
        self.entry(0.0, message.into())
    }

    /// Completion entry (progress = 1.0) with elapsed time and optional data
    pub fn complete(
        self,
        message: impl Into<String>,
        elapsed_secs: f64,
        data: Option<serde_json::Value>,
    ) -> TraceEntry {
        let mut entry = self.entry(1.0, message.into());
        entry.elapsed_secs = Some(elapsed_secs);
        entry.data = data;
        entry
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(line)?);
    }

    Ok(entries)
}
