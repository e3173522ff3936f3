// src/streaming/file.rs
//! CSV file sink

use crate::error::{BoardError, BoardResult, IoResultExt};
use crate::streaming::StreamSink;
use csv::{Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How an existing file is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Truncate,
    Append,
}

impl FileMode {
    /// `w` truncates, `a` appends
    pub fn from_modifier(modifier: &str) -> BoardResult<Self> {
        match modifier {
            "w" => Ok(FileMode::Truncate),
            "a" => Ok(FileMode::Append),
            other => Err(BoardError::invalid(format!(
                "file sink mode must be \"w\" or \"a\", got {:?}",
                other
            ))),
        }
    }
}

/// Writes one headerless CSV record per sample: channel values, then the
/// timestamp
pub struct FileSink {
    path: PathBuf,
    writer: Writer<File>,
    record: Vec<String>,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>, mode: FileMode) -> BoardResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        match mode {
            FileMode::Truncate => options.write(true).create(true).truncate(true),
            FileMode::Append => options.append(true).create(true),
        };
        let file = options.open(&path).map_err(|e| {
            BoardError::invalid(format!("cannot open sink file {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), ?mode, "file sink opened");
        Ok(Self {
            path,
            writer: WriterBuilder::new().has_headers(false).from_writer(file),
            record: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered rows to disk
    pub fn flush(&mut self) -> BoardResult<()> {
        self.writer.flush().transport_err("file sink flush")
    }
}

impl StreamSink for FileSink {
    fn push(&mut self, channels: &[f64], timestamp: f64) -> io::Result<()> {
        self.record.clear();
        self.record
            .extend(channels.iter().chain(std::iter::once(&timestamp)).map(|v| format!("{:.6}", v)));
        self.writer.write_record(&self.record).map_err(io::Error::from)
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(err) = self.writer.flush() {
            warn!(path = %self.path.display(), error = %err, "failed to flush file sink");
        }
    }
}
