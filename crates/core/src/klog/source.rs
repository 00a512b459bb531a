//! Sources of kernel log lines.
//!
//! `open()` yields a lazy, forward-only, finite sequence. Rescanning requires
//! a fresh `open()`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing::{info, warn};

use crate::exec::capture_stdout;
use crate::klog::LogError;

pub type LogLines = Box<dyn Iterator<Item = String>>;

pub trait LogSource {
    fn open(&self) -> Result<LogLines, LogError>;

    fn describe(&self) -> String;
}

impl<T: LogSource + ?Sized> LogSource for Box<T> {
    fn open(&self) -> Result<LogLines, LogError> {
        (**self).open()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// A previously captured log file.
#[derive(Debug, Clone)]
pub struct CaptureFile {
    pub path: PathBuf,
}

impl CaptureFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LogSource for CaptureFile {
    fn open(&self) -> Result<LogLines, LogError> {
        let unavailable = |reason: String| LogError::Unavailable { source_desc: self.describe(), reason };
        let file = File::open(&self.path).map_err(|e| unavailable(e.to_string()))?;
        let metadata = file.metadata().map_err(|e| unavailable(e.to_string()))?;
        if !metadata.is_file() {
            return Err(unavailable("not a regular file".to_string()));
        }
        let mut reader = BufReader::new(file);
        // Failing on the very first read means nothing could be read at all.
        reader.fill_buf().map_err(|e| unavailable(e.to_string()))?;
        info!(path = %self.path.display(), "reading kernel log capture");

        let path = self.path.clone();
        let lines = reader.split(b'\n').map_while(move |chunk| match chunk {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                // A mid-stream read error ends the sequence; the scan itself never aborts.
                warn!(path = %path.display(), error = %e, "kernel log read stopped early");
                None
            }
        });
        Ok(Box::new(lines))
    }

    fn describe(&self) -> String {
        format!("capture file {}", self.path.display())
    }
}

/// Snapshot of the live kernel ring buffer taken by a helper such as `dmesg`.
#[derive(Debug, Clone)]
pub struct LiveLog {
    pub program: PathBuf,
}

impl LiveLog {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for LiveLog {
    fn default() -> Self {
        Self::new("dmesg")
    }
}

impl LogSource for LiveLog {
    fn open(&self) -> Result<LogLines, LogError> {
        let text = capture_stdout(&self.program, std::iter::empty::<&str>()).map_err(|e| {
            LogError::Unavailable { source_desc: self.describe(), reason: e.to_string() }
        })?;
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        info!(program = %self.program.display(), lines = lines.len(), "captured live kernel log");
        Ok(Box::new(lines.into_iter()))
    }

    fn describe(&self) -> String {
        format!("live log via {}", self.program.display())
    }
}

/// Lines held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    lines: Vec<String>,
}

impl MemoryLog {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { lines: lines.into_iter().map(Into::into).collect() }
    }
}

impl LogSource for MemoryLog {
    fn open(&self) -> Result<LogLines, LogError> {
        Ok(Box::new(self.lines.clone().into_iter()))
    }

    fn describe(&self) -> String {
        format!("{} in-memory lines", self.lines.len())
    }
}
