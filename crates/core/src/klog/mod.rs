//! Kernel log acquisition and classification.
//!
//! - [`source`]: the log as a forward-only sequence of raw lines.
//! - [`scanner`]: duplicate-collapsing scan with previous-line context.
//! - [`classify`]: classifiers and their category counters.

pub mod classify;
pub mod scanner;
pub mod source;

use serde::Serialize;
use thiserror::Error;

pub use classify::{Classifier, LogCategoryCounters, OopsClassifier, PatternClassifier, PatternRule};
pub use scanner::{scan, LogScanner, ScanSummary};
pub use source::{CaptureFile, LiveLog, LogSource, MemoryLog};

#[derive(Debug, Error)]
pub enum LogError {
    /// The log could not be opened at all. Fatal to every log-dependent check.
    #[error("Kernel log unavailable from {source_desc}: {reason}")]
    Unavailable { source_desc: String, reason: String },
}

/// One distinct log line after duplicate collapsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    /// 1-based line number of the first physical occurrence.
    pub line: usize,
    /// Text with any syslog level and timestamp prefix removed.
    pub text: String,
    /// The first physical line as read.
    pub raw: String,
    /// Number of consecutive identical lines collapsed into this one (at least 1).
    pub repeat: usize,
}

impl LogLine {
    pub fn new(line: usize, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let text = normalize(&raw).to_string();
        Self { line, text, raw, repeat: 1 }
    }
}

/// Strip a leading `<N>` syslog level and a `[ seconds.micros]` timestamp.
///
/// Two lines that differ only in these prefixes are the same message.
pub fn normalize(raw: &str) -> &str {
    let mut rest = raw.trim_end_matches(['\r', '\n']);
    if let Some(after) = rest.strip_prefix('<') {
        if let Some((level, tail)) = after.split_once('>') {
            if !level.is_empty() && level.chars().all(|c| c.is_ascii_digit()) {
                rest = tail;
            }
        }
    }
    let trimmed = rest.trim_start();
    if let Some(after) = trimmed.strip_prefix('[') {
        if let Some((stamp, tail)) = after.split_once(']') {
            let stamp = stamp.trim();
            if !stamp.is_empty() && stamp.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return tail.strip_prefix(' ').unwrap_or(tail);
            }
        }
    }
    rest
}
