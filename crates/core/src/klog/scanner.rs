//! Duplicate-collapsing kernel log scanner.
//!
//! State is a two-slot buffer: the pending distinct line (still accumulating
//! repeats) and the prior distinct line already classified. A pending line is
//! classified exactly once, with its final repeat count, when a different
//! line arrives or input ends.

use serde::Serialize;
use tracing::debug;

use crate::findings::FindingSink;
use crate::klog::classify::Classifier;
use crate::klog::source::LogSource;
use crate::klog::{LogError, LogLine};

/// Totals for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Physical lines read.
    pub lines: usize,
    /// Distinct lines handed to the classifier.
    pub distinct: usize,
    /// Distinct lines the classifier matched.
    pub matched: usize,
}

#[derive(Debug, Default)]
pub struct LogScanner {
    pending: Option<LogLine>,
    prior: Option<LogLine>,
    summary: ScanSummary,
}

impl LogScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next physical line.
    pub fn push(&mut self, raw: &str, classifier: &mut dyn Classifier, sink: &mut dyn FindingSink) {
        self.summary.lines += 1;
        let line = LogLine::new(self.summary.lines, raw);

        if let Some(pending) = self.pending.as_mut() {
            if pending.text == line.text {
                pending.repeat += 1;
                return;
            }
        }
        self.flush(classifier, sink);
        self.pending = Some(line);
    }

    /// Flush the final pending line and return the scan totals.
    pub fn finish(mut self, classifier: &mut dyn Classifier, sink: &mut dyn FindingSink) -> ScanSummary {
        self.flush(classifier, sink);
        classifier.finish(sink);
        self.summary
    }

    fn flush(&mut self, classifier: &mut dyn Classifier, sink: &mut dyn FindingSink) {
        let Some(line) = self.pending.take() else {
            return;
        };
        self.summary.distinct += 1;
        if classifier.classify(&line, self.prior.as_ref(), sink) {
            self.summary.matched += 1;
        }
        self.prior = Some(line);
    }
}

/// Open `source` and classify every distinct line in original order.
///
/// The only failure is the source being unavailable, reported before any line
/// is processed.
pub fn scan(
    source: &dyn LogSource,
    classifier: &mut dyn Classifier,
    sink: &mut dyn FindingSink,
) -> Result<ScanSummary, LogError> {
    let lines = source.open()?;
    let mut scanner = LogScanner::new();
    for raw in lines {
        scanner.push(&raw, classifier, sink);
    }
    let summary = scanner.finish(classifier, sink);
    debug!(
        source = %source.describe(),
        lines = summary.lines,
        distinct = summary.distinct,
        matched = summary.matched,
        "kernel log scan complete"
    );
    Ok(summary)
}
