//! Result and severity reporting shared by the table and kernel log engines.
//!
//! Checks never format output. They populate [`Finding`] records and hand
//! them to a [`FindingSink`]; frontends decide how to render them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tables::Signature;

/// Five-level severity attached to every finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Informational,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Informational => "informational",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a finding records a compliance failure or only advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Failure,
    Advice,
}

/// Where a finding was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Location {
    /// A table instance, optionally narrowed to one element of an entry array.
    Table {
        signature: Signature,
        instance: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entry: Option<usize>,
    },
    /// A 1-based line in the kernel log (the first line of a collapsed run).
    LogLine { line: usize },
    /// Not tied to a specific table instance or log line.
    Check,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Table { signature, instance, entry: Some(entry) } => {
                write!(f, "{signature}[{instance}] entry {entry}")
            }
            Location::Table { signature, instance, entry: None } => {
                write!(f, "{signature}[{instance}]")
            }
            Location::LogLine { line } => write!(f, "klog line {line}"),
            Location::Check => f.write_str("-"),
        }
    }
}

/// A single reported compliance result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub location: Location,
    pub kind: FindingKind,
    pub severity: Severity,
    /// Short machine-stable identifier, e.g. `RSDTEntryNull`.
    pub id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

impl Finding {
    pub fn failure(
        location: Location,
        severity: Severity,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            location,
            kind: FindingKind::Failure,
            severity,
            id: id.into(),
            message: message.into(),
            advice: None,
        }
    }

    pub fn advice(location: Location, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location,
            kind: FindingKind::Advice,
            severity: Severity::Informational,
            id: id.into(),
            message: message.into(),
            advice: None,
        }
    }

    pub fn with_advice(mut self, advice: impl Into<String>) -> Self {
        self.advice = Some(advice.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.kind == FindingKind::Failure
    }
}

/// Receiver for findings and passes emitted by checks.
pub trait FindingSink {
    fn record(&mut self, finding: Finding);

    /// Note a sub-test that passed. Sinks that only care about problems can ignore it.
    fn passed(&mut self, _location: Location, _message: &str) {}
}

impl FindingSink for Vec<Finding> {
    fn record(&mut self, finding: Finding) {
        self.push(finding);
    }
}

/// Append-only log of findings for one check, in emission order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingLog {
    pub findings: Vec<Finding>,
    pub passes: usize,
}

impl FindingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> usize {
        self.findings.iter().filter(|f| f.is_failure()).count()
    }

    pub fn count_at(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.is_failure() && f.severity == severity).count()
    }

    pub fn with_id<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.id == id)
    }
}

impl FindingSink for FindingLog {
    fn record(&mut self, finding: Finding) {
        tracing::debug!(id = %finding.id, severity = %finding.severity, "finding recorded");
        self.findings.push(finding);
    }

    fn passed(&mut self, _location: Location, _message: &str) {
        self.passes += 1;
    }
}

/// How a single check ended: exactly one of passed, findings logged, or aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed { failures: usize },
    /// Nothing to inspect (e.g. an optional table is absent).
    Skipped { reason: String },
    /// Acquisition failed; the check could not produce a pass/fail verdict.
    Error { message: String },
}

impl CheckOutcome {
    /// Derive the verdict for a check that ran to completion.
    pub fn from_log(log: &FindingLog) -> Self {
        match log.failures() {
            0 => CheckOutcome::Passed,
            failures => CheckOutcome::Failed { failures },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CheckOutcome::Error { .. })
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckOutcome::Passed => f.write_str("passed"),
            CheckOutcome::Failed { failures } => write!(f, "failed ({failures} findings)"),
            CheckOutcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            CheckOutcome::Error { message } => write!(f, "error: {message}"),
        }
    }
}
