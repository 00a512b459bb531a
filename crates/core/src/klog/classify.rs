//! Line classifiers and their category counters.
//!
//! A classifier sees each distinct line once, in original order, together
//! with the distinct line before it. Counters move by one per distinct
//! occurrence regardless of how many physical repeats were collapsed.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::findings::{Finding, FindingSink, Location, Severity};
use crate::klog::LogLine;

pub trait Classifier {
    /// Classify one distinct line. Returns whether it matched a category.
    ///
    /// Must not fail: a line that cannot be classified is simply unmatched.
    fn classify(
        &mut self,
        line: &LogLine,
        previous: Option<&LogLine>,
        sink: &mut dyn FindingSink,
    ) -> bool;

    /// Called once after the final line; emits any deferred summary findings.
    fn finish(&mut self, _sink: &mut dyn FindingSink) {}
}

/// Per-scan accumulator; a fresh one is created for every scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogCategoryCounters {
    pub oops: usize,
    pub warn: usize,
    /// Call traces not directly preceded by an oops or warning marker.
    pub call_trace: usize,
    /// Hits per named common-error pattern.
    pub patterns: BTreeMap<String, usize>,
}

impl LogCategoryCounters {
    pub fn pattern(&self, id: &str) -> usize {
        self.patterns.get(id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.oops + self.warn + self.call_trace + self.patterns.values().sum::<usize>()
    }
}

fn repeat_suffix(line: &LogLine) -> String {
    if line.repeat > 1 {
        format!(" (repeated {} times)", line.repeat)
    } else {
        String::new()
    }
}

/// Lines that open an oops dump (or a panic with no preceding dump).
const OOPS_MARKERS: &[&str] = &[
    "Oops:",
    "BUG: unable to handle",
    "BUG: kernel NULL pointer dereference",
    "general protection fault",
    "Kernel panic - not syncing",
    "kernel BUG at",
];
const WARN_MARKERS: &[&str] = &["WARNING:"];
const CALL_TRACE_MARKER: &str = "Call Trace:";
const END_MARKER: &str = "---[ end ";
/// Prefixes of the fixed lines a fault dump prints between its marker and the trace.
const DUMP_BODY_PREFIXES: &[&str] = &[
    "Modules linked in:",
    "Hardware name:",
    "Workqueue:",
    "Tainted:",
    "Code:",
    "PKRU:",
    "PGD ",
    "#PF:",
    "invalid opcode:",
    "<TASK>",
    "</TASK>",
    "<IRQ>",
    "</IRQ>",
    "? ",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DumpKind {
    Oops,
    Warn,
}

/// The fault dump currently being read.
#[derive(Debug, Clone, Copy)]
struct OpenDump {
    kind: DumpKind,
    /// Set once `---[ end trace` is seen; the dump may still be followed by
    /// register lines and the panic it triggered.
    ended: bool,
}

/// Counts kernel oopses and `WARN_ON` assertions, one per dump.
///
/// A dump opens at its first marker and stays open across the register,
/// module and stack-frame lines the kernel prints with it. Further markers and
/// call traces inside an open dump belong to it. Oopses are reported as they
/// are seen; warnings and stray call traces are summarised once the scan ends.
#[derive(Debug, Default)]
pub struct OopsClassifier {
    pub counters: LogCategoryCounters,
    open: Option<OpenDump>,
    first_warn: Option<usize>,
    first_trace: Option<usize>,
}

impl OopsClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_kind(&self) -> Option<DumpKind> {
        self.open.map(|dump| dump.kind)
    }

    fn in_live_dump(&self) -> bool {
        self.open.is_some_and(|dump| !dump.ended)
    }
}

fn is_oops(text: &str) -> bool {
    OOPS_MARKERS.iter().any(|m| text.contains(m))
}

fn is_warn(text: &str) -> bool {
    WARN_MARKERS.iter().any(|m| text.contains(m))
}

/// `RAX: ...`, `CPU: 0 PID: ...`, `CR2: ...` and other short upper-case tags.
fn is_register_line(text: &str) -> bool {
    text.split_once(':').is_some_and(|(tag, _)| {
        (2..=3).contains(&tag.len())
            && tag.starts_with(|c: char| c.is_ascii_uppercase())
            && tag.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    })
}

/// `func+0x1c/0x40 [module]` style stack frames.
fn is_stack_frame(text: &str) -> bool {
    text.split_whitespace().any(|word| word.contains("+0x") && word.contains("/0x"))
}

fn is_dump_body(text: &str) -> bool {
    let text = text.trim_start();
    DUMP_BODY_PREFIXES.iter().any(|p| text.starts_with(p))
        || is_register_line(text)
        || is_stack_frame(text)
}

impl Classifier for OopsClassifier {
    fn classify(
        &mut self,
        line: &LogLine,
        _previous: Option<&LogLine>,
        sink: &mut dyn FindingSink,
    ) -> bool {
        let text = line.text.as_str();
        if is_oops(text) {
            // `BUG: unable to handle` is followed by its own `Oops:` line, and an
            // ended oops dump by the panic it caused: both are the same fault.
            let same_fault = match self.open {
                Some(OpenDump { kind: DumpKind::Oops, ended }) => {
                    !ended || text.contains("Kernel panic")
                }
                _ => false,
            };
            if same_fault {
                return true;
            }
            self.counters.oops += 1;
            self.open = Some(OpenDump { kind: DumpKind::Oops, ended: false });
            sink.record(
                Finding::failure(
                    Location::LogLine { line: line.line },
                    Severity::Critical,
                    "KlogOops",
                    format!("Kernel oops: {}{}", text.trim(), repeat_suffix(line)),
                )
                .with_advice(
                    "The kernel hit a fault it could not recover from cleanly; the following \
                     call trace identifies the faulting code path.",
                ),
            );
            return true;
        }
        if is_warn(text) {
            if self.in_live_dump() && self.open_kind() == Some(DumpKind::Warn) {
                return true;
            }
            self.counters.warn += 1;
            self.first_warn.get_or_insert(line.line);
            self.open = Some(OpenDump { kind: DumpKind::Warn, ended: false });
            return true;
        }
        if text.contains(CALL_TRACE_MARKER) {
            if !self.in_live_dump() {
                self.counters.call_trace += 1;
                self.first_trace.get_or_insert(line.line);
            }
            return true;
        }
        if text.trim_start().starts_with(END_MARKER) {
            if let Some(dump) = self.open.as_mut() {
                dump.ended = true;
            }
            return false;
        }
        if self.open.is_some() && !is_dump_body(text) {
            self.open = None;
        }
        false
    }

    fn finish(&mut self, sink: &mut dyn FindingSink) {
        if let Some(line) = self.first_warn {
            sink.record(Finding::failure(
                Location::LogLine { line },
                Severity::High,
                "KlogWarnOn",
                format!("Found {} kernel WARN_ON warning(s)", self.counters.warn),
            ));
        }
        if let Some(line) = self.first_trace {
            sink.record(Finding::failure(
                Location::LogLine { line },
                Severity::Medium,
                "KlogCallTrace",
                format!("Found {} unattributed call trace(s)", self.counters.call_trace),
            ));
        }
        if self.counters.oops == 0 && self.counters.warn == 0 {
            sink.passed(Location::Check, "no kernel oopses or WARN_ON warnings");
        }
    }
}

/// One named entry in the common-error catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Finding identifier, e.g. `KlogAcpiError`.
    pub id: String,
    /// Regular expression matched against the normalised line text.
    pub pattern: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<String>,
}

impl PatternRule {
    pub fn new(id: &str, pattern: &str, severity: Severity, advice: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            pattern: pattern.to_string(),
            severity,
            advice: advice.map(str::to_string),
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid pattern for {id}: {source}")]
pub struct PatternError {
    pub id: String,
    #[source]
    pub source: regex::Error,
}

/// Built-in catalog of common firmware-related kernel errors.
pub fn builtin_patterns() -> Vec<PatternRule> {
    vec![
        PatternRule::new(
            "KlogFirmwareBug",
            r"\[Firmware Bug\]",
            Severity::High,
            Some("The kernel detected firmware behaviour that violates the specification."),
        ),
        PatternRule::new("KlogFirmwareWarn", r"\[Firmware Warn\]", Severity::Medium, None),
        PatternRule::new("KlogFirmwareInfo", r"\[Firmware Info\]", Severity::Low, None),
        PatternRule::new(
            "KlogAcpiError",
            r"ACPI (BIOS )?Error",
            Severity::High,
            Some("AML or table errors usually point at a bug in the firmware's ACPI tables."),
        ),
        PatternRule::new("KlogAcpiException", r"ACPI Exception", Severity::High, None),
        PatternRule::new("KlogAcpiWarning", r"ACPI (BIOS )?Warning", Severity::Medium, None),
        PatternRule::new(
            "KlogHardwareError",
            r"\[Hardware Error\]",
            Severity::Critical,
            Some("Machine check or platform error reported by firmware."),
        ),
        PatternRule::new(
            "KlogBiosBug",
            r"(?i)bios bug",
            Severity::Medium,
            Some("Check for a firmware update from the platform vendor."),
        ),
    ]
}

struct CompiledRule {
    rule: PatternRule,
    regex: Regex,
}

/// Matches lines against a catalog; the first matching rule wins.
pub struct PatternClassifier {
    rules: Vec<CompiledRule>,
    pub counters: LogCategoryCounters,
}

impl PatternClassifier {
    pub fn new(rules: impl IntoIterator<Item = PatternRule>) -> Result<Self, PatternError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|regex| CompiledRule { rule: rule.clone(), regex })
                    .map_err(|source| PatternError { id: rule.id.clone(), source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules, counters: LogCategoryCounters::default() })
    }

    /// Built-in catalog followed by `extra`.
    pub fn with_builtin(extra: impl IntoIterator<Item = PatternRule>) -> Result<Self, PatternError> {
        Self::new(builtin_patterns().into_iter().chain(extra))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Classifier for PatternClassifier {
    fn classify(
        &mut self,
        line: &LogLine,
        _previous: Option<&LogLine>,
        sink: &mut dyn FindingSink,
    ) -> bool {
        let Some(hit) = self.rules.iter().find(|r| r.regex.is_match(&line.text)) else {
            return false;
        };
        *self.counters.patterns.entry(hit.rule.id.clone()).or_insert(0) += 1;

        let mut finding = Finding::failure(
            Location::LogLine { line: line.line },
            hit.rule.severity,
            hit.rule.id.clone(),
            format!("{}{}", line.text, repeat_suffix(line)),
        );
        if let Some(advice) = &hit.rule.advice {
            finding = finding.with_advice(advice.clone());
        }
        sink.record(finding);
        true
    }

    fn finish(&mut self, sink: &mut dyn FindingSink) {
        if self.counters.patterns.is_empty() {
            sink.passed(Location::Check, "no common kernel errors found");
        }
    }
}
