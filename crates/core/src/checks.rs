//! Check drivers: each check acquires, validates and reports independently.
//!
//! Every check ends in exactly one [`CheckOutcome`]; an acquisition failure
//! in one check never stops the others.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::findings::{CheckOutcome, Finding, FindingLog, FindingSink, Location, Severity};
use crate::klog::{scan, Classifier, LogCategoryCounters, OopsClassifier, PatternClassifier};
use crate::session::Session;
use crate::tables::{Signature, TableError, TableRule};

/// A schedulable check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Table(Signature),
    KlogOops,
    KlogPatterns,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Table(sig) => write!(f, "table:{sig}"),
            Check::KlogOops => f.write_str("klog:oops"),
            Check::KlogPatterns => f.write_str("klog:patterns"),
        }
    }
}

impl Check {
    pub fn run(&self, session: &Session) -> CheckReport {
        let report = match self {
            Check::Table(sig) => table_check(session, *sig),
            Check::KlogOops => klog_oops_check(session),
            Check::KlogPatterns => klog_patterns_check(session),
        };
        info!(check = %report.name, outcome = %report.outcome, "check finished");
        report
    }
}

/// Result of one check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub name: String,
    pub outcome: CheckOutcome,
    pub findings: Vec<Finding>,
    pub passes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counters: Option<LogCategoryCounters>,
}

impl CheckReport {
    fn completed(name: String, log: FindingLog) -> Self {
        Self {
            name,
            outcome: CheckOutcome::from_log(&log),
            findings: log.findings,
            passes: log.passes,
            counters: None,
        }
    }

    fn ended(name: String, outcome: CheckOutcome, log: FindingLog) -> Self {
        Self { name, outcome, findings: log.findings, passes: log.passes, counters: None }
    }
}

/// Validate every instance of `signature` and apply its rule.
pub fn table_check(session: &Session, signature: Signature) -> CheckReport {
    let name = Check::Table(signature).to_string();
    let mut log = FindingLog::new();

    let set = match session.registry().get(signature) {
        Ok(set) => set,
        Err(TableError::NotFound(_)) if session.config().is_mandatory(signature) => {
            log.record(Finding::failure(
                Location::Check,
                Severity::High,
                format!("{signature}Missing"),
                format!("Required table {signature} was not found"),
            ));
            return CheckReport::completed(name, log);
        }
        Err(TableError::NotFound(_)) => {
            let reason = format!("{signature} not present");
            return CheckReport::ended(name, CheckOutcome::Skipped { reason }, log);
        }
        Err(e) => {
            warn!(%signature, error = %e, "table acquisition failed");
            return CheckReport::ended(name, CheckOutcome::Error { message: e.to_string() }, log);
        }
    };

    if set.instances().is_empty() {
        let message = set
            .rejected()
            .iter()
            .map(|r| r.error.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return CheckReport::ended(name, CheckOutcome::Error { message }, log);
    }
    for rejected in set.rejected() {
        log.record(Finding::failure(
            Location::Table { signature, instance: rejected.index, entry: None },
            Severity::High,
            format!("{signature}Malformed"),
            rejected.error.to_string(),
        ));
    }
    for finding in set.findings() {
        log.record(finding.clone());
    }

    let rule = TableRule::for_signature(signature);
    for instance in set.instances() {
        if let Err(e) = rule.check(instance, &mut log) {
            log.record(Finding::failure(
                instance.location(),
                Severity::High,
                format!("{signature}TooShort"),
                e.to_string(),
            ));
        }
    }
    CheckReport::completed(name, log)
}

fn klog_check(session: &Session, name: String, classifier: &mut dyn Classifier) -> CheckReport {
    let mut log = FindingLog::new();
    match scan(session.log_source(), classifier, &mut log) {
        Ok(_) => CheckReport::completed(name, log),
        Err(e) => {
            warn!(error = %e, "kernel log scan aborted");
            CheckReport::ended(name, CheckOutcome::Error { message: e.to_string() }, log)
        }
    }
}

/// Count kernel oopses and WARN_ON warnings.
pub fn klog_oops_check(session: &Session) -> CheckReport {
    let mut classifier = OopsClassifier::new();
    let mut report = klog_check(session, Check::KlogOops.to_string(), &mut classifier);
    if !report.outcome.is_error() {
        report.counters = Some(classifier.counters);
    }
    report
}

/// Match the log against the common-error catalog plus configured patterns.
pub fn klog_patterns_check(session: &Session) -> CheckReport {
    let name = Check::KlogPatterns.to_string();
    let mut classifier = match PatternClassifier::with_builtin(session.config().patterns.clone()) {
        Ok(classifier) => classifier,
        Err(e) => {
            let outcome = CheckOutcome::Error { message: e.to_string() };
            return CheckReport::ended(name, outcome, FindingLog::new());
        }
    };
    let mut report = klog_check(session, name, &mut classifier);
    if !report.outcome.is_error() {
        report.counters = Some(classifier.counters);
    }
    report
}

/// Table checks for every available or mandatory signature, then the log checks.
pub fn default_checks(session: &Session) -> Vec<Check> {
    let mut sigs = match session.registry().available() {
        Ok(sigs) => sigs,
        Err(e) => {
            warn!(error = %e, "could not list tables");
            Vec::new()
        }
    };
    sigs.extend(session.config().mandatory_tables.iter().copied());
    sigs.sort();
    sigs.dedup();

    let mut checks: Vec<Check> = sigs.into_iter().map(Check::Table).collect();
    checks.push(Check::KlogOops);
    checks.push(Check::KlogPatterns);
    checks
}

/// Run `checks` in order; each one is isolated from the others' failures.
pub fn run_checks(session: &Session, checks: &[Check]) -> Vec<CheckReport> {
    checks.iter().map(|check| check.run(session)).collect()
}
