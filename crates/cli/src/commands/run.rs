use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;

use fwcheck_core::checks::{default_checks, run_checks, Check, CheckReport};
use fwcheck_core::findings::CheckOutcome;
use fwcheck_core::session::Session;
use fwcheck_core::tables::Signature;

use crate::commands::util::{build_config, SourceArgs};

/// Totals across a run, used for the exit status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[CheckReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome {
                CheckOutcome::Passed => summary.passed += 1,
                CheckOutcome::Failed { .. } => summary.failed += 1,
                CheckOutcome::Skipped { .. } => summary.skipped += 1,
                CheckOutcome::Error { .. } => summary.errors += 1,
            }
        }
        summary
    }

    /// 0 when clean, 1 when any check logged failures, 2 when any check aborted.
    pub fn exit_code(&self) -> u8 {
        if self.errors > 0 {
            2
        } else if self.failed > 0 {
            1
        } else {
            0
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub version: String,
    pub generated_at: String,
    pub tables: String,
    pub klog: String,
    pub checks: Vec<CheckReport>,
    pub summary: RunSummary,
}

/// Parse `table:SIG`, `klog:oops`, `klog:patterns`, or a bare signature.
pub fn parse_check(name: &str) -> Result<Check> {
    match name {
        "klog:oops" | "oops" => Ok(Check::KlogOops),
        "klog:patterns" | "patterns" => Ok(Check::KlogPatterns),
        other => {
            let sig = other.strip_prefix("table:").unwrap_or(other);
            let sig: Signature = sig.parse().map_err(|_| {
                anyhow!(
                    "Unknown check '{other}'. Use table:SIG, a 4-character signature, klog:oops or klog:patterns"
                )
            })?;
            Ok(Check::Table(sig))
        }
    }
}

/// Run the selected checks (all by default) in one session.
pub fn run_command(args: &SourceArgs, only: &[String], json: bool) -> Result<RunSummary> {
    let config = build_config(args)?;
    let session = Session::from_config(config);

    let checks = if only.is_empty() {
        default_checks(&session)
    } else {
        only.iter().map(|name| parse_check(name)).collect::<Result<Vec<_>>>()?
    };

    let reports = run_checks(&session, &checks);
    let summary = RunSummary::from_reports(&reports);
    let report = RunReport {
        version: fwcheck_core::version().to_string(),
        generated_at: Utc::now().to_rfc3339(),
        tables: session.registry().source().describe(),
        klog: session.log_source().describe(),
        checks: reports,
        summary,
    };
    session.finish();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_run_report(&report);
    }
    Ok(summary)
}

pub fn print_run_report(report: &RunReport) {
    println!("fwcheck v{} ({})", report.version, report.generated_at);
    println!("Tables: {}", report.tables);
    println!("Kernel log: {}", report.klog);
    println!();
    for check in &report.checks {
        print_check_report(check);
    }
    let s = &report.summary;
    println!();
    println!(
        "Summary: {} passed, {} failed, {} skipped, {} errors",
        s.passed, s.failed, s.skipped, s.errors
    );
}

pub fn print_check_report(check: &CheckReport) {
    println!("{}: {}", check.name, check.outcome);
    for finding in &check.findings {
        println!(
            "  - [{}] {} at {}: {}",
            finding.severity, finding.id, finding.location, finding.message
        );
        if let Some(advice) = &finding.advice {
            println!("      advice: {advice}");
        }
    }
}
