use anyhow::Result;

use fwcheck_core::checks::Check;

use crate::commands::run::{run_command, RunSummary};
use crate::commands::util::SourceArgs;

/// Run only the kernel log checks.
pub fn klog_command(args: &SourceArgs, json: bool) -> Result<RunSummary> {
    let only = [Check::KlogOops.to_string(), Check::KlogPatterns.to_string()];
    run_command(args, &only, json)
}
