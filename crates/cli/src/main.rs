use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use fwcheck::commands::{klog_command, list_tables_command, run_command, SourceArgs};

/// Firmware table and kernel log compliance checker.
///
/// This CLI is a thin wrapper around `fwcheck-core`. All substantive logic
/// lives in the library so it can be tested thoroughly and reused.
#[derive(Parser, Debug)]
#[command(name = "fwcheck", version, about = "Firmware table and kernel log compliance checker", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run checks and report findings (the default).
    ///
    /// Exit status is 0 when every check passed or was skipped, 1 when any
    /// check logged failures, and 2 when any check could not run.
    Run {
        #[command(flatten)]
        sources: SourceArgs,

        /// Run only these checks (table:SIG, SIG, klog:oops, klog:patterns). Repeatable.
        #[arg(long = "check", value_name = "CHECK")]
        checks: Vec<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List table instances with their header fields and digests.
    Tables {
        #[command(flatten)]
        sources: SourceArgs,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run only the kernel log checks.
    Klog {
        #[command(flatten)]
        sources: SourceArgs,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    fwcheck::init_tracing(cli.verbose)?;

    let command = cli.command.unwrap_or(Command::Run {
        sources: SourceArgs::default(),
        checks: Vec::new(),
        json: false,
    });
    tracing::debug!(?command, "dispatching command");
    let code = match command {
        Command::Run { sources, checks, json } => run_command(&sources, &checks, json)?.exit_code(),
        Command::Tables { sources, json } => {
            list_tables_command(&sources, json)?;
            0
        }
        Command::Klog { sources, json } => klog_command(&sources, json)?.exit_code(),
    };

    Ok(ExitCode::from(code))
}
