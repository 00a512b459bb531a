//! Helper-process execution for acquisition paths that capture tool output.
//!
//! Strict request/response: spawn, drain stdout/stderr, block until exit.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} exited with {status}: {stderr}", .program.display())]
    Status { program: PathBuf, status: std::process::ExitStatus, stderr: String },
}

/// Run `program` with `args` and return its stdout decoded lossily.
///
/// A non-zero exit status is an error; output is never returned partially.
pub fn capture_stdout<I, S>(program: &Path, args: I) -> Result<String, ExecError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    debug!(program = %program.display(), "spawning helper");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ExecError::Spawn { program: program.to_path_buf(), source })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        warn!(program = %program.display(), status = %output.status, "helper failed");
        return Err(ExecError::Status { program: program.to_path_buf(), status: output.status, stderr });
    }
    debug!(program = %program.display(), bytes = output.stdout.len(), "helper finished");
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
