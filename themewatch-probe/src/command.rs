//! Thin wrapper over `std::process::Command` for the settings CLIs.

use std::path::Path;
use std::process::Command;

use crate::error::AccessError;

pub(crate) struct CommandOutput {
    pub success: bool,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn into_failure(self, program: &'static str) -> AccessError {
        AccessError::CommandFailed {
            program,
            status: self.status,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Run `program args…` to completion and capture its output.
///
/// A non-zero exit is returned as data, not as an error; callers decide
/// whether it means "missing key" or a real failure.
pub(crate) fn run(program: &'static str, args: &[&str]) -> Result<CommandOutput, AccessError> {
    run_as(program, Path::new(program), args)
}

/// Like [`run`], but executes `binary`; errors still name `program`.
pub(crate) fn run_as(
    program: &'static str,
    binary: &Path,
    args: &[&str],
) -> Result<CommandOutput, AccessError> {
    let output = Command::new(binary)
        .args(args)
        .output()
        .map_err(|source| AccessError::Spawn { program, source })?;

    Ok(CommandOutput {
        success: output.status.success(),
        status: output.status.to_string(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
