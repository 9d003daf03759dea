use crate::errors::{PatchStackError, Result};
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Command;

/// Captured result of a `git` subprocess
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// Turn a failed invocation into a `Command` error
    pub fn checked(self, command: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(PatchStackError::command(command, self.stderr.trim()))
        }
    }
}

/// Run `git <args>` in `dir`. Failing to spawn git is an error; a non-zero
/// exit is reported through `GitOutput::success`.
pub fn run_git<I, S>(dir: &Path, args: I) -> Result<GitOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<OsString> = args
        .into_iter()
        .map(|a| a.as_ref().to_os_string())
        .collect();
    let shown = display_command(&args);
    tracing::debug!("$ {}", shown);

    let output = Command::new("git")
        .args(&args)
        .current_dir(dir)
        .output()
        .map_err(|e| PatchStackError::command(shown.clone(), e.to_string()))?;

    let result = GitOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !result.success {
        tracing::debug!("`{}` exited with {}: {}", shown, output.status, result.stderr.trim());
    }

    Ok(result)
}

pub(crate) fn display_command(args: &[OsString]) -> String {
    let mut line = String::from("git");
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}
