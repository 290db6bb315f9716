//! Native package manager commands run after a manifest rewrite
//!
//! This module provides:
//! - Lockfile detection for Node.js projects
//! - Cancellable subprocess execution (the child is killed on cancellation)

use crate::error::IntegrationError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// The command line that was executed
    pub command: String,
    pub stdout: String,
    pub stderr: String,
}

/// Lockfile next to a manifest and the command that refreshes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockfileRefresh {
    pub lockfile: PathBuf,
    pub program: &'static str,
    pub args: &'static [&'static str],
}

impl LockfileRefresh {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program)
            .chain(self.args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Detect the Node.js lockfile in `dir`, in order of preference
pub fn detect_node_lockfile(dir: &Path) -> Option<LockfileRefresh> {
    if dir.join("pnpm-lock.yaml").exists() {
        return Some(LockfileRefresh {
            lockfile: dir.join("pnpm-lock.yaml"),
            program: "pnpm",
            args: &["install", "--lockfile-only", "--ignore-scripts"],
        });
    }
    if dir.join("package-lock.json").exists() {
        return Some(LockfileRefresh {
            lockfile: dir.join("package-lock.json"),
            program: "npm",
            args: &["install", "--package-lock-only", "--ignore-scripts"],
        });
    }
    None
}

/// Run `program args` in `working_dir`
///
/// A non-zero exit or a spawn failure is `CommandFailed`. If `ctx` is
/// cancelled first the child is killed and `Cancelled` is returned.
pub async fn run_native(
    ctx: &CancellationToken,
    program: &str,
    args: &[&str],
    working_dir: &Path,
) -> Result<CommandOutput, IntegrationError> {
    let command_line = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");

    if ctx.is_cancelled() {
        return Err(IntegrationError::Cancelled);
    }

    tracing::debug!(command = %command_line, dir = %working_dir.display(), "running native command");

    let child = Command::new(program)
        .args(args)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            IntegrationError::command_failed(&command_line, format!("failed to execute command: {e}"))
        })?;

    // Dropping the wait future drops the child, which kills it
    let waited = tokio::select! {
        _ = ctx.cancelled() => {
            tracing::debug!(command = %command_line, "command cancelled");
            return Err(IntegrationError::Cancelled);
        }
        output = child.wait_with_output() => output,
    };
    let output =
        waited.map_err(|e| IntegrationError::command_failed(&command_line, e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        let message = match stderr.trim() {
            "" => format!("exited with {}", output.status),
            detail => format!("exited with {}: {}", output.status, detail),
        };
        return Err(IntegrationError::command_failed(&command_line, message));
    }

    Ok(CommandOutput {
        command: command_line,
        stdout,
        stderr,
    })
}
