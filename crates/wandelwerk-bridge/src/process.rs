// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Guarded child-process execution: every child is spawned kill-on-drop and
// awaited under a timeout, so an abandoned or hung conversion never leaves a
// process behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};
use wandelwerk_core::error::{Result, WandelError};

/// Captured output of a child that exited successfully.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `command` to completion within `timeout`.
///
/// A spawn failure, a timeout, or a nonzero exit status are all
/// `ExternalProcess` errors carrying `label` and whatever stderr was
/// captured.
pub async fn run_guarded(
    mut command: Command,
    label: &str,
    timeout: Duration,
) -> Result<ProcessOutput> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|err| {
        WandelError::ExternalProcess(format!("failed to start {}: {}", label, err))
    })?;
    debug!(label, pid = child.id(), "child process started");

    // On timeout the future owning the child is dropped, which kills it.
    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            warn!(label, secs = timeout.as_secs(), "child process timed out");
            WandelError::ExternalProcess(format!(
                "{} timed out after {}s",
                label,
                timeout.as_secs()
            ))
        })?
        .map_err(|err| {
            WandelError::ExternalProcess(format!("failed to wait for {}: {}", label, err))
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(WandelError::ExternalProcess(format!(
            "{} exited with {}: {}",
            label,
            output.status,
            stderr.trim()
        )));
    }

    Ok(ProcessOutput { stdout, stderr })
}

/// `path` made absolute against this process's working directory, without
/// touching the filesystem. Automation servers resolve relative paths
/// against their own working directory, not ours.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|err| {
        WandelError::ExternalProcess(format!("failed to resolve {}: {}", path.display(), err))
    })
}
