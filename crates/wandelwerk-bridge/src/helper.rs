// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External helper script runner. The script is invoked as
// `<interpreter> <script> <input> <output>` with each configured interpreter
// in turn until one run succeeds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, instrument, warn};
use wandelwerk_core::config::EngineConfig;
use wandelwerk_core::error::{Result, WandelError};

use crate::process::run_guarded;

/// A configured helper script and the interpreters allowed to run it.
#[derive(Debug, Clone)]
pub struct HelperScript {
    script: PathBuf,
    interpreters: Vec<String>,
    timeout: Duration,
}

impl HelperScript {
    pub fn new(script: impl Into<PathBuf>, interpreters: Vec<String>, timeout: Duration) -> Self {
        Self {
            script: script.into(),
            interpreters,
            timeout,
        }
    }

    /// The helper described by `config`, if one is configured.
    pub fn from_config(config: &EngineConfig) -> Option<Self> {
        config.helper_script.as_ref().map(|script| {
            Self::new(
                script,
                config.helper_interpreters.clone(),
                Duration::from_secs(config.external_timeout_secs),
            )
        })
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Configured interpreters that resolve on `PATH`, in order.
    pub fn resolved_interpreters(&self) -> Vec<PathBuf> {
        self.interpreters
            .iter()
            .filter_map(|name| which::which(name).ok())
            .collect()
    }

    /// The script exists and at least one interpreter resolves.
    pub fn is_available(&self) -> bool {
        self.script.is_file() && !self.resolved_interpreters().is_empty()
    }

    /// Run the script with each interpreter until one exits cleanly.
    /// Returns the interpreter that succeeded.
    #[instrument(skip_all, fields(script = %self.script.display(), input = %input.display()))]
    pub async fn run(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        let interpreters = self.resolved_interpreters();
        if interpreters.is_empty() {
            return Err(WandelError::ExternalProcess(format!(
                "no helper interpreter found among [{}]",
                self.interpreters.join(", ")
            )));
        }

        let mut failures = Vec::new();
        for interpreter in interpreters {
            let mut command = Command::new(&interpreter);
            command.arg(&self.script).arg(input).arg(output);

            let label = format!("{} {}", interpreter.display(), self.script.display());
            match run_guarded(command, &label, self.timeout).await {
                Ok(_) => {
                    info!(interpreter = %interpreter.display(), "helper script succeeded");
                    return Ok(interpreter);
                }
                Err(err) => {
                    warn!(interpreter = %interpreter.display(), %err, "helper script failed");
                    failures.push(err.to_string());
                }
            }
        }

        Err(WandelError::ExternalProcess(format!(
            "helper script failed with every interpreter: {}",
            failures.join("; ")
        )))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn helper(dir: &Path, body: &str, interpreters: &[&str]) -> HelperScript {
        let script = dir.join("helper.sh");
        std::fs::write(&script, body).unwrap();
        HelperScript::new(
            script,
            interpreters.iter().map(|s| s.to_string()).collect(),
            Duration::from_secs(10),
        )
    }

    #[tokio::test]
    async fn unknown_interpreters_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let helper = helper(
            dir.path(),
            "cp \"$1\" \"$2\"\n",
            &["wandelwerk-no-such-interpreter", "sh"],
        );
        assert!(helper.is_available());

        let input = dir.path().join("in.docx");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, b"payload").unwrap();

        let used = helper.run(&input, &output).await.unwrap();
        assert!(used.ends_with("sh"));
        assert_eq!(std::fs::read(&output).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn failing_script_reports_every_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let helper = helper(dir.path(), "echo nope >&2; exit 1\n", &["sh", "bash"]);
        let err = helper
            .run(&dir.path().join("a"), &dir.path().join("b"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn missing_script_is_unavailable() {
        let helper = HelperScript::new(
            "/nonexistent/helper.py",
            vec!["sh".into()],
            Duration::from_secs(1),
        );
        assert!(!helper.is_available());
    }
}
