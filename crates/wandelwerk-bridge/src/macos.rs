// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// macOS bridge: drives Microsoft Word with AppleScript through `osascript`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, instrument};
use wandelwerk_core::error::{Result, WandelError};

use crate::process::{absolute_path, run_guarded};
use crate::traits::WordAutomation;

const WORD_APP: &str = "/Applications/Microsoft Word.app";

/// Word via Apple Events.
pub struct WordAppleScriptBridge {
    osascript: Option<PathBuf>,
}

impl WordAppleScriptBridge {
    pub fn new() -> Self {
        Self {
            osascript: which::which("osascript").ok(),
        }
    }
}

impl Default for WordAppleScriptBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WordAutomation for WordAppleScriptBridge {
    fn platform_name(&self) -> &str {
        "Word (AppleScript)"
    }

    async fn is_available(&self) -> bool {
        self.osascript.is_some() && Path::new(WORD_APP).is_dir()
    }

    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    async fn export_pdf(&self, input: &Path, output: &Path, timeout: Duration) -> Result<()> {
        let osascript = self
            .osascript
            .as_ref()
            .ok_or(WandelError::PlatformUnavailable)?;

        let mut command = Command::new(osascript);
        command.arg("-e").arg(export_script(input, output)?);

        info!("Exporting through Word AppleScript");
        run_guarded(command, "Word AppleScript export", timeout).await?;
        Ok(())
    }
}

/// AppleScript string literal.
fn as_quote(path: &Path) -> String {
    let escaped = path
        .display()
        .to_string()
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// `POSIX file` resolves relative paths against Word's working directory,
/// so both paths are made absolute first.
fn export_script(input: &Path, output: &Path) -> Result<String> {
    let input = absolute_path(input)?;
    let output = absolute_path(output)?;
    Ok(format!(
        "tell application \"Microsoft Word\"\n\
         \topen POSIX file {input}\n\
         \tset theDoc to active document\n\
         \tsave as theDoc file name (POSIX file {output} as string) file format format PDF\n\
         \tclose theDoc saving no\n\
         end tell",
        input = as_quote(&input),
        output = as_quote(&output),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_escaped() {
        assert_eq!(as_quote(Path::new("/tmp/a \"b\".docx")), "\"/tmp/a \\\"b\\\".docx\"");
    }

    #[test]
    fn script_exports_pdf() {
        let script = export_script(Path::new("/in.docx"), Path::new("/out.pdf")).unwrap();
        assert!(script.contains("open POSIX file \"/in.docx\""));
        assert!(script.contains("file format format PDF"));
        assert!(script.contains("close theDoc saving no"));
    }

    #[test]
    fn relative_paths_reach_word_as_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let script = export_script(Path::new("in.docx"), Path::new(".out.partial.pdf")).unwrap();
        assert!(script.contains(&as_quote(&cwd.join("in.docx"))));
        assert!(script.contains(&as_quote(&cwd.join(".out.partial.pdf"))));
    }
}
