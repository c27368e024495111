// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Windows bridge: drives Microsoft Word through its COM automation server,
// scripted with PowerShell.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, instrument};
use wandelwerk_core::error::{Result, WandelError};

use crate::process::{absolute_path, run_guarded};
use crate::traits::WordAutomation;

/// `WdSaveFormat.wdFormatPDF`.
const WD_FORMAT_PDF: u32 = 17;

/// Word via COM, scripted through `powershell.exe`.
pub struct WordComBridge {
    powershell: Option<PathBuf>,
}

impl WordComBridge {
    pub fn new() -> Self {
        Self {
            powershell: which::which("powershell").ok(),
        }
    }
}

impl Default for WordComBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WordAutomation for WordComBridge {
    fn platform_name(&self) -> &str {
        "Word (COM)"
    }

    async fn is_available(&self) -> bool {
        let Some(powershell) = &self.powershell else {
            return false;
        };
        // Word registers this ProgID when installed.
        let mut lookup = Command::new(powershell);
        lookup.args([
            "-NoProfile",
            "-NonInteractive",
            "-Command",
            "if (Test-Path 'Registry::HKEY_CLASSES_ROOT\\Word.Application') { exit 0 } else { exit 1 }",
        ]);
        run_guarded(lookup, "Word registry lookup", Duration::from_secs(10))
            .await
            .is_ok()
    }

    #[instrument(skip_all, fields(input = %input.display(), output = %output.display()))]
    async fn export_pdf(&self, input: &Path, output: &Path, timeout: Duration) -> Result<()> {
        let powershell = self
            .powershell
            .as_ref()
            .ok_or(WandelError::PlatformUnavailable)?;

        let script = export_script(input, output)?;
        let mut command = Command::new(powershell);
        command.args(["-NoProfile", "-NonInteractive", "-Command", script.as_str()]);

        info!("Exporting through Word COM");
        run_guarded(command, "Word COM export", timeout).await?;
        Ok(())
    }
}

/// PowerShell single-quoted literal.
fn ps_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}

/// Both paths are made absolute first; Word opens relative paths against
/// its own working directory.
fn export_script(input: &Path, output: &Path) -> Result<String> {
    let input = absolute_path(input)?;
    let output = absolute_path(output)?;
    Ok(format!(
        "$ErrorActionPreference = 'Stop'; \
         $word = New-Object -ComObject Word.Application; \
         $word.Visible = $false; \
         $word.DisplayAlerts = 0; \
         try {{ \
           $doc = $word.Documents.Open({input}, $false, $true); \
           try {{ $doc.SaveAs2({output}, {format}) }} finally {{ $doc.Close($false) }} \
         }} finally {{ $word.Quit() }}",
        input = ps_quote(&input),
        output = ps_quote(&output),
        format = WD_FORMAT_PDF,
    ))
}
