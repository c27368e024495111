// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for platforms without a word-processor automation interface.
//
// Always unavailable; `export_pdf` returns `PlatformUnavailable`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use wandelwerk_core::error::{Result, WandelError};

use crate::traits::WordAutomation;

/// No-op bridge returned on Linux and other platforms.
pub struct StubBridge;

#[async_trait]
impl WordAutomation for StubBridge {
    fn platform_name(&self) -> &str {
        "unsupported platform (stub)"
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn export_pdf(&self, _input: &Path, _output: &Path, _timeout: Duration) -> Result<()> {
        tracing::warn!("WordAutomation::export_pdf called on stub bridge");
        Err(WandelError::PlatformUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_is_never_available() {
        let bridge = StubBridge;
        assert!(!bridge.is_available().await);
        let err = bridge
            .export_pdf(Path::new("a.docx"), Path::new("a.pdf"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, WandelError::PlatformUnavailable));
    }
}
