// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait for driving an installed word processor.
//
// Each desktop platform exposes a different automation interface (COM on
// Windows, Apple Events on macOS). The trait hides which one is in use.
// Platforms without one get the stub, which returns
// `WandelError::PlatformUnavailable`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use wandelwerk_core::error::Result;

/// Automation of a locally installed word processor.
#[async_trait]
pub trait WordAutomation: Send + Sync {
    /// Human-readable name of the automation route (e.g. "Word (COM)").
    fn platform_name(&self) -> &str;

    /// Whether the automation interface and the application are present.
    /// Must be cheap; it runs before every attempt.
    async fn is_available(&self) -> bool;

    /// Open `input` in the word processor and export it as PDF to `output`.
    ///
    /// Returns once the automation process has exited cleanly. The caller
    /// still verifies that `output` exists and is nonempty.
    async fn export_pdf(&self, input: &Path, output: &Path, timeout: Duration) -> Result<()>;
}
