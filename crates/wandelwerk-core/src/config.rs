// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WandelError};

/// Prefix for environment overrides (`WANDELWERK_RENDER_BACKEND`, ...).
pub const ENV_PREFIX: &str = "WANDELWERK_";

/// Which HTML→PDF renderer to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackend {
    /// Headless browser first, built-in layout if the browser cannot start.
    #[default]
    Auto,
    /// Headless browser only.
    Browser,
    /// Built-in text layout only; never launches a browser.
    Builtin,
}

impl std::str::FromStr for RenderBackend {
    type Err = WandelError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "browser" | "chromium" => Ok(Self::Browser),
            "builtin" | "native" => Ok(Self::Builtin),
            other => Err(WandelError::Config(format!(
                "unknown render backend: {other}"
            ))),
        }
    }
}

/// Engine-wide settings. Request options override nothing here; these are
/// deployment concerns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub render_backend: RenderBackend,
    /// Explicit Chromium/Chrome binary; auto-detected when unset.
    pub browser_executable: Option<PathBuf>,
    /// Upper bound for one browser render, in seconds.
    pub render_timeout_secs: u64,
    /// Try OS office automation first for DOCX→PDF.
    pub native_bridge_enabled: bool,
    /// Helper script for DOCX→PDF; the strategy is skipped when unset.
    pub helper_script: Option<PathBuf>,
    /// Interpreters tried, in order, to run the helper script.
    pub helper_interpreters: Vec<String>,
    /// Upper bound for one external process, in seconds.
    pub external_timeout_secs: u64,
    /// Files converted at once during batch runs.
    pub batch_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            render_backend: RenderBackend::Auto,
            browser_executable: None,
            render_timeout_secs: 60,
            native_bridge_enabled: true,
            helper_script: None,
            helper_interpreters: vec!["python3".into(), "python".into(), "py".into()],
            external_timeout_secs: 120,
            batch_concurrency: 1,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            WandelError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    /// Apply `WANDELWERK_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = var("RENDER_BACKEND") {
            self.render_backend = value.parse()?;
        }
        if let Some(value) = var("BROWSER") {
            self.browser_executable = Some(PathBuf::from(value));
        }
        if let Some(value) = var("RENDER_TIMEOUT_SECS") {
            self.render_timeout_secs = parse_number("RENDER_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = var("NATIVE_BRIDGE") {
            self.native_bridge_enabled = parse_flag("NATIVE_BRIDGE", &value)?;
        }
        if let Some(value) = var("HELPER_SCRIPT") {
            self.helper_script = Some(PathBuf::from(value));
        }
        if let Some(value) = var("HELPER_INTERPRETERS") {
            self.helper_interpreters = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(value) = var("EXTERNAL_TIMEOUT_SECS") {
            self.external_timeout_secs = parse_number("EXTERNAL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = var("BATCH_CONCURRENCY") {
            self.batch_concurrency = parse_number("BATCH_CONCURRENCY", &value)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_concurrency == 0 {
            return Err(WandelError::Config(
                "batch_concurrency must be at least 1".into(),
            ));
        }
        if self.render_timeout_secs == 0 || self.external_timeout_secs == 0 {
            return Err(WandelError::Config("timeouts must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        WandelError::Config(format!("{ENV_PREFIX}{name} is not a number: {value}"))
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(WandelError::Config(format!(
            "{ENV_PREFIX}{name} is not a boolean: {value}"
        ))),
    }
}
