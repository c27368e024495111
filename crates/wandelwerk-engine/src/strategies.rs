// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The DOCX -> PDF strategies, in chain order: word-processor automation,
// external helper script, and the generic read-and-render path.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument};
use wandelwerk_bridge::{HelperScript, WordAutomation};
use wandelwerk_core::config::EngineConfig;
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::Format;
use wandelwerk_document::render::HtmlPdfRenderer;
use wandelwerk_document::text::{pdf_source_html, read_document, write_output};

use crate::fallback::{ConversionStrategy, FallbackChain, StrategyJob, StrategyReport};

/// The standard DOCX -> PDF chain for `config`.
pub fn docx_pdf_chain(config: &EngineConfig, renderer: HtmlPdfRenderer) -> FallbackChain {
    FallbackChain::new(vec![
        Box::new(NativeBridgeStrategy::new(
            wandelwerk_bridge::platform_bridge(),
            config.native_bridge_enabled,
            Duration::from_secs(config.external_timeout_secs),
        )),
        Box::new(HelperScriptStrategy::new(HelperScript::from_config(config))),
        Box::new(GenericRenderStrategy::new(renderer)),
    ])
}

// -- Native word processor ----------------------------------------------------

pub struct NativeBridgeStrategy {
    bridge: Box<dyn WordAutomation>,
    enabled: bool,
    timeout: Duration,
}

impl NativeBridgeStrategy {
    pub fn new(bridge: Box<dyn WordAutomation>, enabled: bool, timeout: Duration) -> Self {
        Self {
            bridge,
            enabled,
            timeout,
        }
    }
}

#[async_trait]
impl ConversionStrategy for NativeBridgeStrategy {
    fn name(&self) -> &str {
        "native-bridge"
    }

    async fn is_available(&self) -> bool {
        self.enabled && self.bridge.is_available().await
    }

    async fn attempt(&self, job: &StrategyJob) -> Result<StrategyReport> {
        self.bridge
            .export_pdf(&job.input, &job.staging, self.timeout)
            .await?;
        info!(bridge = self.bridge.platform_name(), "word processor export finished");
        Ok(StrategyReport::default())
    }
}

// -- Helper script ------------------------------------------------------------

pub struct HelperScriptStrategy {
    helper: Option<HelperScript>,
}

impl HelperScriptStrategy {
    pub fn new(helper: Option<HelperScript>) -> Self {
        Self { helper }
    }
}

#[async_trait]
impl ConversionStrategy for HelperScriptStrategy {
    fn name(&self) -> &str {
        "helper-script"
    }

    async fn is_available(&self) -> bool {
        self.helper.as_ref().is_some_and(HelperScript::is_available)
    }

    async fn attempt(&self, job: &StrategyJob) -> Result<StrategyReport> {
        let helper = self.helper.as_ref().ok_or_else(|| {
            WandelError::Config("no helper script configured".into())
        })?;
        let interpreter = helper.run(&job.input, &job.staging).await?;
        info!(
            script = %helper.script().display(),
            interpreter = %interpreter.display(),
            "helper export finished"
        );
        Ok(StrategyReport::default())
    }
}

// -- Generic render -----------------------------------------------------------

/// Read the DOCX through the text pipeline and render its HTML to PDF.
/// Always available.
pub struct GenericRenderStrategy {
    renderer: HtmlPdfRenderer,
}

impl GenericRenderStrategy {
    pub fn new(renderer: HtmlPdfRenderer) -> Self {
        Self { renderer }
    }
}

#[async_trait]
impl ConversionStrategy for GenericRenderStrategy {
    fn name(&self) -> &str {
        "generic-render"
    }

    async fn is_available(&self) -> bool {
        true
    }

    #[instrument(skip_all, fields(input = %job.input.display()))]
    async fn attempt(&self, job: &StrategyJob) -> Result<StrategyReport> {
        let input = job.input.clone();
        let options = job.options.clone();
        let read = move || read_document(&input, Format::Docx, &options);
        let doc = tokio::task::spawn_blocking(read)
            .await
            .map_err(|err| WandelError::Decode(format!("DOCX read task failed: {}", err)))??;

        job.cancel.check()?;
        let html = pdf_source_html(&doc, &job.options);
        let rendered = self
            .renderer
            .render_html(&html, &job.options.pdf_options)
            .await?;

        job.cancel.check()?;
        write_output(&job.staging, &rendered.bytes)?;

        let mut warnings = vec![format!(
            "DOCX layout approximated through HTML ({} renderer)",
            rendered.renderer
        )];
        warnings.extend(rendered.warnings);
        Ok(StrategyReport {
            warnings,
            assets: doc.assets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use wandelwerk_bridge::stub::StubBridge;
    use wandelwerk_core::cancel::CancellationToken;
    use wandelwerk_core::config::RenderBackend;
    use wandelwerk_core::types::ConversionOptions;

    #[tokio::test]
    async fn disabled_bridge_is_unavailable() {
        let strategy = NativeBridgeStrategy::new(Box::new(StubBridge), true, Duration::from_secs(1));
        assert!(!strategy.is_available().await);
        let strategy = NativeBridgeStrategy::new(Box::new(StubBridge), false, Duration::from_secs(1));
        assert!(!strategy.is_available().await);
    }

    #[tokio::test]
    async fn unconfigured_helper_is_unavailable() {
        let strategy = HelperScriptStrategy::new(None);
        assert!(!strategy.is_available().await);
        let job = StrategyJob {
            input: "in.docx".into(),
            staging: "out.pdf".into(),
            options: ConversionOptions::default(),
            cancel: CancellationToken::new(),
        };
        assert!(matches!(
            strategy.attempt(&job).await,
            Err(WandelError::Config(_))
        ));
    }

    #[tokio::test]
    async fn generic_render_fails_cleanly_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.docx");
        std::fs::write(&input, b"not a zip").unwrap();

        let strategy = GenericRenderStrategy::new(HtmlPdfRenderer::new(RenderBackend::Builtin));
        let job = StrategyJob {
            input,
            staging: dir.path().join(".out.partial.pdf"),
            options: ConversionOptions::default(),
            cancel: CancellationToken::new(),
        };
        assert!(strategy.attempt(&job).await.is_err());
        assert!(!Path::new(&job.staging).exists());
    }
}
