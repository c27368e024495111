// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTML → PDF rendering.
//
// Two back ends: headless Chromium driven over CDP (`chromiumoxide`), which
// honours CSS, and the built-in printpdf text layout, which needs nothing
// installed. `RenderBackend::Auto` tries the browser and falls back to the
// built-in layout, recording the degradation.

use std::path::PathBuf;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use wandelwerk_core::config::{EngineConfig, RenderBackend};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::types::{PdfOptions, parse_length_mm};

use crate::pdf::{PageLayout, PdfWriter};
use crate::text::markup;

const MM_PER_INCH: f64 = 25.4;

const BUILTIN_CJK_WARNING: &str = "built-in layout has no CJK fonts; CJK glyphs may be lost";

/// A rendered PDF and how it was produced.
#[derive(Debug)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    /// `"browser"` or `"builtin"`.
    pub renderer: &'static str,
    pub warnings: Vec<String>,
}

/// Renders HTML (or a single raster image) to PDF under a configured policy.
#[derive(Debug, Clone)]
pub struct HtmlPdfRenderer {
    backend: RenderBackend,
    browser_executable: Option<PathBuf>,
    timeout: Duration,
}

impl HtmlPdfRenderer {
    pub fn new(backend: RenderBackend) -> Self {
        Self {
            backend,
            browser_executable: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            backend: config.render_backend,
            browser_executable: config.browser_executable.clone(),
            timeout: Duration::from_secs(config.render_timeout_secs),
        }
    }

    pub fn backend(&self) -> RenderBackend {
        self.backend
    }

    /// Render a complete HTML document to a paginated PDF.
    #[instrument(skip_all, fields(backend = ?self.backend, html_len = html.len()))]
    pub async fn render_html(&self, html: &str, options: &PdfOptions) -> Result<RenderedPdf> {
        let layout = PageLayout::from_options(options);
        let title = markup::html_title(html);
        let text = markup::html_to_text(html);

        let mut rendered = self
            .render_with(
                || self.print_with_browser(html.to_string(), options, false),
                move || {
                    let mut writer = PdfWriter::new(layout);
                    if let Some(title) = title {
                        writer.set_title(title);
                    }
                    writer.create_from_text(&text)
                },
            )
            .await?;

        // The built-in layout only has the standard Latin-1 fonts.
        if options.prefer_chinese_fonts && rendered.renderer == "builtin" {
            warn!("CJK fonts requested but unavailable to the built-in layout");
            rendered.warnings.push(BUILTIN_CJK_WARNING.to_string());
        }
        Ok(rendered)
    }

    /// Render one encoded image (PNG/JPEG) onto a single PDF page.
    #[instrument(skip_all, fields(backend = ?self.backend, bytes_len = image_bytes.len()))]
    pub async fn render_image(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        options: &PdfOptions,
    ) -> Result<RenderedPdf> {
        let html = format!(
            "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><style>\
             html, body {{ margin: 0; padding: 0; }}\
             img {{ display: block; margin: 0 auto; max-width: 100%; max-height: 100vh; }}\
             </style></head><body><img src=\"data:{};base64,{}\" alt=\"\"></body></html>",
            mime_type,
            BASE64.encode(image_bytes)
        );
        let layout = PageLayout::from_options(options);
        let bytes = image_bytes.to_vec();

        self.render_with(
            || self.print_with_browser(html, options, true),
            move || PdfWriter::new(layout).create_from_image(&bytes),
        )
        .await
    }

    /// Apply the backend policy to a browser attempt and a built-in layout.
    async fn render_with<B, Fut, L>(&self, browser: B, builtin: L) -> Result<RenderedPdf>
    where
        B: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>>>,
        L: FnOnce() -> Result<Vec<u8>> + Send + 'static,
    {
        match self.backend {
            RenderBackend::Builtin => Ok(RenderedPdf {
                bytes: run_builtin(builtin).await?,
                renderer: "builtin",
                warnings: Vec::new(),
            }),
            RenderBackend::Browser => Ok(RenderedPdf {
                bytes: browser().await?,
                renderer: "browser",
                warnings: Vec::new(),
            }),
            RenderBackend::Auto => match browser().await {
                Ok(bytes) => Ok(RenderedPdf {
                    bytes,
                    renderer: "browser",
                    warnings: Vec::new(),
                }),
                Err(err) => {
                    warn!(%err, "browser rendering failed, using built-in layout");
                    Ok(RenderedPdf {
                        bytes: run_builtin(builtin).await?,
                        renderer: "builtin",
                        warnings: vec![format!(
                            "rendered with built-in layout; browser unavailable: {err}"
                        )],
                    })
                }
            },
        }
    }

    async fn print_with_browser(
        &self,
        html: String,
        options: &PdfOptions,
        single_page: bool,
    ) -> Result<Vec<u8>> {
        let params = print_params(options, single_page);
        let executable = self.browser_executable.clone();

        let render = async move {
            let mut session = BrowserSession::launch(executable, self.timeout).await?;
            let result = session.print(&html, params).await;
            session.close().await;
            result
        };

        tokio::time::timeout(self.timeout, render)
            .await
            .map_err(|_| {
                WandelError::Render(format!(
                    "browser render timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
    }
}

async fn run_builtin<L>(layout: L) -> Result<Vec<u8>>
where
    L: FnOnce() -> Result<Vec<u8>> + Send + 'static,
{
    tokio::task::spawn_blocking(layout)
        .await
        .map_err(|err| WandelError::Render(format!("built-in layout task failed: {}", err)))?
}

// -- Browser session ----------------------------------------------------------

/// A launched headless browser. Dropping the session aborts the CDP event
/// loop; the browser child process is spawned kill-on-drop by chromiumoxide.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(executable: Option<PathBuf>, timeout: Duration) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(timeout);
        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|err| WandelError::Render(format!("invalid browser config: {}", err)))?;

        info!("Launching headless browser");
        let (browser, mut handler) = Browser::launch(config).await.map_err(|err| {
            WandelError::ExternalProcess(format!("failed to launch browser: {}", err))
        })?;

        // Spawn handler to process browser events
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self { browser, handler })
    }

    async fn print(&mut self, html: &str, params: PrintToPdfParams) -> Result<Vec<u8>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|err| WandelError::Render(format!("failed to open page: {}", err)))?;

        page.set_content(html)
            .await
            .map_err(|err| WandelError::Render(format!("failed to load HTML: {}", err)))?;

        let bytes = page
            .pdf(params)
            .await
            .map_err(|err| WandelError::Render(format!("printToPDF failed: {}", err)))?;

        if let Err(err) = page.close().await {
            debug!(%err, "page close failed");
        }
        debug!(bytes = bytes.len(), "browser produced PDF");
        Ok(bytes)
    }

    async fn close(&mut self) {
        if let Err(err) = self.browser.close().await {
            debug!(%err, "browser close failed");
        }
        if let Err(err) = self.browser.wait().await {
            debug!(%err, "browser wait failed");
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

// -- printToPDF parameters ----------------------------------------------------

fn print_params(options: &PdfOptions, single_page: bool) -> PrintToPdfParams {
    let (width_mm, height_mm) = options.format.dimensions_mm();
    let margin = |value: &str| parse_length_mm(value).unwrap_or(20.0) as f64 / MM_PER_INCH;

    let header = options.header.as_deref().map(header_footer_template);
    let footer = options.footer.as_deref().map(header_footer_template);
    let has_running_text = header.is_some() || footer.is_some();

    PrintToPdfParams {
        landscape: Some(options.landscape),
        print_background: Some(options.print_background),
        scale: Some(options.clamped_scale() as f64),
        paper_width: Some(width_mm as f64 / MM_PER_INCH),
        paper_height: Some(height_mm as f64 / MM_PER_INCH),
        margin_top: Some(margin(&options.margin.top)),
        margin_right: Some(margin(&options.margin.right)),
        margin_bottom: Some(margin(&options.margin.bottom)),
        margin_left: Some(margin(&options.margin.left)),
        display_header_footer: Some(has_running_text),
        // An empty template suppresses Chromium's default date/title line.
        header_template: has_running_text.then(|| header.unwrap_or_else(|| "<span></span>".into())),
        footer_template: has_running_text.then(|| footer.unwrap_or_else(|| "<span></span>".into())),
        page_ranges: single_page.then(|| "1".to_string()),
        ..PrintToPdfParams::default()
    }
}

/// Chromium header/footer markup for a plain-text template, mapping
/// `{page}`/`{pages}` onto its `pageNumber`/`totalPages` spans.
fn header_footer_template(template: &str) -> String {
    let body = markup::escape_html(template)
        .replace("{pages}", "<span class=\"totalPages\"></span>")
        .replace("{page}", "<span class=\"pageNumber\"></span>");
    format!(
        "<div style=\"font-size: 9px; width: 100%; text-align: center; color: #555;\">{body}</div>"
    )
}
