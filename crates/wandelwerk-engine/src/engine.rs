// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The public call contract. `Converter` identifies the input, checks the
// pair against the conversion matrix, and dispatches to the image pipeline,
// the DOCX -> PDF fallback chain, or the text pipeline. Every failure is
// folded into a `ConversionResult`; nothing below this layer reaches the
// caller as an `Err` or a panic.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};
use wandelwerk_core::cancel::CancellationToken;
use wandelwerk_core::config::EngineConfig;
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::{Format, identify};
use wandelwerk_core::matrix::ConversionMatrix;
use wandelwerk_core::types::{
    BatchReport, ConversionOptions, ConversionRequest, ConversionResult, DocumentInfo,
    SizeMetrics, SupportedFormats,
};
use wandelwerk_document::text::docx::DocxReader;
use wandelwerk_document::text::{
    ExtractedAsset, pdf_source_html, read_document, save_assets, write_document, write_output,
};
use wandelwerk_document::{HtmlPdfRenderer, ImagePipeline};

use crate::batch::{BatchItem, collect_inputs, plan_outputs};
use crate::fallback::FallbackChain;
use crate::inspect::inspect_file;
use crate::strategies::docx_pdf_chain;

/// What a dispatched conversion produced, before it is written.
struct Produced {
    /// Output bytes still to be written; `None` when the stage already
    /// placed the file (fallback chain).
    bytes: Option<Vec<u8>>,
    producer: String,
    warnings: Vec<String>,
    assets: Vec<ExtractedAsset>,
}

/// Conversion engine. Cheap to clone and safe to share between tasks.
#[derive(Debug, Clone)]
pub struct Converter {
    config: EngineConfig,
    renderer: HtmlPdfRenderer,
    images: ImagePipeline,
    docx_pdf: Arc<FallbackChain>,
}

impl Converter {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let renderer = HtmlPdfRenderer::from_config(&config);
        let docx_pdf = Arc::new(docx_pdf_chain(&config, renderer.clone()));
        info!(
            backend = ?config.render_backend,
            chain = ?docx_pdf.names(),
            "converter ready"
        );
        Ok(Self {
            config,
            renderer,
            images: ImagePipeline::new(),
            docx_pdf,
        })
    }

    /// Replace the DOCX -> PDF chain.
    pub fn with_docx_pdf_chain(mut self, chain: FallbackChain) -> Self {
        self.docx_pdf = Arc::new(chain);
        self
    }

    /// Replace the image codecs.
    pub fn with_image_pipeline(mut self, images: ImagePipeline) -> Self {
        self.images = images;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -- Conversion -----------------------------------------------------------

    pub async fn convert(&self, request: &ConversionRequest) -> ConversionResult {
        self.convert_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Convert, checking `cancel` between stages.
    #[instrument(skip_all, fields(
        input = %request.input().display(),
        output = %request.output().display(),
        target = %request.target(),
    ))]
    pub async fn convert_with_cancel(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> ConversionResult {
        match self.try_convert(request, cancel).await {
            Ok(result) => result,
            Err(err) => {
                warn!(%err, kind = ?err.kind(), "conversion failed");
                ConversionResult::failed(&err)
            }
        }
    }

    /// Convert with the target given as a tag (`"pdf"`, `"jpg"`, ...).
    pub async fn convert_path(
        &self,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        target: &str,
        options: ConversionOptions,
    ) -> ConversionResult {
        match Format::from_str(target) {
            Ok(target) => {
                let request = ConversionRequest::new(input, output, target, options);
                self.convert(&request).await
            }
            Err(err) => {
                warn!(%err, "rejected target tag");
                ConversionResult::failed(&err)
            }
        }
    }

    async fn try_convert(
        &self,
        request: &ConversionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConversionResult> {
        let input = request.input();
        let output = request.output();
        let target = request.target();
        let options = request.options();

        if !input.is_file() {
            return Err(WandelError::InputMissing(input.to_path_buf()));
        }
        let source = identify(input, None);
        if !ConversionMatrix::global().is_allowed(source, target) {
            return Err(WandelError::UnsupportedConversion {
                from: source.to_string(),
                to: target.to_string(),
            });
        }
        let original_size = std::fs::metadata(input)?.len();
        info!(%source, %target, original_size, "conversion started");

        cancel.check()?;
        let produced = if source.is_image() {
            self.convert_image(input, source, target, options, cancel)
                .await?
        } else if (source, target) == (Format::Docx, Format::Pdf) {
            self.convert_docx_pdf(input, output, options, cancel).await?
        } else {
            self.convert_text(input, source, target, options, cancel)
                .await?
        };

        cancel.check()?;
        if let Some(bytes) = &produced.bytes {
            write_output(output, bytes)?;
        }

        let extracted = if options.extract_images {
            save_assets(&produced.assets, &request.image_output_dir())?
        } else {
            Vec::new()
        };

        let new_size = std::fs::metadata(output)?.len();
        let metrics = SizeMetrics::new(original_size, new_size);
        info!(
            producer = %produced.producer,
            new_size,
            ratio = metrics.compression_ratio,
            warnings = produced.warnings.len(),
            "conversion finished"
        );

        Ok(ConversionResult::succeeded(
            output,
            format!("Converted {} to {}", source, target),
        )
        .with_metrics(metrics)
        .with_assets(extracted)
        .with_producer(produced.producer)
        .with_warnings(produced.warnings))
    }

    async fn convert_image(
        &self,
        input: &Path,
        source: Format,
        target: Format,
        options: &ConversionOptions,
        cancel: &CancellationToken,
    ) -> Result<Produced> {
        let data = tokio::fs::read(input).await?;
        let images = self.images.clone();
        let image_options = options.image_options.clone();
        let task_cancel = cancel.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            images.run(&data, source, target, &image_options, &task_cancel)
        })
        .await
        .map_err(|err| WandelError::ImageError(format!("image task failed: {}", err)))??;

        if target != Format::Pdf {
            return Ok(Produced {
                bytes: Some(encoded.bytes),
                producer: encoded.codec.to_string(),
                warnings: encoded.warnings,
                assets: Vec::new(),
            });
        }

        cancel.check()?;
        let rendered = self
            .renderer
            .render_image(&encoded.bytes, Format::Png.mime_type(), &options.pdf_options)
            .await?;
        let mut warnings = encoded.warnings;
        warnings.extend(rendered.warnings);
        Ok(Produced {
            bytes: Some(rendered.bytes),
            producer: format!("{}+{}", encoded.codec, rendered.renderer),
            warnings,
            assets: Vec::new(),
        })
    }

    async fn convert_docx_pdf(
        &self,
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
        cancel: &CancellationToken,
    ) -> Result<Produced> {
        let outcome = self.docx_pdf.run(input, output, options, cancel).await?;

        let mut warnings: Vec<String> = outcome
            .failures
            .iter()
            .map(|cause| format!("fallback: {cause}"))
            .collect();
        warnings.extend(outcome.warnings);

        // Strategies outside the text pipeline never see the package contents.
        let assets = if options.extract_images && outcome.assets.is_empty() {
            let input = input.to_path_buf();
            tokio::task::spawn_blocking(move || docx_media(&input))
                .await
                .map_err(|err| WandelError::DocxError(format!("media task failed: {}", err)))??
        } else {
            outcome.assets
        };

        Ok(Produced {
            bytes: None,
            producer: outcome.strategy,
            warnings,
            assets,
        })
    }

    async fn convert_text(
        &self,
        input: &Path,
        source: Format,
        target: Format,
        options: &ConversionOptions,
        cancel: &CancellationToken,
    ) -> Result<Produced> {
        let path = input.to_path_buf();
        let read_options = options.clone();
        let doc = tokio::task::spawn_blocking(move || read_document(&path, source, &read_options))
            .await
            .map_err(|err| WandelError::Decode(format!("read task failed: {}", err)))??;

        cancel.check()?;
        if target == Format::Pdf {
            let html = pdf_source_html(&doc, options);
            let rendered = self
                .renderer
                .render_html(&html, &options.pdf_options)
                .await?;
            return Ok(Produced {
                bytes: Some(rendered.bytes),
                producer: rendered.renderer.to_string(),
                warnings: rendered.warnings,
                assets: doc.assets,
            });
        }

        let bytes = write_document(&doc, target, options)?;
        let mut warnings = Vec::new();
        if target == Format::Docx && (doc.html.is_some() || doc.markdown.is_some()) {
            warnings.push("DOCX output carries plain paragraphs only".to_string());
        }
        Ok(Produced {
            bytes: Some(bytes),
            producer: "text".to_string(),
            warnings,
            assets: doc.assets,
        })
    }

    // -- Inspection -----------------------------------------------------------

    pub async fn inspect(&self, path: impl AsRef<Path>) -> Result<DocumentInfo> {
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || inspect_file(&path))
            .await
            .map_err(|err| WandelError::Decode(format!("inspect task failed: {}", err)))?
    }

    pub fn supported_formats(&self) -> SupportedFormats {
        let matrix = ConversionMatrix::global();
        SupportedFormats {
            input_formats: matrix.input_formats(),
            output_formats: matrix.output_formats(),
            matrix: matrix
                .entries()
                .map(|(source, targets)| (source, targets.to_vec()))
                .collect(),
        }
    }

    // -- Batch ----------------------------------------------------------------

    /// Convert every eligible file directly inside `input_dir` into
    /// `output_dir`. Per-file failures are recorded and never abort the run.
    #[instrument(skip_all, fields(
        input_dir = %input_dir.as_ref().display(),
        output_dir = %output_dir.as_ref().display(),
        %target,
    ))]
    pub async fn batch_convert(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        target: Format,
        options: ConversionOptions,
    ) -> Result<BatchReport> {
        let inputs = collect_inputs(input_dir.as_ref())?;
        std::fs::create_dir_all(output_dir.as_ref())?;
        let items = plan_outputs(inputs, output_dir.as_ref(), target);
        info!(files = items.len(), "batch started");

        let results: Vec<ConversionResult> = stream::iter(items)
            .map(|BatchItem { input, output }| {
                let request = ConversionRequest::new(input, output, target, options.clone());
                async move { self.convert(&request).await }
            })
            .buffered(self.config.batch_concurrency.max(1))
            .collect()
            .await;

        let report = BatchReport::from_results(results);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "batch finished"
        );
        Ok(report)
    }
}

fn docx_media(path: &Path) -> Result<Vec<ExtractedAsset>> {
    let data = std::fs::read(path)?;
    Ok(DocxReader::from_bytes(data)?.read(false, true)?.media)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use wandelwerk_core::config::RenderBackend;
    use wandelwerk_core::error::ErrorKind;
    use wandelwerk_core::types::{FitMode, compression_ratio};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Offline engine: built-in renderer, no word-processor automation.
    fn converter() -> Converter {
        init_tracing();
        Converter::new(EngineConfig {
            render_backend: RenderBackend::Builtin,
            native_bridge_enabled: false,
            batch_concurrency: 2,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn write_docx(path: &Path, text: &str) {
        let file = std::fs::File::create(path).unwrap();
        docx_rs::Docx::new()
            .add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(text)),
            )
            .build()
            .pack(file)
            .unwrap();
    }

    #[tokio::test]
    async fn unsupported_pair_is_rejected_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        RgbImage::new(4, 4).save(&input).unwrap();
        let output = dir.path().join("photo.docx");

        let result = converter()
            .convert_path(&input, &output, "docx", ConversionOptions::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedConversion));
        assert!(result.message.contains("unsupported"));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn unknown_target_tag_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "hello").unwrap();

        let result = converter()
            .convert_path(&input, dir.path().join("a.xyz"), "xyz", ConversionOptions::default())
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedConversion));
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = converter()
            .convert_path(
                dir.path().join("absent.md"),
                dir.path().join("absent.html"),
                "html",
                ConversionOptions::default(),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::InputMissing));
    }

    #[tokio::test]
    async fn txt_to_md_and_back_preserves_text() {
        let dir = tempfile::tempdir().unwrap();
        let original = "Plain ASCII line\nSecond line, with punctuation!\n";
        let txt = dir.path().join("note.txt");
        std::fs::write(&txt, original).unwrap();

        let engine = converter();
        let md = dir.path().join("note.md");
        let first = engine
            .convert_path(&txt, &md, "md", ConversionOptions::default())
            .await;
        assert!(first.success, "{}", first.message);

        let back = dir.path().join("back.txt");
        let second = engine
            .convert_path(&md, &back, "txt", ConversionOptions::default())
            .await;
        assert!(second.success, "{}", second.message);
        assert_eq!(std::fs::read_to_string(&back).unwrap(), original);
    }

    #[tokio::test]
    async fn markdown_renders_to_pdf_with_builtin_layout() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "# Title\n\nSome *body* text.\n").unwrap();
        let output = dir.path().join("nested/out/doc.pdf");

        let result = converter()
            .convert_path(&input, &output, "pdf", ConversionOptions::default())
            .await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.produced_by.as_deref(), Some("builtin"));
        assert!(std::fs::read(&output).unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn docx_to_pdf_falls_through_to_generic_render() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("letter.docx");
        write_docx(&input, "Dear reader, this is a test.");
        let output = dir.path().join("letter.pdf");

        let result = converter()
            .convert_path(&input, &output, "pdf", ConversionOptions::default())
            .await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.produced_by.as_deref(), Some("generic-render"));
        assert!(result.warnings.iter().any(|w| w.contains("native-bridge")));
        assert!(result.warnings.iter().any(|w| w.contains("helper-script")));
        assert!(std::fs::metadata(&output).unwrap().len() > 0);

        let partials = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".partial."))
            .count();
        assert_eq!(partials, 0);
    }

    #[tokio::test]
    async fn cover_resize_yields_exact_box() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wide.png");
        RgbImage::from_pixel(300, 150, Rgb([10, 120, 200]))
            .save(&input)
            .unwrap();
        let output = dir.path().join("thumb.jpg");

        let mut options = ConversionOptions::default();
        options.image_options.width = Some(100);
        options.image_options.height = Some(100);
        options.image_options.fit = FitMode::Cover;

        let result = converter()
            .convert_path(&input, &output, "jpeg", options)
            .await;
        assert!(result.success, "{}", result.message);
        assert_eq!(image::image_dimensions(&output).unwrap(), (100, 100));
        let metrics = result.metrics.unwrap();
        assert!(metrics.original_size > 0);
        assert!(metrics.new_size > 0);
    }

    #[tokio::test]
    async fn image_to_pdf_is_a_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pic.png");
        RgbImage::from_pixel(40, 30, Rgb([200, 10, 10]))
            .save(&input)
            .unwrap();
        let output = dir.path().join("pic.pdf");

        let result = converter()
            .convert_path(&input, &output, "pdf", ConversionOptions::default())
            .await;
        assert!(result.success, "{}", result.message);
        assert!(std::fs::read(&output).unwrap().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn cancelled_request_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.txt");
        std::fs::write(&input, "text").unwrap();
        let output = dir.path().join("a.html");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let request =
            ConversionRequest::new(&input, &output, Format::Html, ConversionOptions::default());
        let result = converter().convert_with_cancel(&request, &cancel).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn batch_processes_only_supported_files() {
        let dir = tempfile::tempdir().unwrap();
        let input_dir = dir.path().join("in");
        std::fs::create_dir(&input_dir).unwrap();
        std::fs::write(input_dir.join("a.txt"), "alpha").unwrap();
        std::fs::write(input_dir.join("b.md"), "# beta").unwrap();
        std::fs::write(input_dir.join("c.html"), "<p>gamma</p>").unwrap();
        std::fs::write(input_dir.join("skip.xyz"), "ignored").unwrap();
        std::fs::write(input_dir.join("README"), "ignored").unwrap();

        let output_dir = dir.path().join("out");
        let report = converter()
            .batch_convert(&input_dir, &output_dir, Format::Html, ConversionOptions::default())
            .await
            .unwrap();

        // c.html -> html is outside the matrix and fails; the rest succeed.
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.succeeded + report.failed, 3);
        assert_eq!(report.succeeded, 2);
        assert!(output_dir.join("a.html").exists());
        assert!(output_dir.join("b.html").exists());
        assert_eq!(
            report.results[2].error_kind,
            Some(ErrorKind::UnsupportedConversion)
        );
    }

    #[test]
    fn supported_formats_mirror_the_matrix() {
        let formats = converter().supported_formats();
        assert_eq!(
            formats.input_formats.contains(&Format::Heic),
            cfg!(feature = "heic")
        );
        assert!(formats.output_formats.contains(&Format::Avif));
        assert!(!formats.output_formats.contains(&Format::Heic));
        assert!(formats.matrix[&Format::Docx].contains(&Format::Pdf));
        assert!(!formats.matrix[&Format::Pdf].contains(&Format::Docx));
    }

    #[tokio::test]
    async fn inspect_reports_estimated_docx_pages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("memo.docx");
        write_docx(&input, "short memo");

        let info = converter().inspect(&input).await.unwrap();
        assert_eq!(info.format, Format::Docx);
        assert_eq!(info.pages, Some(1));
        assert!(info.pages_estimated);
    }

    /// Write a small valid `source` file; false when there is no fixture for it.
    fn fixture(source: Format, path: &Path) -> bool {
        let text = "Quarterly notes\n\nRevenue grew in every region.\n";
        match source {
            Format::Txt => std::fs::write(path, text).unwrap(),
            Format::Md => std::fs::write(path, "# Notes\n\nRevenue *grew*.\n").unwrap(),
            Format::Html => std::fs::write(
                path,
                "<html><head><title>Notes</title></head><body><p>Revenue grew.</p></body></html>",
            )
            .unwrap(),
            Format::Pdf => {
                let bytes = wandelwerk_document::PdfWriter::new(Default::default())
                    .create_from_text(text)
                    .unwrap();
                std::fs::write(path, bytes).unwrap();
            }
            Format::Docx => write_docx(path, text),
            Format::Svg => std::fs::write(
                path,
                r##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"><rect width="16" height="16" fill="#3a7"/></svg>"##,
            )
            .unwrap(),
            Format::Jpeg
            | Format::Png
            | Format::Webp
            | Format::Tiff
            | Format::Gif
            | Format::Bmp
            | Format::Avif => {
                let format = image::ImageFormat::from_extension(source.extension()).unwrap();
                RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 90]))
                    .save_with_format(path, format)
                    .unwrap();
            }
            _ => return false,
        }
        true
    }

    #[tokio::test]
    async fn every_matrix_pair_converts_offline() {
        let dir = tempfile::tempdir().unwrap();
        let engine = converter();
        let mut converted = 0;

        for (source, targets) in ConversionMatrix::global().entries() {
            let input = dir.path().join(format!("source.{}", source.extension()));
            if !fixture(source, &input) {
                continue;
            }
            let original_size = std::fs::metadata(&input).unwrap().len();

            for &target in targets {
                let output = dir
                    .path()
                    .join(format!("{}_to.{}", source.extension(), target.extension()));
                let request =
                    ConversionRequest::new(&input, &output, target, ConversionOptions::default());
                let result = engine.convert(&request).await;
                assert!(result.success, "{source} -> {target}: {}", result.message);

                let new_size = std::fs::metadata(&output).unwrap().len();
                assert!(new_size > 0, "{source} -> {target} wrote an empty file");
                let metrics = result.metrics.unwrap();
                assert_eq!(metrics.original_size, original_size, "{source} -> {target}");
                assert_eq!(metrics.new_size, new_size, "{source} -> {target}");
                assert_eq!(
                    metrics.compression_ratio,
                    compression_ratio(original_size, new_size),
                    "{source} -> {target}"
                );
                converted += 1;
            }
        }
        assert!(converted > 0);
    }
}
