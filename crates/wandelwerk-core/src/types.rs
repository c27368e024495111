// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: conversion requests, option sets, results, and document
// information.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, WandelError};
use crate::format::Format;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Caller-supplied options for one conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Keep structured markup (headings, lists, tables) when the source has it.
    #[serde(alias = "preserveFormatting")]
    pub preserve_formatting: bool,
    /// Write embedded images of the source next to the output.
    #[serde(alias = "extractImages")]
    pub extract_images: bool,
    /// Destination for extracted images; defaults to `<output stem>_images`.
    #[serde(alias = "imageOutputDir")]
    pub image_output_dir: Option<PathBuf>,
    #[serde(alias = "imageOptions")]
    pub image_options: ImageOptions,
    #[serde(alias = "pdfOptions")]
    pub pdf_options: PdfOptions,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            preserve_formatting: true,
            extract_images: false,
            image_output_dir: None,
            image_options: ImageOptions::default(),
            pdf_options: PdfOptions::default(),
        }
    }
}

/// Resize policy mapping the source aspect ratio onto the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale to cover the box, then crop the overflow (centred).
    #[default]
    Cover,
    /// Scale to fit inside the box, then letterbox with the background colour.
    Contain,
    /// Stretch to exactly the box, ignoring aspect ratio.
    Fill,
    /// Scale to fit inside the box; output may be smaller than the box.
    Inside,
    /// Scale to cover the box; output may be larger than the box.
    Outside,
}

/// Image-specific options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Lossy quality 1-100 (default 80).
    pub quality: Option<u8>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: FitMode,
    /// Letterbox colour for `contain` (`#rgb`, `#rrggbb`, `#rrggbbaa`, or a name).
    pub background: Option<String>,
    pub progressive: bool,
    pub lossless: bool,
    /// Encoder effort, 0 (fastest) to 9 (smallest output).
    pub effort: Option<u8>,
    pub watermark: Option<WatermarkSpec>,
    pub effects: Effects,
}

impl ImageOptions {
    pub const DEFAULT_QUALITY: u8 = 80;

    /// Requested quality clamped to 1-100.
    pub fn quality(&self) -> u8 {
        self.quality.unwrap_or(Self::DEFAULT_QUALITY).clamp(1, 100)
    }

    /// Requested effort clamped to 0-9 (default 4).
    pub fn effort(&self) -> u8 {
        self.effort.unwrap_or(4).min(9)
    }

    pub fn wants_resize(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// Colour and effect adjustments, applied after resize and before watermarking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Effects {
    /// Gaussian blur sigma.
    pub blur: Option<f32>,
    /// Unsharp-mask sigma.
    pub sharpen: Option<f32>,
    /// Lightness multiplier (1.0 = unchanged).
    pub brightness: Option<f32>,
    /// Contrast factor (1.0 = unchanged).
    pub contrast: Option<f32>,
    /// Saturation multiplier (1.0 = unchanged).
    pub saturation: Option<f32>,
    /// Hue rotation in degrees.
    pub hue: Option<f32>,
    pub grayscale: bool,
    pub sepia: bool,
    pub invert: bool,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Where a watermark is anchored on the final canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

/// Text or image watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkSpec {
    pub text: Option<String>,
    pub image: Option<PathBuf>,
    pub position: Anchor,
    /// 0.0 (invisible) to 1.0 (opaque).
    pub opacity: f32,
    #[serde(alias = "fontSize")]
    pub font_size: u32,
    pub color: String,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: None,
            image: None,
            position: Anchor::BottomRight,
            opacity: 0.5,
            font_size: 24,
            color: "#ffffff".into(),
        }
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperSize {
    #[default]
    #[serde(alias = "a4")]
    A4,
    #[serde(alias = "a3")]
    A3,
    #[serde(alias = "a5")]
    A5,
    #[serde(alias = "letter")]
    Letter,
    #[serde(alias = "legal")]
    Legal,
    #[serde(alias = "tabloid")]
    Tabloid,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height), portrait.
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A4 => (210, 297),
            Self::A3 => (297, 420),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Tabloid => (279, 432),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page margins as CSS lengths (`20mm`, `1cm`, `0.5in`, `36pt`, `40px`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Margins {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: "20mm".into(),
            right: "20mm".into(),
            bottom: "20mm".into(),
            left: "20mm".into(),
        }
    }
}

impl Margins {
    /// Margins in millimetres (top, right, bottom, left). Unparseable values
    /// fall back to 20mm.
    pub fn to_mm(&self) -> [f32; 4] {
        [&self.top, &self.right, &self.bottom, &self.left]
            .map(|value| parse_length_mm(value).unwrap_or(20.0))
    }
}

/// Parse a CSS length into millimetres. A bare number is read as pixels.
pub fn parse_length_mm(value: &str) -> Option<f32> {
    let value = value.trim().to_ascii_lowercase();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f32 = number.parse().ok()?;
    let mm = match unit.trim() {
        "mm" => number,
        "cm" => number * 10.0,
        "in" => number * 25.4,
        "pt" => number * 25.4 / 72.0,
        "px" | "" => number * 25.4 / 96.0,
        _ => return None,
    };
    (mm >= 0.0).then_some(mm)
}

/// Layout options for paginated (PDF) output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfOptions {
    pub format: PaperSize,
    pub landscape: bool,
    #[serde(alias = "printBackground")]
    pub print_background: bool,
    /// Render scale, clamped to 0.1-2.0.
    pub scale: f32,
    pub margin: Margins,
    /// Header template; `{page}` and `{pages}` are substituted.
    pub header: Option<String>,
    /// Footer template; `{page}` and `{pages}` are substituted.
    pub footer: Option<String>,
    #[serde(alias = "preferChineseFonts")]
    pub prefer_chinese_fonts: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            format: PaperSize::A4,
            landscape: false,
            print_background: true,
            scale: 1.0,
            margin: Margins::default(),
            header: None,
            footer: None,
            prefer_chinese_fonts: false,
        }
    }
}

impl PdfOptions {
    pub fn orientation(&self) -> Orientation {
        if self.landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// Page size in millimetres with orientation applied.
    pub fn page_mm(&self) -> (f32, f32) {
        let (w, h) = self.format.dimensions_mm();
        match self.orientation() {
            Orientation::Portrait => (w as f32, h as f32),
            Orientation::Landscape => (h as f32, w as f32),
        }
    }

    pub fn clamped_scale(&self) -> f32 {
        if self.scale.is_finite() {
            self.scale.clamp(0.1, 2.0)
        } else {
            1.0
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One conversion request. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    input: PathBuf,
    output: PathBuf,
    target: Format,
    options: ConversionOptions,
}

impl ConversionRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        target: Format,
        options: ConversionOptions,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            target,
            options,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn target(&self) -> Format {
        self.target
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Directory for extracted images: the configured one, or
    /// `<output stem>_images` beside the output.
    pub fn image_output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.options.image_output_dir {
            return dir.clone();
        }
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".into());
        self.output
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{stem}_images"))
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Size comparison between source and output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeMetrics {
    pub original_size: u64,
    pub new_size: u64,
    /// Percentage saved, two decimals; negative when the output grew.
    pub compression_ratio: f64,
}

impl SizeMetrics {
    pub fn new(original_size: u64, new_size: u64) -> Self {
        Self {
            original_size,
            new_size,
            compression_ratio: compression_ratio(original_size, new_size),
        }
    }
}

/// `(original - new) / original * 100`, rounded to two decimals. Not clamped.
pub fn compression_ratio(original_size: u64, new_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    let ratio = (original_size as f64 - new_size as f64) / original_size as f64 * 100.0;
    (ratio * 100.0).round() / 100.0
}

/// Outcome of one conversion. Never an `Err`: failures are reported here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub message: String,
    pub metrics: Option<SizeMetrics>,
    pub extracted_assets: Vec<PathBuf>,
    pub error_kind: Option<ErrorKind>,
    /// Strategy, codec, or renderer that produced the output.
    pub produced_by: Option<String>,
    /// Fidelity lost along the way (fallbacks, ignored options).
    pub warnings: Vec<String>,
}

impl ConversionResult {
    pub fn succeeded(output_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            output_path: Some(output_path.into()),
            message: message.into(),
            metrics: None,
            extracted_assets: Vec::new(),
            error_kind: None,
            produced_by: None,
            warnings: Vec::new(),
        }
    }

    /// Normalise an error into a failed result carrying its message and kind.
    pub fn failed(err: &WandelError) -> Self {
        Self {
            success: false,
            output_path: None,
            message: format!("Conversion failed: {err}"),
            metrics: None,
            extracted_assets: Vec::new(),
            error_kind: Some(err.kind()),
            produced_by: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: SizeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_assets(mut self, assets: Vec<PathBuf>) -> Self {
        self.extracted_assets = assets;
        self
    }

    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.produced_by = Some(producer.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Facts about a file, as reported by `inspect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub format: Format,
    pub size: u64,
    pub pages: Option<u32>,
    /// True when `pages` is a heuristic (DOCX character count).
    pub pages_estimated: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    /// Pixel dimensions for images.
    pub dimensions: Option<(u32, u32)>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// The matrix as exposed to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedFormats {
    pub input_formats: Vec<Format>,
    pub output_formats: Vec<Format>,
    pub matrix: BTreeMap<Format, Vec<Format>>,
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Per-file results, in input order.
    pub results: Vec<ConversionResult>,
}

impl BatchReport {
    pub fn from_results(results: Vec<ConversionResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_ratio_reports_savings() {
        assert_eq!(compression_ratio(1000, 800), 20.00);
    }

    #[test]
    fn compression_ratio_keeps_negative_values() {
        assert_eq!(compression_ratio(1000, 1200), -20.00);
    }

    #[test]
    fn compression_ratio_rounds_to_two_decimals() {
        assert_eq!(compression_ratio(3, 2), 33.33);
        assert_eq!(compression_ratio(0, 10), 0.0);
    }

    #[test]
    fn option_schema_accepts_camel_case_aliases() {
        let json = r##"{
            "preserve_formatting": false,
            "image_options": {
                "quality": 60,
                "width": 100,
                "fit": "contain",
                "watermark": { "text": "DRAFT", "position": "top-left", "fontSize": 32 },
                "effects": { "grayscale": true, "blur": 1.5 }
            },
            "pdf_options": {
                "format": "letter",
                "printBackground": false,
                "margin": { "top": "1in" }
            }
        }"##;
        let options: ConversionOptions = serde_json::from_str(json).unwrap();
        assert!(!options.preserve_formatting);
        assert_eq!(options.image_options.quality(), 60);
        assert_eq!(options.image_options.fit, FitMode::Contain);
        let watermark = options.image_options.watermark.unwrap();
        assert_eq!(watermark.position, Anchor::TopLeft);
        assert_eq!(watermark.font_size, 32);
        assert_eq!(watermark.opacity, 0.5);
        assert!(options.image_options.effects.grayscale);
        assert_eq!(options.pdf_options.format, PaperSize::Letter);
        assert!(!options.pdf_options.print_background);
        assert_eq!(options.pdf_options.margin.bottom, "20mm");
    }

    #[test]
    fn quality_is_clamped() {
        let mut options = ImageOptions::default();
        assert_eq!(options.quality(), 80);
        options.quality = Some(0);
        assert_eq!(options.quality(), 1);
        options.quality = Some(250);
        assert_eq!(options.quality(), 100);
    }

    #[test]
    fn css_lengths_convert_to_millimetres() {
        assert_eq!(parse_length_mm("20mm"), Some(20.0));
        assert_eq!(parse_length_mm("1cm"), Some(10.0));
        assert_eq!(parse_length_mm("1in"), Some(25.4));
        assert_eq!(parse_length_mm("96px"), Some(25.4));
        assert_eq!(parse_length_mm("wide"), None);
    }

    #[test]
    fn landscape_swaps_page_dimensions() {
        let options = PdfOptions {
            landscape: true,
            ..PdfOptions::default()
        };
        assert_eq!(options.page_mm(), (297.0, 210.0));
    }

    #[test]
    fn default_image_dir_sits_beside_output() {
        let request = ConversionRequest::new(
            "/in/report.docx",
            "/out/report.html",
            Format::Html,
            ConversionOptions::default(),
        );
        assert_eq!(
            request.image_output_dir(),
            PathBuf::from("/out/report_images")
        );
    }

    #[test]
    fn batch_report_counts_outcomes() {
        let ok = ConversionResult::succeeded("/out/a.md", "ok");
        let bad = ConversionResult::failed(&WandelError::Cancelled);
        let report = BatchReport::from_results(vec![ok, bad.clone(), bad]);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);
    }
}
