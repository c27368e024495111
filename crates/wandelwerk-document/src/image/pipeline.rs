// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The image pipeline: decode, transform, encode, with the secondary codec
// rerunning the whole pipeline when the primary codec fails.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use wandelwerk_core::cancel::CancellationToken;
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::Format;
use wandelwerk_core::types::ImageOptions;

use super::codec::ImageCodec;
use super::primary::PrimaryCodec;
use super::software::SoftwareCodec;
use super::svg;

/// Encoded pipeline output.
#[derive(Debug, Clone)]
pub struct ImageOutput {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Name of the codec that produced `bytes`.
    pub codec: &'static str,
    pub warnings: Vec<String>,
}

/// Two-codec image pipeline.
#[derive(Clone)]
pub struct ImagePipeline {
    primary: Arc<dyn ImageCodec>,
    secondary: Arc<dyn ImageCodec>,
}

impl Default for ImagePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePipeline")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.name())
            .finish()
    }
}

impl ImagePipeline {
    pub fn new() -> Self {
        Self::with_codecs(Arc::new(PrimaryCodec), Arc::new(SoftwareCodec))
    }

    pub fn with_codecs(primary: Arc<dyn ImageCodec>, secondary: Arc<dyn ImageCodec>) -> Self {
        Self { primary, secondary }
    }

    /// Convert `input` (identified as `source`) for `target`.
    ///
    /// For `svg` the output is an SVG document embedding a PNG; for `pdf`
    /// it is the PNG itself, ready for the PDF renderer.
    #[instrument(skip_all, fields(source = %source, target = %target, bytes = input.len()))]
    pub fn run(
        &self,
        input: &[u8],
        source: Format,
        target: Format,
        options: &ImageOptions,
        cancel: &CancellationToken,
    ) -> Result<ImageOutput> {
        let encoding = match target {
            Format::Svg | Format::Pdf => Format::Png,
            other if other.is_image() && other != Format::Heic => other,
            other => {
                return Err(WandelError::UnsupportedConversion {
                    from: source.to_string(),
                    to: other.to_string(),
                });
            }
        };

        let mut output = if self.primary.can_encode(encoding) {
            match run_codec(self.primary.as_ref(), input, source, encoding, options, cancel) {
                Ok(output) => output,
                Err(WandelError::Cancelled) => return Err(WandelError::Cancelled),
                Err(primary_err) => {
                    warn!(%primary_err, "primary codec failed, rerunning with secondary");
                    match run_codec(
                        self.secondary.as_ref(),
                        input,
                        source,
                        encoding,
                        options,
                        cancel,
                    ) {
                        Ok(mut output) => {
                            output.warnings.insert(
                                0,
                                format!("secondary codec used; primary failed: {primary_err}"),
                            );
                            output
                        }
                        Err(WandelError::Cancelled) => return Err(WandelError::Cancelled),
                        Err(secondary_err) => {
                            warn!(%secondary_err, "secondary codec failed as well");
                            return Err(primary_err);
                        }
                    }
                }
            }
        } else {
            let mut output = run_codec(
                self.secondary.as_ref(),
                input,
                source,
                encoding,
                options,
                cancel,
            )?;
            output.warnings.insert(
                0,
                format!("secondary codec used; primary cannot write {encoding}"),
            );
            output
        };

        if target == Format::Svg {
            output.bytes = svg::wrap_png(&output.bytes, output.width, output.height);
        }
        info!(
            codec = output.codec,
            width = output.width,
            height = output.height,
            bytes = output.bytes.len(),
            "Image pipeline complete"
        );
        Ok(output)
    }
}

fn run_codec(
    codec: &dyn ImageCodec,
    input: &[u8],
    source: Format,
    encoding: Format,
    options: &ImageOptions,
    cancel: &CancellationToken,
) -> Result<ImageOutput> {
    let mut warnings = Vec::new();

    cancel.check()?;
    let image = codec.decode(input, source)?;

    cancel.check()?;
    let image = codec.transform(image, options, &mut warnings)?;

    cancel.check()?;
    let bytes = codec.encode(&image, encoding, options, &mut warnings)?;
    if bytes.is_empty() {
        return Err(WandelError::EmptyOutput(format!(
            "{} codec produced no {} data",
            codec.name(),
            encoding
        )));
    }

    Ok(ImageOutput {
        bytes,
        width: image.width(),
        height: image.height(),
        codec: codec.name(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use wandelwerk_core::types::{Anchor, FitMode, WatermarkSpec};

    fn png(w: u32, h: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(rgba)))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// A codec that fails at decode, to force the secondary path.
    struct Broken;

    impl ImageCodec for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn can_encode(&self, _: Format) -> bool {
            true
        }
        fn decode(&self, _: &[u8], _: Format) -> Result<image::DynamicImage> {
            Err(WandelError::Decode("always broken".into()))
        }
        fn transform(
            &self,
            image: image::DynamicImage,
            _: &ImageOptions,
            _: &mut Vec<String>,
        ) -> Result<image::DynamicImage> {
            Ok(image)
        }
        fn encode(
            &self,
            _: &image::DynamicImage,
            _: Format,
            _: &ImageOptions,
            _: &mut Vec<String>,
        ) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn cover_yields_exact_dimensions() {
        let options = ImageOptions {
            width: Some(100),
            height: Some(100),
            fit: FitMode::Cover,
            ..ImageOptions::default()
        };
        let out = ImagePipeline::new()
            .run(
                &png(640, 360, [10, 200, 10, 255]),
                Format::Png,
                Format::Jpeg,
                &options,
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!((out.width, out.height), (100, 100));
        assert_eq!(out.codec, "primary");
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 100));
    }

    #[cfg(feature = "avif-decode")]
    #[test]
    fn avif_output_decodes_back_to_png() {
        let pipeline = ImagePipeline::new();
        let cancel = CancellationToken::new();
        let options = ImageOptions::default();
        let avif = pipeline
            .run(&png(24, 16, [30, 160, 90, 255]), Format::Png, Format::Avif, &options, &cancel)
            .unwrap();
        assert!(!avif.bytes.is_empty());

        let back = pipeline
            .run(&avif.bytes, Format::Avif, Format::Png, &options, &cancel)
            .unwrap();
        assert_eq!((back.width, back.height), (24, 16));
        let decoded = image::load_from_memory_with_format(&back.bytes, image::ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
    }

    #[test]
    fn gif_routes_to_secondary() {
        let out = ImagePipeline::new()
            .run(
                &png(16, 16, [1, 2, 3, 255]),
                Format::Png,
                Format::Gif,
                &ImageOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(out.codec, "software");
        assert!(out.warnings[0].contains("secondary codec used"));
        assert!(out.bytes.starts_with(b"GIF8"));
    }

    #[test]
    fn primary_failure_reruns_with_secondary() {
        let pipeline = ImagePipeline::with_codecs(Arc::new(Broken), Arc::new(SoftwareCodec));
        let out = pipeline
            .run(
                &png(8, 8, [0, 0, 0, 255]),
                Format::Png,
                Format::Png,
                &ImageOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();
        assert_eq!(out.codec, "software");
        assert!(out.warnings[0].contains("always broken"));
    }

    #[test]
    fn both_codecs_failing_reports_primary_error() {
        let pipeline = ImagePipeline::with_codecs(Arc::new(Broken), Arc::new(SoftwareCodec));
        let err = pipeline
            .run(
                b"not an image",
                Format::Png,
                Format::Png,
                &ImageOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("always broken"), "{err}");
    }

    #[test]
    fn cancelled_token_stops_before_decode() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ImagePipeline::new()
            .run(
                &png(4, 4, [0, 0, 0, 255]),
                Format::Png,
                Format::Webp,
                &ImageOptions::default(),
                &cancel,
            )
            .unwrap_err();
        assert!(matches!(err, WandelError::Cancelled));
    }

    #[test]
    fn watermark_is_anchored_after_resize() {
        let dir = tempfile::tempdir().unwrap();
        let mark = dir.path().join("mark.png");
        std::fs::write(&mark, png(10, 10, [255, 0, 0, 255])).unwrap();

        let options = ImageOptions {
            width: Some(100),
            height: Some(100),
            fit: FitMode::Fill,
            watermark: Some(WatermarkSpec {
                image: Some(mark),
                position: Anchor::BottomRight,
                opacity: 1.0,
                ..WatermarkSpec::default()
            }),
            ..ImageOptions::default()
        };
        let out = ImagePipeline::new()
            .run(
                &png(400, 300, [0, 0, 255, 255]),
                Format::Png,
                Format::Png,
                &options,
                &CancellationToken::new(),
            )
            .unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (100, 100));
        // 100 - 10 - 20 = 70: the mark covers 70..80 on the resized canvas.
        assert_eq!(decoded.get_pixel(75, 75).0, [255, 0, 0, 255]);
        let outside = decoded.get_pixel(90, 90).0;
        assert!(outside[0] < 5 && outside[2] > 250, "{outside:?}");
    }

    #[test]
    fn svg_target_wraps_png() {
        let out = ImagePipeline::new()
            .run(
                &png(6, 3, [9, 9, 9, 255]),
                Format::Png,
                Format::Svg,
                &ImageOptions::default(),
                &CancellationToken::new(),
            )
            .unwrap();
        let text = String::from_utf8(out.bytes).unwrap();
        assert!(text.contains("<svg"));
        assert!(text.contains("width=\"6\""));
    }
}
