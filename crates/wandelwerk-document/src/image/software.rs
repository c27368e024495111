// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Secondary image codec built only on `image::imageops` and the `image`
// crate's bundled encoders. It writes every raster format but honours fewer
// options than the primary codec.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, imageops};
use tracing::{debug, instrument, warn};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::Format;
use wandelwerk_core::types::{Effects, ImageOptions};

use super::codec::{ImageCodec, background, decode_raster, image_format};
use super::geometry::plan_resize;
use super::processor::flatten;
use super::{svg, watermark};

#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareCodec;

impl ImageCodec for SoftwareCodec {
    fn name(&self) -> &'static str {
        "software"
    }

    fn can_encode(&self, format: Format) -> bool {
        format.is_image() && !matches!(format, Format::Svg | Format::Heic)
    }

    fn decode(&self, data: &[u8], source: Format) -> Result<DynamicImage> {
        match source {
            Format::Svg => svg::rasterize_source(data).map(DynamicImage::ImageRgba8),
            Format::Heic => Err(WandelError::Decode(
                "software codec cannot decode HEIC".into(),
            )),
            other => decode_raster(data, other),
        }
    }

    #[instrument(skip_all)]
    fn transform(
        &self,
        image: DynamicImage,
        options: &ImageOptions,
        warnings: &mut Vec<String>,
    ) -> Result<DynamicImage> {
        let mut image = image;

        if let Some(plan) = plan_resize(
            (image.width(), image.height()),
            options.width,
            options.height,
            options.fit,
        ) {
            let (w, h) = plan.scaled;
            image = image.resize_exact(w, h, imageops::FilterType::Triangle);
            if let Some((x, y, cw, ch)) = plan.crop {
                image = image.crop_imm(x, y, cw, ch);
            }
            if let Some(((canvas_w, canvas_h), (x, y))) = plan.canvas {
                let mut canvas =
                    image::RgbaImage::from_pixel(canvas_w, canvas_h, background(options, warnings));
                imageops::overlay(&mut canvas, &image.to_rgba8(), x as i64, y as i64);
                image = DynamicImage::ImageRgba8(canvas);
            }
            debug!(w = image.width(), h = image.height(), "Resized");
        }

        image = apply_effects(image, &options.effects, warnings);

        match &options.watermark {
            Some(spec) => watermark::apply(image, spec),
            None => Ok(image),
        }
    }

    #[instrument(skip_all, fields(target = %target))]
    fn encode(
        &self,
        image: &DynamicImage,
        target: Format,
        options: &ImageOptions,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();

        if target == Format::Jpeg {
            let rgb = flatten(image, background(options, warnings)).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buffer, options.quality());
            rgb.write_with_encoder(encoder)
                .map_err(|err| WandelError::Encode(format!("JPEG encoding failed: {}", err)))?;
            return Ok(buffer);
        }

        if options.quality.is_some() && matches!(target, Format::Webp | Format::Avif | Format::Tiff)
        {
            warnings.push(format!("quality is ignored for {} by the software codec", target));
        }
        if options.progressive && target == Format::Png {
            warnings.push("progressive png is not supported; wrote baseline".into());
        }

        let format = image_format(target)?;
        // Several encoders have no luma+alpha layout.
        let pixels = match target {
            Format::Bmp => {
                DynamicImage::ImageRgb8(flatten(image, background(options, warnings)).to_rgb8())
            }
            _ => DynamicImage::ImageRgba8(image.to_rgba8()),
        };
        pixels
            .write_to(&mut Cursor::new(&mut buffer), format)
            .map_err(|err| WandelError::Encode(format!("{} encoding failed: {}", target, err)))?;
        Ok(buffer)
    }
}

fn apply_effects(
    image: DynamicImage,
    effects: &Effects,
    warnings: &mut Vec<String>,
) -> DynamicImage {
    let mut image = image;

    if let Some(sigma) = effects.blur.filter(|s| *s > 0.0) {
        image = image.blur(sigma);
    }
    if let Some(sigma) = effects.sharpen.filter(|s| *s > 0.0) {
        image = image.unsharpen(sigma, 1);
    }
    // Additive offset rather than a multiplier.
    if let Some(factor) = effects.brightness {
        image = image.brighten(((factor - 1.0) * 255.0).round() as i32);
    }
    if effects.saturation.is_some() {
        warn!("saturation not supported by the software codec");
        warnings.push("saturation is ignored by the software codec".into());
    }
    if let Some(degrees) = effects.hue {
        image = image.huerotate(degrees.round() as i32);
    }
    if let Some(factor) = effects.contrast {
        image = image.adjust_contrast((factor - 1.0) * 100.0);
    }
    if effects.grayscale {
        image = image.grayscale();
    }
    if effects.sepia {
        warn!("sepia not supported by the software codec");
        warnings.push("sepia is ignored by the software codec".into());
    }
    if effects.invert {
        image.invert();
    }
    image
}
