// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Primary image codec: `image` + `imageproc` for pixels, libwebp for WebP,
// rav1e (through `image`) for AVIF output and dav1d for AVIF input under the
// `avif-decode` feature, resvg for SVG sources, and libheif for HEIC under `heic`.

use std::io::Cursor;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, instrument};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::Format;
use wandelwerk_core::types::ImageOptions;

use super::codec::{ImageCodec, background, decode_raster};
use super::geometry::plan_resize;
use super::processor::{ImageProcessor, flatten};
use super::{svg, watermark};

/// Full-featured codec. Does not write GIF or BMP.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryCodec;

impl ImageCodec for PrimaryCodec {
    fn name(&self) -> &'static str {
        "primary"
    }

    fn can_encode(&self, format: Format) -> bool {
        matches!(
            format,
            Format::Jpeg | Format::Png | Format::Webp | Format::Avif | Format::Tiff
        )
    }

    #[instrument(skip_all, fields(source = %source, bytes = data.len()))]
    fn decode(&self, data: &[u8], source: Format) -> Result<DynamicImage> {
        match source {
            Format::Svg => svg::rasterize_source(data).map(DynamicImage::ImageRgba8),
            Format::Heic => decode_heic(data),
            other => decode_raster(data, other),
        }
    }

    fn transform(
        &self,
        image: DynamicImage,
        options: &ImageOptions,
        warnings: &mut Vec<String>,
    ) -> Result<DynamicImage> {
        let mut processor = ImageProcessor::from_dynamic(image);

        if let Some(plan) = plan_resize(
            (processor.width(), processor.height()),
            options.width,
            options.height,
            options.fit,
        ) {
            processor = processor.fit(&plan, background(options, warnings));
        }

        let image = processor.apply_effects(&options.effects).into_dynamic();

        match &options.watermark {
            Some(spec) => watermark::apply(image, spec),
            None => Ok(image),
        }
    }

    #[instrument(skip_all, fields(target = %target, w = image.width(), h = image.height()))]
    fn encode(
        &self,
        image: &DynamicImage,
        target: Format,
        options: &ImageOptions,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<u8>> {
        if options.progressive && matches!(target, Format::Jpeg | Format::Png) {
            warnings.push(format!(
                "progressive {} is not supported; wrote baseline",
                target
            ));
        }

        let mut buffer = Vec::new();
        match target {
            Format::Jpeg => {
                let rgb = flatten(image, background(options, warnings)).to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut buffer, options.quality());
                rgb.write_with_encoder(encoder).map_err(|err| {
                    WandelError::Encode(format!("JPEG encoding failed: {}", err))
                })?;
            }
            Format::Png => {
                let compression = match options.effort() {
                    0..=2 => CompressionType::Fast,
                    3..=6 => CompressionType::Default,
                    _ => CompressionType::Best,
                };
                let encoder =
                    PngEncoder::new_with_quality(&mut buffer, compression, FilterType::Adaptive);
                image.write_with_encoder(encoder).map_err(|err| {
                    WandelError::Encode(format!("PNG encoding failed: {}", err))
                })?;
            }
            Format::Webp => buffer = encode_webp(image, options)?,
            Format::Avif => {
                let speed = 10u8.saturating_sub(options.effort()).clamp(1, 10);
                let quality = if options.lossless {
                    100
                } else {
                    options.quality()
                };
                let encoder = AvifEncoder::new_with_speed_quality(&mut buffer, speed, quality);
                image.to_rgba8().write_with_encoder(encoder).map_err(|err| {
                    WandelError::Encode(format!("AVIF encoding failed: {}", err))
                })?;
            }
            Format::Tiff => {
                // The TIFF encoder has no luma+alpha layout.
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Tiff)
                    .map_err(|err| WandelError::Encode(format!("TIFF encoding failed: {}", err)))?;
            }
            other => {
                return Err(WandelError::Encode(format!(
                    "primary codec cannot write {}",
                    other
                )));
            }
        }

        debug!(bytes = buffer.len(), "Encoded");
        Ok(buffer)
    }
}

fn encode_webp(image: &DynamicImage, options: &ImageOptions) -> Result<Vec<u8>> {
    let rgba = image.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());

    let mut config = webp::WebPConfig::new()
        .map_err(|_| WandelError::Encode("failed to initialise WebP config".into()))?;
    config.lossless = i32::from(options.lossless);
    config.quality = f32::from(options.quality());
    config.method = i32::from(options.effort().min(6));

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|err| WandelError::Encode(format!("WebP encoding failed: {:?}", err)))?;
    Ok(memory.to_vec())
}

#[cfg(feature = "heic")]
fn decode_heic(data: &[u8]) -> Result<DynamicImage> {
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib = LibHeif::new();
    let context = HeifContext::read_from_bytes(data)
        .map_err(|err| WandelError::Decode(format!("failed to read HEIC: {}", err)))?;
    let handle = context
        .primary_image_handle()
        .map_err(|err| WandelError::Decode(format!("HEIC has no primary image: {}", err)))?;
    let decoded = lib
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgba), None)
        .map_err(|err| WandelError::Decode(format!("failed to decode HEIC: {}", err)))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| WandelError::Decode("HEIC decode produced no interleaved plane".into()))?;

    // Rows may be padded past width * 4.
    let row = plane.width as usize * 4;
    let mut raw = Vec::with_capacity(row * plane.height as usize);
    for line in plane.data.chunks(plane.stride).take(plane.height as usize) {
        raw.extend_from_slice(&line[..row]);
    }
    image::RgbaImage::from_raw(plane.width, plane.height, raw)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| WandelError::Decode("HEIC buffer size mismatch".into()))
}

#[cfg(not(feature = "heic"))]
fn decode_heic(_data: &[u8]) -> Result<DynamicImage> {
    Err(WandelError::Decode(
        "HEIC decoding requires the `heic` feature".into(),
    ))
}
