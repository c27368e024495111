// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The codec seam of the image pipeline. A codec owns all three stages
// (decode, transform, encode) so a failing codec can be swapped out for the
// whole run.

use image::{DynamicImage, ImageFormat, Rgba};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::Format;
use wandelwerk_core::types::ImageOptions;

use super::geometry::parse_color;

/// One image backend.
pub trait ImageCodec: Send + Sync {
    /// Short name reported as the result's producer.
    fn name(&self) -> &'static str;

    /// Whether this codec can write `format` at all.
    fn can_encode(&self, format: Format) -> bool;

    /// Decode `data`, which was identified as `source`.
    fn decode(&self, data: &[u8], source: Format) -> Result<DynamicImage>;

    /// Resize, effects, and watermark, in that order. Features the codec
    /// cannot honour are recorded in `warnings`.
    fn transform(
        &self,
        image: DynamicImage,
        options: &ImageOptions,
        warnings: &mut Vec<String>,
    ) -> Result<DynamicImage>;

    /// Encode into `target`, a raster format.
    fn encode(
        &self,
        image: &DynamicImage,
        target: Format,
        options: &ImageOptions,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<u8>>;
}

/// Background used for letterboxing and alpha flattening: the requested
/// colour, or opaque white.
pub(crate) fn background(options: &ImageOptions, warnings: &mut Vec<String>) -> Rgba<u8> {
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    match options.background.as_deref() {
        None => WHITE,
        Some(value) => parse_color(value).unwrap_or_else(|| {
            warnings.push(format!("unrecognised background colour {value:?}; using white"));
            WHITE
        }),
    }
}

/// The `image` crate's name for a format tag, for formats it can decode.
pub(crate) fn image_format(format: Format) -> Result<ImageFormat> {
    match format {
        Format::Jpeg => Ok(ImageFormat::Jpeg),
        Format::Png => Ok(ImageFormat::Png),
        Format::Webp => Ok(ImageFormat::WebP),
        Format::Avif => Ok(ImageFormat::Avif),
        Format::Tiff => Ok(ImageFormat::Tiff),
        Format::Gif => Ok(ImageFormat::Gif),
        Format::Bmp => Ok(ImageFormat::Bmp),
        other => Err(WandelError::UnsupportedFormat(format!(
            "{} is not a raster format",
            other
        ))),
    }
}

/// Decode a raster with the `image` crate.
pub(crate) fn decode_raster(data: &[u8], source: Format) -> Result<DynamicImage> {
    let format = image_format(source)?;
    image::load_from_memory_with_format(data, format)
        .map_err(|err| WandelError::Decode(format!("failed to decode {}: {}", source, err)))
}
