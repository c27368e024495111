// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark compositing. Text watermarks are drawn as SVG and rasterised;
// image watermarks are decoded from disk. Placement is computed against the
// canvas as it is when the watermark is applied, i.e. after resizing.

use image::{DynamicImage, RgbaImage, imageops};
use tracing::{debug, instrument};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::types::WatermarkSpec;

use super::geometry::anchor_offset;
use super::svg;
use crate::text::markup::escape_html;

/// Composite `spec` onto `image`. A spec with neither text nor image is a
/// no-op.
#[instrument(skip_all, fields(position = ?spec.position, opacity = spec.opacity))]
pub fn apply(image: DynamicImage, spec: &WatermarkSpec) -> Result<DynamicImage> {
    let Some(overlay) = build_overlay(spec, (image.width(), image.height()))? else {
        return Ok(image);
    };

    let mut canvas = image.to_rgba8();
    let (x, y) = anchor_offset(
        (canvas.width(), canvas.height()),
        (overlay.width(), overlay.height()),
        spec.position,
    );
    debug!(
        x,
        y,
        overlay_w = overlay.width(),
        overlay_h = overlay.height(),
        "Compositing watermark"
    );
    imageops::overlay(&mut canvas, &overlay, x, y);
    Ok(DynamicImage::ImageRgba8(canvas))
}

fn build_overlay(spec: &WatermarkSpec, canvas: (u32, u32)) -> Result<Option<RgbaImage>> {
    let opacity = spec.opacity.clamp(0.0, 1.0);

    let mut overlay = if let Some(text) = spec.text.as_deref().filter(|t| !t.is_empty()) {
        svg::rasterize(text_svg(text, spec).as_bytes(), 1.0)?
    } else if let Some(path) = &spec.image {
        let mark = image::open(path).map_err(|err| {
            WandelError::ImageError(format!(
                "failed to open watermark {}: {}",
                path.display(),
                err
            ))
        })?;
        // Never larger than the canvas.
        let mark = if mark.width() > canvas.0 || mark.height() > canvas.1 {
            mark.resize(canvas.0, canvas.1, imageops::FilterType::Lanczos3)
        } else {
            mark
        };
        mark.to_rgba8()
    } else {
        return Ok(None);
    };

    if opacity < 1.0 {
        for pixel in overlay.pixels_mut() {
            pixel.0[3] = (pixel.0[3] as f32 * opacity).round() as u8;
        }
    }
    Ok(Some(overlay))
}

/// SVG markup for a single line of watermark text.
fn text_svg(text: &str, spec: &WatermarkSpec) -> String {
    let size = spec.font_size.max(1) as f32;
    let width = (text.chars().count() as f32 * size * 0.6 + size).ceil() as u32;
    let height = (size * 1.4).ceil() as u32;
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\">\
         <text x=\"{x}\" y=\"{y}\" font-family=\"sans-serif\" font-size=\"{size}\" \
         fill=\"{color}\">{text}</text></svg>",
        x = size / 2.0,
        y = size,
        color = escape_html(&spec.color),
        text = escape_html(text),
    )
}
