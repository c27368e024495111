// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SVG rasterisation with resvg, plus the SVG wrapper written for `svg`
// targets.

use std::sync::{Arc, OnceLock};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbaImage;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, fontdb};
use tracing::debug;
use wandelwerk_core::error::{Result, WandelError};

/// Rasterisation density for SVG sources, in dots per inch.
pub const SVG_DENSITY: f32 = 300.0;

/// CSS reference density that SVG user units are defined against.
const CSS_DPI: f32 = 96.0;

/// Upper bound on rasterised pixels; larger outputs are scaled down.
const MAX_PIXELS: f64 = 100_000_000.0;

static FONTS: OnceLock<Arc<fontdb::Database>> = OnceLock::new();

/// System fonts, loaded once per process.
fn fonts() -> Arc<fontdb::Database> {
    FONTS
        .get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            debug!(faces = db.len(), "font database loaded");
            Arc::new(db)
        })
        .clone()
}

/// Rasterise an SVG source at the fixed source density.
pub fn rasterize_source(data: &[u8]) -> Result<RgbaImage> {
    rasterize(data, SVG_DENSITY / CSS_DPI)
}

/// Rasterise `data` at `scale` times its intrinsic size.
pub fn rasterize(data: &[u8], scale: f32) -> Result<RgbaImage> {
    let mut options = usvg::Options::default();
    options.fontdb = fonts();

    let tree = usvg::Tree::from_data(data, &options)
        .map_err(|err| WandelError::Decode(format!("failed to parse SVG: {}", err)))?;

    let size = tree.size();
    let mut scale = scale;
    let pixels = (size.width() * scale) as f64 * (size.height() * scale) as f64;
    if pixels > MAX_PIXELS {
        scale *= (MAX_PIXELS / pixels).sqrt() as f32;
    }
    let width = ((size.width() * scale).ceil() as u32).max(1);
    let height = ((size.height() * scale).ceil() as u32).max(1);

    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        WandelError::Decode(format!("cannot allocate {}x{} SVG canvas", width, height))
    })?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha.
    let mut raw = Vec::with_capacity((width * height * 4) as usize);
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        raw.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    debug!(width, height, scale, "SVG rasterised");

    RgbaImage::from_raw(width, height, raw)
        .ok_or_else(|| WandelError::Decode("SVG raster buffer size mismatch".into()))
}

/// An SVG document embedding `png` at its pixel size.
pub fn wrap_png(png: &[u8], width: u32, height: u32) -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" \
         width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">\n\
         <image width=\"{width}\" height=\"{height}\" xlink:href=\"data:image/png;base64,{}\"/>\n\
         </svg>\n",
        BASE64.encode(png)
    )
    .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="96" height="48">
        <rect width="96" height="48" fill="#ff0000"/>
    </svg>"##;

    #[test]
    fn sources_rasterise_at_300_dpi() {
        let image = rasterize_source(SQUARE).unwrap();
        assert_eq!((image.width(), image.height()), (300, 150));
        assert_eq!(image.get_pixel(10, 10).0, [255, 0, 0, 255]);
    }

    #[test]
    fn malformed_svg_is_a_decode_error() {
        let result = rasterize(b"<svg", 1.0);
        assert!(matches!(result, Err(WandelError::Decode(_))));
    }

    #[test]
    fn wrapper_is_parseable_svg() {
        let wrapped = wrap_png(&[0x89, b'P', b'N', b'G'], 4, 2);
        let text = String::from_utf8(wrapped).unwrap();
        assert!(text.contains("viewBox=\"0 0 4 2\""));
        assert!(text.contains("data:image/png;base64,"));
    }
}
