// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: fit-mode resizing and colour/effect adjustments for the
// primary codec. Operates on in-memory images using the `image` and
// `imageproc` crates.

use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage, imageops};
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, info, instrument};
use wandelwerk_core::types::Effects;

use super::geometry::ResizePlan;

/// Transform chain operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping
/// the transformed image, enabling method chaining.
///
/// ```ignore
/// let image = ImageProcessor::from_dynamic(decoded)
///     .fit(&plan, background)
///     .blur(1.5)
///     .grayscale()
///     .into_dynamic();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Geometry -------------------------------------------------------------

    /// Apply a resize plan. Uses Lanczos3 filtering for high-quality scaling.
    #[instrument(skip(self, plan), fields(from_w = self.width(), from_h = self.height()))]
    pub fn fit(self, plan: &ResizePlan, background: Rgba<u8>) -> Self {
        let (w, h) = plan.scaled;
        let mut image = self
            .image
            .resize_exact(w, h, imageops::FilterType::Lanczos3);

        if let Some((x, y, cw, ch)) = plan.crop {
            image = image.crop_imm(x, y, cw, ch);
        }

        if let Some(((canvas_w, canvas_h), (x, y))) = plan.canvas {
            let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, background);
            imageops::overlay(&mut canvas, &image.to_rgba8(), x as i64, y as i64);
            image = DynamicImage::ImageRgba8(canvas);
        }

        debug!(
            new_w = image.width(),
            new_h = image.height(),
            "Resize complete"
        );
        Self { image }
    }

    // -- Effects --------------------------------------------------------------

    /// Apply every requested effect in a fixed order: blur, sharpen,
    /// modulation, contrast, grayscale, sepia, invert.
    pub fn apply_effects(self, effects: &Effects) -> Self {
        let mut processor = self;
        if let Some(sigma) = effects.blur.filter(|s| *s > 0.0) {
            processor = processor.blur(sigma);
        }
        if let Some(sigma) = effects.sharpen.filter(|s| *s > 0.0) {
            processor = processor.sharpen(sigma);
        }
        if effects.brightness.is_some() || effects.saturation.is_some() || effects.hue.is_some() {
            processor = processor.modulate(
                effects.brightness.unwrap_or(1.0),
                effects.saturation.unwrap_or(1.0),
                effects.hue.unwrap_or(0.0),
            );
        }
        if let Some(factor) = effects.contrast {
            processor = processor.adjust_contrast(factor);
        }
        if effects.grayscale {
            processor = processor.grayscale();
        }
        if effects.sepia {
            processor = processor.sepia();
        }
        if effects.invert {
            processor = processor.invert();
        }
        processor
    }

    /// Gaussian blur with the given sigma.
    #[instrument(skip(self), fields(sigma))]
    pub fn blur(self, sigma: f32) -> Self {
        info!(sigma, "Blurring image");
        let blurred = gaussian_blur_f32(&self.image.to_rgba8(), sigma);
        Self {
            image: DynamicImage::ImageRgba8(blurred),
        }
    }

    /// Unsharp mask with the given sigma.
    #[instrument(skip(self), fields(sigma))]
    pub fn sharpen(self, sigma: f32) -> Self {
        info!(sigma, "Sharpening image");
        Self {
            image: self.image.unsharpen(sigma, 1),
        }
    }

    /// Multiply lightness and saturation and rotate hue (degrees), in HSV.
    #[instrument(skip(self), fields(brightness, saturation, hue))]
    pub fn modulate(self, brightness: f32, saturation: f32, hue: f32) -> Self {
        info!(brightness, saturation, hue, "Modulating colours");
        let brightness = brightness.max(0.0);
        let saturation = saturation.max(0.0);

        let rgba = self.image.to_rgba8();
        let modulated = ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (r, g, b) = hsv_to_rgb(
                (h + hue).rem_euclid(360.0),
                (s * saturation).clamp(0.0, 1.0),
                (v * brightness).clamp(0.0, 1.0),
            );
            Rgba([r, g, b, a])
        });
        Self {
            image: DynamicImage::ImageRgba8(modulated),
        }
    }

    /// Adjust contrast by a factor. Values > 1.0 increase contrast; values
    /// < 1.0 decrease it. A value of 1.0 is a no-op.
    #[instrument(skip(self), fields(factor))]
    pub fn adjust_contrast(self, factor: f32) -> Self {
        info!(factor, "Adjusting contrast");

        let rgba = self.image.to_rgba8();

        let contrasted = ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let pixel = rgba.get_pixel(x, y);
            let Rgba([r, g, b, a]) = *pixel;
            let adjust = |channel: u8| -> u8 {
                let val = factor * (channel as f32 - 128.0) + 128.0;
                val.clamp(0.0, 255.0) as u8
            };
            Rgba([adjust(r), adjust(g), adjust(b), a])
        });

        Self {
            image: DynamicImage::ImageRgba8(contrasted),
        }
    }

    /// Convert the image to grayscale, keeping any alpha channel.
    #[instrument(skip(self))]
    pub fn grayscale(self) -> Self {
        info!("Converting to grayscale");
        Self {
            image: DynamicImage::ImageLumaA8(self.image.to_luma_alpha8()),
        }
    }

    /// Classic sepia tone matrix.
    #[instrument(skip(self))]
    pub fn sepia(self) -> Self {
        info!("Applying sepia");
        let rgba = self.image.to_rgba8();
        let toned = ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let (r, g, b) = (r as f32, g as f32, b as f32);
            let channel = |v: f32| v.clamp(0.0, 255.0) as u8;
            Rgba([
                channel(0.393 * r + 0.769 * g + 0.189 * b),
                channel(0.349 * r + 0.686 * g + 0.168 * b),
                channel(0.272 * r + 0.534 * g + 0.131 * b),
                a,
            ])
        });
        Self {
            image: DynamicImage::ImageRgba8(toned),
        }
    }

    /// Invert colour channels; alpha is untouched.
    #[instrument(skip(self))]
    pub fn invert(mut self) -> Self {
        info!("Inverting colours");
        self.image.invert();
        self
    }
}

/// Composite an image with transparency onto an opaque background, for
/// formats without alpha.
pub fn flatten(image: &DynamicImage, background: Rgba<u8>) -> DynamicImage {
    if !image.color().has_alpha() {
        return image.clone();
    }
    let mut canvas = RgbaImage::from_pixel(
        image.width(),
        image.height(),
        Rgba([background.0[0], background.0[1], background.0[2], 255]),
    );
    imageops::overlay(&mut canvas, &image.to_rgba8(), 0, 0);
    DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };
    (hue, saturation, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_u8 = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (to_u8(r), to_u8(g), to_u8(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::geometry::plan_resize;
    use wandelwerk_core::types::FitMode;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(rgba)))
    }

    #[test]
    fn cover_produces_exact_box() {
        let plan = plan_resize((300, 120), Some(100), Some(100), FitMode::Cover).unwrap();
        let out = ImageProcessor::from_dynamic(solid(300, 120, [9, 9, 9, 255]))
            .fit(&plan, Rgba([255, 255, 255, 255]));
        assert_eq!((out.width(), out.height()), (100, 100));
    }

    #[test]
    fn contain_pads_with_background() {
        let plan = plan_resize((200, 100), Some(100), Some(100), FitMode::Contain).unwrap();
        let out = ImageProcessor::from_dynamic(solid(200, 100, [0, 0, 0, 255]))
            .fit(&plan, Rgba([255, 255, 255, 255]))
            .into_dynamic()
            .to_rgba8();
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(out.get_pixel(50, 5).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(50, 50).0, [0, 0, 0, 255]);
    }

    #[test]
    fn hsv_round_trip_is_stable() {
        for rgb in [(255, 0, 0), (12, 200, 99), (128, 128, 128), (0, 0, 0)] {
            let (h, s, v) = rgb_to_hsv(rgb.0, rgb.1, rgb.2);
            assert_eq!(hsv_to_rgb(h, s, v), rgb);
        }
    }

    #[test]
    fn hue_rotation_turns_red_green() {
        let out = ImageProcessor::from_dynamic(solid(2, 2, [255, 0, 0, 255]))
            .modulate(1.0, 1.0, 120.0)
            .into_dynamic()
            .to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn invert_and_sepia_touch_colour_only() {
        let out = ImageProcessor::from_dynamic(solid(1, 1, [10, 20, 30, 128]))
            .invert()
            .into_dynamic()
            .to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0, [245, 235, 225, 128]);

        let out = ImageProcessor::from_dynamic(solid(1, 1, [100, 100, 100, 77]))
            .sepia()
            .into_dynamic()
            .to_rgba8();
        let px = out.get_pixel(0, 0).0;
        assert!(px[0] > px[1] && px[1] > px[2]);
        assert_eq!(px[3], 77);
    }

    #[test]
    fn flatten_drops_alpha_onto_background() {
        let out = flatten(&solid(1, 1, [0, 0, 0, 0]), Rgba([255, 255, 255, 255]));
        assert_eq!(out.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    }
}
