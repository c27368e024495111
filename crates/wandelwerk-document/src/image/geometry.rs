// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pure geometry shared by both image codecs: resize planning for the fit
// modes, watermark anchoring, and colour parsing.

use image::Rgba;
use wandelwerk_core::types::{Anchor, FitMode};

/// Distance between a watermark and the canvas edge, in pixels.
pub const WATERMARK_MARGIN: u32 = 20;

/// How to turn a source of known size into the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    /// Size to scale the source to.
    pub scaled: (u32, u32),
    /// Centred crop applied after scaling: (x, y, width, height).
    pub crop: Option<(u32, u32, u32, u32)>,
    /// Letterbox canvas and the scaled image's offset on it.
    pub canvas: Option<((u32, u32), (u32, u32))>,
}

impl ResizePlan {
    /// Dimensions of the image after the plan is applied.
    pub fn output_size(&self) -> (u32, u32) {
        if let Some((size, _)) = self.canvas {
            return size;
        }
        if let Some((_, _, w, h)) = self.crop {
            return (w, h);
        }
        self.scaled
    }
}

/// Plan a resize of a `source` image. Returns `None` when neither dimension
/// is requested. A single dimension always keeps the aspect ratio.
pub fn plan_resize(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    fit: FitMode,
) -> Option<ResizePlan> {
    let (src_w, src_h) = (source.0.max(1) as f64, source.1.max(1) as f64);
    let scaled = |scale: f64| {
        (
            ((src_w * scale).round() as u32).max(1),
            ((src_h * scale).round() as u32).max(1),
        )
    };

    let (target_w, target_h) = match (width, height) {
        (None, None) => return None,
        (Some(w), None) => {
            return Some(ResizePlan {
                scaled: scaled(w.max(1) as f64 / src_w),
                crop: None,
                canvas: None,
            });
        }
        (None, Some(h)) => {
            return Some(ResizePlan {
                scaled: scaled(h.max(1) as f64 / src_h),
                crop: None,
                canvas: None,
            });
        }
        (Some(w), Some(h)) => (w.max(1), h.max(1)),
    };

    let scale_w = target_w as f64 / src_w;
    let scale_h = target_h as f64 / src_h;

    let plan = match fit {
        FitMode::Fill => ResizePlan {
            scaled: (target_w, target_h),
            crop: None,
            canvas: None,
        },
        FitMode::Cover => {
            let (w, h) = scaled(scale_w.max(scale_h));
            let (w, h) = (w.max(target_w), h.max(target_h));
            ResizePlan {
                scaled: (w, h),
                crop: Some(((w - target_w) / 2, (h - target_h) / 2, target_w, target_h)),
                canvas: None,
            }
        }
        FitMode::Contain => {
            let (w, h) = scaled(scale_w.min(scale_h));
            let (w, h) = (w.min(target_w), h.min(target_h));
            ResizePlan {
                scaled: (w, h),
                crop: None,
                canvas: Some(((target_w, target_h), ((target_w - w) / 2, (target_h - h) / 2))),
            }
        }
        FitMode::Inside => {
            let (w, h) = scaled(scale_w.min(scale_h));
            ResizePlan {
                scaled: (w.min(target_w), h.min(target_h)),
                crop: None,
                canvas: None,
            }
        }
        FitMode::Outside => {
            let (w, h) = scaled(scale_w.max(scale_h));
            ResizePlan {
                scaled: (w.max(target_w), h.max(target_h)),
                crop: None,
                canvas: None,
            }
        }
    };
    Some(plan)
}

/// Top-left position of an `overlay` anchored on a `canvas`. Offsets may be
/// negative when the overlay is larger than the canvas.
pub fn anchor_offset(canvas: (u32, u32), overlay: (u32, u32), anchor: Anchor) -> (i64, i64) {
    let (cw, ch) = (canvas.0 as i64, canvas.1 as i64);
    let (ow, oh) = (overlay.0 as i64, overlay.1 as i64);
    let m = WATERMARK_MARGIN as i64;
    match anchor {
        Anchor::TopLeft => (m, m),
        Anchor::TopRight => (cw - ow - m, m),
        Anchor::BottomLeft => (m, ch - oh - m),
        Anchor::BottomRight => (cw - ow - m, ch - oh - m),
        Anchor::Center => ((cw - ow) / 2, (ch - oh) / 2),
    }
}

/// Parse `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, or a handful of names.
pub fn parse_color(value: &str) -> Option<Rgba<u8>> {
    let value = value.trim().to_ascii_lowercase();
    let named = match value.as_str() {
        "white" => Some([255, 255, 255, 255]),
        "black" => Some([0, 0, 0, 255]),
        "transparent" => Some([0, 0, 0, 0]),
        "red" => Some([255, 0, 0, 255]),
        "green" => Some([0, 128, 0, 255]),
        "blue" => Some([0, 0, 255, 255]),
        "gray" | "grey" => Some([128, 128, 128, 255]),
        _ => None,
    };
    if let Some(rgba) = named {
        return Some(Rgba(rgba));
    }

    let hex = value.strip_prefix('#')?;
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    if !hex.is_ascii() {
        return None;
    }
    let rgba = match hex.len() {
        3 => [nibble(0)?, nibble(1)?, nibble(2)?, 255],
        4 => [nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?],
        6 => [byte(0)?, byte(2)?, byte(4)?, 255],
        8 => [byte(0)?, byte(2)?, byte(4)?, byte(6)?],
        _ => return None,
    };
    Some(Rgba(rgba))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_fills_the_box_exactly() {
        let plan = plan_resize((400, 200), Some(100), Some(100), FitMode::Cover).unwrap();
        assert_eq!(plan.scaled, (200, 100));
        assert_eq!(plan.crop, Some((50, 0, 100, 100)));
        assert_eq!(plan.output_size(), (100, 100));
    }

    #[test]
    fn contain_letterboxes_to_the_box() {
        let plan = plan_resize((400, 200), Some(100), Some(100), FitMode::Contain).unwrap();
        assert_eq!(plan.scaled, (100, 50));
        assert_eq!(plan.canvas, Some(((100, 100), (0, 25))));
        assert_eq!(plan.output_size(), (100, 100));
    }

    #[test]
    fn inside_and_outside_keep_aspect_ratio() {
        let inside = plan_resize((400, 200), Some(100), Some(100), FitMode::Inside).unwrap();
        assert_eq!(inside.output_size(), (100, 50));
        let outside = plan_resize((400, 200), Some(100), Some(100), FitMode::Outside).unwrap();
        assert_eq!(outside.output_size(), (200, 100));
    }

    #[test]
    fn fill_ignores_aspect_ratio() {
        let plan = plan_resize((400, 200), Some(30), Some(90), FitMode::Fill).unwrap();
        assert_eq!(plan.output_size(), (30, 90));
    }

    #[test]
    fn single_dimension_keeps_aspect_ratio() {
        let plan = plan_resize((400, 200), Some(100), None, FitMode::Fill).unwrap();
        assert_eq!(plan.output_size(), (100, 50));
        let plan = plan_resize((400, 200), None, Some(50), FitMode::Cover).unwrap();
        assert_eq!(plan.output_size(), (100, 50));
        assert!(plan_resize((400, 200), None, None, FitMode::Cover).is_none());
    }

    #[test]
    fn bottom_right_anchor_respects_margin() {
        assert_eq!(
            anchor_offset((200, 100), (40, 10), Anchor::BottomRight),
            (140, 70)
        );
        assert_eq!(anchor_offset((200, 100), (40, 10), Anchor::Center), (80, 45));
        assert_eq!(anchor_offset((200, 100), (40, 10), Anchor::TopLeft), (20, 20));
    }

    #[test]
    fn colours_parse() {
        assert_eq!(parse_color("#fff"), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_color("#10203040"), Some(Rgba([16, 32, 48, 64])));
        assert_eq!(parse_color("Black"), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("teal-ish"), None);
    }
}
