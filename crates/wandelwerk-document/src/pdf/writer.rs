// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: create new PDF documents from text or images using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, XObjectTransform,
};
use ::image::{DynamicImage, RgbImage, Rgba};
use tracing::{debug, info, instrument};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::types::PdfOptions;

use crate::image::processor::flatten;

/// Page geometry and running header/footer for generated PDFs.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    /// Top, right, bottom, left.
    pub margins_mm: [f32; 4],
    /// Multiplies the body font size.
    pub scale: f32,
    /// `{page}` and `{pages}` are substituted per page.
    pub header: Option<String>,
    pub footer: Option<String>,
}

impl Default for PageLayout {
    /// A4 portrait with 20mm margins.
    fn default() -> Self {
        Self::from_options(&PdfOptions::default())
    }
}

impl PageLayout {
    pub fn from_options(options: &PdfOptions) -> Self {
        let (width_mm, height_mm) = options.page_mm();
        Self {
            width_mm,
            height_mm,
            margins_mm: options.margin.to_mm(),
            scale: options.clamped_scale(),
            header: options.header.clone(),
            footer: options.footer.clone(),
        }
    }

    /// Paper dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        (Mm(self.width_mm), Mm(self.height_mm))
    }
}

/// Creates new PDF documents from text content or raster images.
///
/// Uses `printpdf` 0.8 for generation. This is the built-in layout path: no
/// browser, Helvetica only, no HTML styling.
pub struct PdfWriter {
    layout: PageLayout,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl PdfWriter {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            layout,
            title: None,
        }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    // -- Text to PDF ----------------------------------------------------------

    /// Create a PDF from plain text content.
    ///
    /// The text is laid out in a simple top-to-bottom flow using the built-in
    /// Helvetica font. Long lines are wrapped at an estimated character width
    /// and pages break automatically.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn create_from_text(&self, text: &str) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.layout.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Document");
        let [margin_top, margin_right, margin_bottom, margin_left] = self.layout.margins_mm;

        info!(
            width_mm = self.layout.width_mm,
            height_mm = self.layout.height_mm,
            title,
            "Creating text PDF"
        );

        let font_size_pt: f32 = 11.0 * self.layout.scale;
        let line_height_pt: f32 = font_size_pt * 14.0 / 11.0;
        let usable_width_mm = (page_w.0 - margin_left - margin_right).max(10.0);

        // Approximate characters per line based on Helvetica.
        // Average Helvetica glyph width is roughly 0.50 * font_size in pt,
        // converted to mm (1pt = 0.3528mm).
        let avg_char_width_mm: f32 = 0.50 * font_size_pt * 0.3528;
        let max_chars_per_line = ((usable_width_mm / avg_char_width_mm) as usize).max(1);

        let wrapped_lines = wrap_text(text, max_chars_per_line);
        let page_h_pt = page_h.into_pt().0;
        let top_pt = Mm(margin_top).into_pt().0;
        let bottom_pt = Mm(margin_bottom).into_pt().0;
        let left_pt = Mm(margin_left).into_pt().0;
        let usable_height_pt = page_h_pt - top_pt - bottom_pt;
        let lines_per_page = ((usable_height_pt / line_height_pt) as usize).max(1);

        let chunks: Vec<&[String]> = if wrapped_lines.is_empty() {
            // A single blank page.
            vec![&wrapped_lines[..]]
        } else {
            wrapped_lines.chunks(lines_per_page).collect()
        };
        let total_pages = chunks.len();

        let mut doc = PdfDocument::new(title);
        let mut pages: Vec<PdfPage> = Vec::with_capacity(total_pages);

        for (page_index, chunk) in chunks.iter().enumerate() {
            let mut ops: Vec<Op> = Vec::new();

            for (line_idx, line) in chunk.iter().enumerate() {
                // Position: top-left of the page, moving downward.
                let y_pt = page_h_pt - top_pt - font_size_pt - (line_idx as f32 * line_height_pt);
                push_text(&mut ops, line, left_pt, y_pt, font_size_pt);
            }

            let page_number = page_index + 1;
            if let Some(header) = &self.layout.header {
                let line = substitute_page_numbers(header, page_number, total_pages);
                push_text(&mut ops, &line, left_pt, page_h_pt - top_pt / 2.0, 9.0);
            }
            if let Some(footer) = &self.layout.footer {
                let line = substitute_page_numbers(footer, page_number, total_pages);
                push_text(&mut ops, &line, left_pt, bottom_pt / 2.0, 9.0);
            }

            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        doc.with_pages(pages);

        debug!(
            total_lines = wrapped_lines.len(),
            pages = doc.pages.len(),
            "Text layout complete"
        );

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);

        Ok(output)
    }

    // -- Image to PDF ---------------------------------------------------------

    /// Create a single-page PDF containing the given image.
    ///
    /// The image is scaled to fit within the page margins while preserving its
    /// aspect ratio.
    #[instrument(skip(self, image_bytes), fields(bytes_len = image_bytes.len()))]
    pub fn create_from_image(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.layout.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Image");
        let [margin_top, margin_right, margin_bottom, margin_left] = self.layout.margins_mm;

        info!(
            width_mm = self.layout.width_mm,
            height_mm = self.layout.height_mm,
            title,
            "Creating image PDF"
        );

        // Decode the image to get its dimensions and pixel data.
        let dynamic_image = ::image::load_from_memory(image_bytes).map_err(|err| {
            WandelError::ImageError(format!("failed to decode image for PDF: {}", err))
        })?;

        let img_width = dynamic_image.width() as usize;
        let img_height = dynamic_image.height() as usize;

        let rgb_image = page_pixels(&dynamic_image);
        let raw = RawImage {
            pixels: RawImageData::U8(rgb_image.into_raw()),
            width: img_width,
            height: img_height,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new(title);
        let xobject_id = doc.add_image(&raw);

        let usable_w_pt = Mm((page_w.0 - margin_left - margin_right).max(10.0))
            .into_pt()
            .0;
        let usable_h_pt = Mm((page_h.0 - margin_top - margin_bottom).max(10.0))
            .into_pt()
            .0;

        // Image native size at a default DPI of 150 (reasonable for print).
        let dpi: f32 = 150.0;
        let img_w_pt = img_width as f32 / dpi * 72.0;
        let img_h_pt = img_height as f32 / dpi * 72.0;

        // Scale to fit while preserving aspect ratio; do not upscale.
        let scale_x = usable_w_pt / img_w_pt;
        let scale_y = usable_h_pt / img_h_pt;
        let scale = scale_x.min(scale_y).min(1.0);

        let rendered_w_pt = img_w_pt * scale;
        let rendered_h_pt = img_h_pt * scale;

        // Centre the image within the margins.
        let x_offset = Mm(margin_left).into_pt().0 + (usable_w_pt - rendered_w_pt) / 2.0;
        let y_offset = Mm(margin_bottom).into_pt().0 + (usable_h_pt - rendered_h_pt) / 2.0;

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(x_offset)),
                translate_y: Some(Pt(y_offset)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(dpi),
                rotate: None,
            },
        }];

        let page = PdfPage::new(page_w, page_h, ops);
        doc.with_pages(vec![page]);

        debug!(rendered_w_pt, rendered_h_pt, scale, "Image placed on page");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);

        Ok(output)
    }
}

fn push_text(ops: &mut Vec<Op>, line: &str, x_pt: f32, y_pt: f32, size_pt: f32) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point {
            x: Pt(x_pt),
            y: Pt(y_pt),
        },
    });
    ops.push(Op::SetFontSizeBuiltinFont {
        size: Pt(size_pt),
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(line.to_string())],
        font: BuiltinFont::Helvetica,
    });
    ops.push(Op::EndTextSection);
}

/// Replace `{page}` and `{pages}` in a header/footer template.
pub fn substitute_page_numbers(template: &str, page: usize, pages: usize) -> String {
    template
        .replace("{pages}", &pages.to_string())
        .replace("{page}", &page.to_string())
}

// -- Text wrapping helper -----------------------------------------------------

/// Wrap a multi-line string so that no line exceeds `max_width` characters.
///
/// Splits on existing newlines first, then performs simple word-wrap within each
/// paragraph. Words longer than `max_width` are force-broken on character
/// boundaries.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.lines() {
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current_line = String::with_capacity(max_width);
        let mut current_len = 0usize;

        for word in words {
            let word_len = word.chars().count();
            if word_len > max_width {
                // Flush any accumulated line.
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                // Force-break the oversized word.
                let chars: Vec<char> = word.chars().collect();
                let mut pieces = chars.chunks(max_width).peekable();
                while let Some(piece) = pieces.next() {
                    let piece: String = piece.iter().collect();
                    if pieces.peek().is_some() {
                        result.push(piece);
                    } else {
                        current_len = piece.chars().count();
                        current_line = piece;
                    }
                }
            } else if current_line.is_empty() {
                current_line.push_str(word);
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
                current_len += 1 + word_len;
            } else {
                result.push(std::mem::take(&mut current_line));
                current_line.push_str(word);
                current_len = word_len;
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    result
}

/// RGB8 pixels for embedding. printpdf gets no alpha channel, so
/// transparency is composited onto white paper first.
fn page_pixels(image: &DynamicImage) -> RgbImage {
    flatten(image, Rgba([255, 255, 255, 255])).to_rgb8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wandelwerk_core::types::PaperSize;

    #[test]
    fn long_words_are_force_broken() {
        let lines = wrap_text("abcdefghij xy", 4);
        assert_eq!(lines, ["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn wrapping_counts_characters_not_bytes() {
        let lines = wrap_text("äöü äöü", 7);
        assert_eq!(lines, ["äöü äöü"]);
    }

    #[test]
    fn blank_lines_are_kept() {
        assert_eq!(wrap_text("a\n\nb", 10), ["a", "", "b"]);
    }

    #[test]
    fn page_numbers_substitute() {
        assert_eq!(
            substitute_page_numbers("Page {page} of {pages}", 2, 5),
            "Page 2 of 5"
        );
    }

    #[test]
    fn layout_honours_landscape_letter() {
        let options = PdfOptions {
            format: PaperSize::Letter,
            landscape: true,
            ..PdfOptions::default()
        };
        let layout = PageLayout::from_options(&options);
        assert_eq!((layout.width_mm, layout.height_mm), (279.0, 216.0));
    }

    #[test]
    fn long_text_paginates() {
        let writer = PdfWriter::new(PageLayout::default());
        let text = "line\n".repeat(400);
        let bytes = writer.create_from_text(&text).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn image_pdf_has_one_page() {
        let img = image::RgbImage::from_pixel(40, 20, image::Rgb([200, 10, 10]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let bytes = PdfWriter::new(PageLayout::default())
            .create_from_image(&png)
            .unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn transparent_pixels_land_on_white_paper() {
        let mut img = image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 0]));
        img.put_pixel(0, 0, image::Rgba([10, 20, 200, 255]));
        let pixels = page_pixels(&image::DynamicImage::ImageRgba8(img));
        assert_eq!(pixels.get_pixel(3, 3).0, [255, 255, 255]);
        assert_eq!(pixels.get_pixel(0, 0).0, [10, 20, 200]);
    }

    #[test]
    fn transparent_png_still_embeds() {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([0, 0, 0, 0]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let bytes = PdfWriter::new(PageLayout::default())
            .create_from_image(&png)
            .unwrap();
        assert_eq!(lopdf::Document::load_mem(&bytes).unwrap().get_pages().len(), 1);
    }
}
