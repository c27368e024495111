// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// wandelwerk-document: the pipelines behind the Wandelwerk conversion engine.
//
// Provides the text document pipeline (PDF, DOCX, HTML, Markdown, plain text),
// built-in PDF generation, HTML-to-PDF rendering through a headless browser,
// and the image pipeline (resize, effects, watermark, multi-codec encoding).

pub mod image;
pub mod pdf;
pub mod render;
pub mod text;

// Re-export the primary structs so callers can use `wandelwerk_document::PdfReader` etc.
pub use crate::image::{ImageOutput, ImagePipeline};
pub use pdf::reader::PdfReader;
pub use pdf::writer::{PageLayout, PdfWriter};
pub use render::{HtmlPdfRenderer, RenderedPdf};
pub use text::{IntermediateDocument, read_document, write_document};
