// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open existing PDF documents with `lopdf`, extract their text
// (pdf-extract first, lopdf's own extractor as fallback), metadata, and
// embedded JPEG images.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use lopdf::{Dictionary, Document, Object};
use tracing::{debug, info, instrument, warn};
use wandelwerk_core::error::{Result, WandelError};

use crate::text::ir::{DocumentMetadata, ExtractedAsset};

/// Reads an existing PDF file.
///
/// Keeps both the parsed `lopdf::Document` (structure, metadata, images) and
/// the raw bytes (handed to pdf-extract, which does its own parsing).
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Original file bytes.
    bytes: Vec<u8>,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let bytes = std::fs::read(path_ref)?;
        let mut reader = Self::from_bytes(bytes)?;
        reader.source_path = Some(path_ref.display().to_string());
        Ok(reader)
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let document = Document::load_mem(&bytes).map_err(|err| {
            WandelError::PdfError(format!("failed to load PDF: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            bytes,
            source_path: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the reader was created via [`PdfReader::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Page count plus `/Title` and `/Author` from the Info dictionary.
    /// Missing or malformed entries are left empty.
    pub fn metadata(&self) -> DocumentMetadata {
        let info = self.info_dictionary();
        let field = |key: &[u8]| {
            info.and_then(|dict| dict.get(key).ok())
                .and_then(|object| match object {
                    Object::String(raw, _) => Some(decode_pdf_string(raw)),
                    _ => None,
                })
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        DocumentMetadata {
            pages: Some(self.page_count() as u32),
            pages_estimated: false,
            title: field(b"Title"),
            author: field(b"Author"),
        }
    }

    fn info_dictionary(&self) -> Option<&Dictionary> {
        let entry = self.document.trailer.get(b"Info").ok()?;
        let (_, object) = self.document.dereference(entry).ok()?;
        object.as_dict().ok()
    }

    // -- Extraction -----------------------------------------------------------

    /// Extract the document's plain text. No layout is preserved.
    ///
    /// pdf-extract handles more font encodings but panics on some malformed
    /// inputs; panics and errors there fall back to lopdf's extractor.
    #[instrument(skip(self))]
    pub fn extract_text(&self) -> Result<String> {
        let bytes = &self.bytes;
        let primary = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(bytes)
        }));

        match primary {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                debug!(chars = text.len(), "text extracted with pdf-extract");
                return Ok(text);
            }
            Ok(Ok(_)) => debug!("pdf-extract returned no text, trying lopdf"),
            Ok(Err(err)) => warn!(%err, "pdf-extract failed, trying lopdf"),
            Err(_) => warn!("pdf-extract panicked, trying lopdf"),
        }

        let mut page_numbers: Vec<u32> = self.document.get_pages().keys().copied().collect();
        page_numbers.sort_unstable();
        let text = self.document.extract_text(&page_numbers).map_err(|err| {
            WandelError::PdfError(format!("failed to extract text: {}", err))
        })?;
        debug!(chars = text.len(), "text extracted with lopdf");
        Ok(text)
    }

    /// Embedded JPEG (`/DCTDecode`) image XObjects, in object order.
    ///
    /// Other image encodings are skipped: their streams are raw samples that
    /// would need re-encoding.
    pub fn extract_jpeg_images(&self) -> Vec<ExtractedAsset> {
        let mut assets = Vec::new();
        for ((number, _generation), object) in &self.document.objects {
            let Object::Stream(stream) = object else {
                continue;
            };
            let is_image = matches!(
                stream.dict.get(b"Subtype"),
                Ok(Object::Name(name)) if name.as_slice() == b"Image"
            );
            if !is_image || !has_filter(&stream.dict, b"DCTDecode") {
                continue;
            }
            assets.push(ExtractedAsset {
                name: format!("image_{:04}.jpg", number),
                bytes: stream.content.clone(),
            });
        }
        debug!(images = assets.len(), "JPEG images extracted");
        assets
    }
}

/// Whether `/Filter` names `filter`, either directly or within an array.
fn has_filter(dict: &Dictionary, filter: &[u8]) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => name.as_slice() == filter,
        Ok(Object::Array(filters)) => filters
            .iter()
            .any(|f| matches!(f, Object::Name(name) if name.as_slice() == filter)),
        _ => false,
    }
}

/// Decode a PDF text string: UTF-16BE with a byte-order mark, otherwise
/// treated as single-byte (PDFDocEncoding is a Latin-1 superset for text).
fn decode_pdf_string(raw: &[u8]) -> String {
    if let Some(utf16) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    raw.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::writer::{PageLayout, PdfWriter};

    #[test]
    fn generated_pdf_reports_page_count_and_text() {
        let mut writer = PdfWriter::new(PageLayout::default());
        writer.set_title("Fixture");
        let bytes = writer.create_from_text("Hello from page one").unwrap();

        let reader = PdfReader::from_bytes(bytes).unwrap();
        assert_eq!(reader.page_count(), 1);
        assert_eq!(reader.metadata().pages, Some(1));
        assert!(!reader.metadata().pages_estimated);

        let text = reader.extract_text().unwrap();
        assert!(text.contains("Hello"), "extracted: {text:?}");
    }

    #[test]
    fn garbage_is_a_pdf_error() {
        let result = PdfReader::from_bytes(b"%PDF-garbage".to_vec());
        assert!(matches!(result, Err(WandelError::PdfError(_))));
    }

    #[test]
    fn utf16_strings_decode() {
        let raw = [0xFE, 0xFF, 0x00, b'H', 0x00, b'i'];
        assert_eq!(decode_pdf_string(&raw), "Hi");
        assert_eq!(decode_pdf_string(b"Plain"), "Plain");
    }
}
