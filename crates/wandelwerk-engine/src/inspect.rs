// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File inspection: format, size, timestamps, and whatever metadata the
// format offers. Metadata that cannot be read is left out rather than
// failing the call.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::{Format, identify};
use wandelwerk_core::types::DocumentInfo;
use wandelwerk_document::PdfReader;
use wandelwerk_document::image::svg;
use wandelwerk_document::text::DocumentMetadata;
use wandelwerk_document::text::docx::{DocxReader, estimate_pages};
use wandelwerk_document::text::markup::html_title;

/// Describe the file at `path`. Blocking; run off the async executor.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn inspect_file(path: &Path) -> Result<DocumentInfo> {
    if !path.exists() {
        return Err(WandelError::InputMissing(path.to_path_buf()));
    }
    let meta = std::fs::metadata(path)?;
    let format = identify(path, None);

    let modified = meta.modified().ok();
    let created = meta.created().ok().or(modified);

    let mut info = DocumentInfo {
        format,
        size: meta.len(),
        pages: None,
        pages_estimated: false,
        title: None,
        author: None,
        dimensions: None,
        created: timestamp(created),
        modified: timestamp(modified),
    };

    match format {
        Format::Pdf | Format::Docx => match document_metadata(path, format) {
            Ok(metadata) => {
                info.pages = metadata.pages;
                info.pages_estimated = metadata.pages_estimated;
                info.title = metadata.title;
                info.author = metadata.author;
            }
            Err(err) => debug!(%err, "document metadata unavailable"),
        },
        Format::Html => {
            if let Ok(html) = std::fs::read_to_string(path) {
                info.title = html_title(&html);
            }
        }
        Format::Svg => match svg_size(path) {
            Ok(dimensions) => info.dimensions = Some(dimensions),
            Err(err) => debug!(%err, "SVG size unavailable"),
        },
        other if other.is_image() => match image::image_dimensions(path) {
            Ok(dimensions) => info.dimensions = Some(dimensions),
            Err(err) => debug!(%err, "image dimensions unavailable"),
        },
        _ => {}
    }

    Ok(info)
}

fn document_metadata(path: &Path, format: Format) -> Result<DocumentMetadata> {
    match format {
        Format::Pdf => Ok(PdfReader::open(path)?.metadata()),
        _ => {
            let data = std::fs::read(path)?;
            let content = DocxReader::from_bytes(data)?.read(false, false)?;
            Ok(DocumentMetadata {
                pages: Some(estimate_pages(&content.text)),
                pages_estimated: true,
                title: content.title,
                author: content.author,
            })
        }
    }
}

/// Intrinsic size of an SVG, in CSS pixels.
fn svg_size(path: &Path) -> Result<(u32, u32)> {
    let data = std::fs::read(path)?;
    Ok(svg::rasterize(&data, 1.0)?.dimensions())
}

fn timestamp(time: Option<SystemTime>) -> DateTime<Utc> {
    time.map(DateTime::<Utc>::from).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_input_missing() {
        let err = inspect_file(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, WandelError::InputMissing(_)));
    }

    #[test]
    fn png_reports_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pic.png");
        image::RgbImage::new(7, 3).save(&path).unwrap();

        let info = inspect_file(&path).unwrap();
        assert_eq!(info.format, Format::Png);
        assert_eq!(info.dimensions, Some((7, 3)));
        assert!(info.pages.is_none());
        assert!(info.size > 0);
    }

    #[test]
    fn corrupt_pdf_still_inspects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 garbage").unwrap();

        let info = inspect_file(&path).unwrap();
        assert_eq!(info.format, Format::Pdf);
        assert!(info.pages.is_none());
        assert!(info.title.is_none());
    }

    #[test]
    fn html_title_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<html><head><title>Quarterly</title></head></html>").unwrap();
        assert_eq!(inspect_file(&path).unwrap().title.as_deref(), Some("Quarterly"));
    }
}
