// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Read stage of the text pipeline: any text-family source into an
// `IntermediateDocument`.

use std::path::Path;

use tracing::{debug, info, instrument};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::Format;
use wandelwerk_core::types::ConversionOptions;

use super::docx::{DocxReader, estimate_pages};
use super::ir::{DocumentMetadata, IntermediateDocument};
use super::markup;
use crate::pdf::PdfReader;

/// Read `path` (already identified as `format`) into an intermediate document.
#[instrument(skip_all, fields(path = %path.as_ref().display(), %format))]
pub fn read_document(
    path: impl AsRef<Path>,
    format: Format,
    options: &ConversionOptions,
) -> Result<IntermediateDocument> {
    let path = path.as_ref();
    info!("Reading source document");

    let doc = match format {
        Format::Pdf => read_pdf(path, options)?,
        Format::Docx => read_docx(path, options)?,
        Format::Html => read_html(path)?,
        Format::Md => {
            let source = read_lossy(path)?;
            IntermediateDocument {
                markdown: Some(source.clone()),
                text: source,
                ..IntermediateDocument::default()
            }
        }
        Format::Txt => IntermediateDocument::from_text(read_lossy(path)?),
        other => return Err(WandelError::UnsupportedFormat(other.to_string())),
    };

    debug!(
        chars = doc.text.len(),
        html = doc.html.is_some(),
        markdown = doc.markdown.is_some(),
        assets = doc.assets.len(),
        "Source document read"
    );
    Ok(doc)
}

/// Read a text file, replacing invalid UTF-8 rather than failing.
fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    })
}

fn read_pdf(path: &Path, options: &ConversionOptions) -> Result<IntermediateDocument> {
    let reader = PdfReader::open(path)?;
    let text = reader.extract_text()?;
    let assets = if options.extract_images {
        reader.extract_jpeg_images()
    } else {
        Vec::new()
    };
    Ok(IntermediateDocument {
        text,
        metadata: reader.metadata(),
        assets,
        ..IntermediateDocument::default()
    })
}

fn read_docx(path: &Path, options: &ConversionOptions) -> Result<IntermediateDocument> {
    let bytes = std::fs::read(path)?;
    let mut reader = DocxReader::from_bytes(bytes)?;
    let content = reader.read(options.preserve_formatting, options.extract_images)?;

    let metadata = DocumentMetadata {
        pages: Some(estimate_pages(&content.text)),
        pages_estimated: true,
        title: content.title,
        author: content.author,
    };
    Ok(IntermediateDocument {
        text: content.text,
        html: content.html,
        markdown: None,
        metadata,
        assets: content.media,
    })
}

fn read_html(path: &Path) -> Result<IntermediateDocument> {
    let html = read_lossy(path)?;
    let metadata = DocumentMetadata {
        title: markup::html_title(&html),
        ..DocumentMetadata::default()
    };
    Ok(IntermediateDocument {
        text: markup::html_to_text(&html),
        html: Some(html),
        markdown: None,
        metadata,
        assets: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_source_keeps_its_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Notes\n\n- one\n- two\n").unwrap();

        let doc = read_document(&path, Format::Md, &ConversionOptions::default()).unwrap();
        assert_eq!(doc.markdown.as_deref(), Some("# Notes\n\n- one\n- two\n"));
        assert!(doc.html_or_derived().contains("<li>one</li>"));
    }

    #[test]
    fn html_source_yields_title_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(
            &path,
            "<html><head><title>Menu</title></head><body><p>Soup of the day</p></body></html>",
        )
        .unwrap();

        let doc = read_document(&path, Format::Html, &ConversionOptions::default()).unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("Menu"));
        assert!(doc.text.contains("Soup of the day"));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.txt");
        std::fs::write(&path, [b'c', b'a', b'f', 0xE9]).unwrap();

        let doc = read_document(&path, Format::Txt, &ConversionOptions::default()).unwrap();
        assert!(doc.text.starts_with("caf"));
    }

    #[test]
    fn image_formats_are_rejected() {
        let result = read_document("/tmp/x.png", Format::Png, &ConversionOptions::default());
        assert!(matches!(result, Err(WandelError::UnsupportedFormat(_))));
    }
}
