// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Write stage of the text pipeline: an `IntermediateDocument` into TXT, MD,
// HTML, or DOCX bytes. PDF output goes through the HTML renderer, fed by
// `pdf_source_html`.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::format::Format;
use wandelwerk_core::types::ConversionOptions;

use super::docx::write_docx;
use super::ir::{ExtractedAsset, IntermediateDocument};
use super::markup;

/// Serialise `doc` as `target`. PDF is not handled here.
#[instrument(skip_all, fields(%target))]
pub fn write_document(
    doc: &IntermediateDocument,
    target: Format,
    options: &ConversionOptions,
) -> Result<Vec<u8>> {
    let bytes = match target {
        Format::Txt => doc.text.clone().into_bytes(),
        Format::Md => doc.markdown_or_derived().into_bytes(),
        Format::Html => html_document(doc, options).into_bytes(),
        Format::Docx => write_docx(&doc.text)?,
        other => {
            return Err(WandelError::Encode(format!(
                "text writer cannot produce {}",
                other
            )));
        }
    };
    debug!(bytes = bytes.len(), "Document serialised");
    Ok(bytes)
}

/// Complete HTML document for `doc`, ready to save or render.
pub fn html_document(doc: &IntermediateDocument, options: &ConversionOptions) -> String {
    markup::wrap_document(
        &doc.html_or_derived(),
        doc.metadata.title.as_deref(),
        options.pdf_options.prefer_chinese_fonts,
    )
}

/// The HTML handed to the PDF renderer.
pub fn pdf_source_html(doc: &IntermediateDocument, options: &ConversionOptions) -> String {
    html_document(doc, options)
}

/// Write `bytes` to `path`, creating parent directories as needed.
pub fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Save extracted assets under `dir`, returning the written paths.
#[instrument(skip(assets), fields(dir = %dir.display(), count = assets.len()))]
pub fn save_assets(assets: &[ExtractedAsset], dir: &Path) -> Result<Vec<PathBuf>> {
    if assets.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(assets.len());
    for asset in assets {
        let path = dir.join(&asset.name);
        std::fs::write(&path, &asset.bytes)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_target_is_verbatim() {
        let doc = IntermediateDocument::from_text("Line one\nLine two\n");
        let bytes = write_document(&doc, Format::Txt, &ConversionOptions::default()).unwrap();
        assert_eq!(bytes, b"Line one\nLine two\n");
    }

    #[test]
    fn html_target_wraps_fragment_in_shell() {
        let mut doc = IntermediateDocument::from_text("ignored");
        doc.html = Some("<p>Body</p>".into());
        doc.metadata.title = Some("Report".into());
        let html = String::from_utf8(
            write_document(&doc, Format::Html, &ConversionOptions::default()).unwrap(),
        )
        .unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Report</title>"));
        assert!(html.contains("<p>Body</p>"));
    }

    #[test]
    fn pdf_is_not_a_writer_target() {
        let doc = IntermediateDocument::from_text("x");
        let result = write_document(&doc, Format::Pdf, &ConversionOptions::default());
        assert!(matches!(result, Err(WandelError::Encode(_))));
    }

    #[test]
    fn output_parents_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/out.txt");
        write_output(&path, b"hi").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hi");
    }

    #[test]
    fn assets_land_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let assets = vec![ExtractedAsset {
            name: "image1.png".into(),
            bytes: vec![1, 2, 3],
        }];
        let written = save_assets(&assets, &dir.path().join("media")).unwrap();
        assert_eq!(written, [dir.path().join("media/image1.png")]);
    }
}
