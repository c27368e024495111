// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion matrix: the static policy table of legal (source, target) pairs.
//
// The table is built once on first use and never changes afterwards, so it is
// shared freely between threads.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::format::Format;

/// Raster formats the image pipeline can encode.
const RASTER_TARGETS: [Format; 7] = [
    Format::Jpeg,
    Format::Png,
    Format::Webp,
    Format::Avif,
    Format::Tiff,
    Format::Gif,
    Format::Bmp,
];

/// Image sources every build can decode.
const BASE_IMAGE_SOURCES: [Format; 7] = [
    Format::Jpeg,
    Format::Png,
    Format::Webp,
    Format::Tiff,
    Format::Gif,
    Format::Bmp,
    Format::Svg,
];

/// Formats the image pipeline can decode in this build. AVIF and HEIC
/// decoding link system libraries and are feature-gated.
fn image_sources() -> Vec<Format> {
    let mut sources = BASE_IMAGE_SOURCES.to_vec();
    if cfg!(feature = "avif-decode") {
        sources.push(Format::Avif);
    }
    if cfg!(feature = "heic") {
        sources.push(Format::Heic);
    }
    sources
}

static MATRIX: LazyLock<ConversionMatrix> = LazyLock::new(ConversionMatrix::build);

/// Read-only table mapping each source format to its permitted targets.
#[derive(Debug)]
pub struct ConversionMatrix {
    entries: BTreeMap<Format, Vec<Format>>,
}

impl ConversionMatrix {
    /// The process-wide matrix.
    pub fn global() -> &'static ConversionMatrix {
        &MATRIX
    }

    fn build() -> Self {
        let mut entries = BTreeMap::new();

        // Text family. PDF extraction is text-only, so PDF cannot feed DOCX.
        entries.insert(
            Format::Txt,
            vec![Format::Md, Format::Html, Format::Pdf, Format::Docx],
        );
        entries.insert(
            Format::Md,
            vec![Format::Txt, Format::Html, Format::Pdf, Format::Docx],
        );
        entries.insert(
            Format::Html,
            vec![Format::Txt, Format::Md, Format::Pdf, Format::Docx],
        );
        entries.insert(
            Format::Docx,
            vec![Format::Txt, Format::Md, Format::Html, Format::Pdf],
        );
        entries.insert(Format::Pdf, vec![Format::Txt, Format::Md, Format::Html]);

        // Image family: any decodable image to any raster target, an SVG
        // wrapper, or a single-page PDF.
        for source in image_sources() {
            let mut targets = RASTER_TARGETS.to_vec();
            targets.push(Format::Svg);
            targets.push(Format::Pdf);
            entries.insert(source, targets);
        }

        Self { entries }
    }

    /// Whether `source → target` is a legal conversion.
    pub fn is_allowed(&self, source: Format, target: Format) -> bool {
        self.allowed_targets(source).contains(&target)
    }

    /// Permitted targets for `source`; empty when the format is never a source.
    pub fn allowed_targets(&self, source: Format) -> &[Format] {
        self.entries
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every format that appears as a source.
    pub fn input_formats(&self) -> Vec<Format> {
        self.entries.keys().copied().collect()
    }

    /// Every format that appears as a target, deduplicated and sorted.
    pub fn output_formats(&self) -> Vec<Format> {
        let mut outputs: Vec<Format> = self.entries.values().flatten().copied().collect();
        outputs.sort();
        outputs.dedup();
        outputs
    }

    /// Whether `format` appears anywhere in the table.
    pub fn knows(&self, format: Format) -> bool {
        self.entries.contains_key(&format) || self.output_formats().contains(&format)
    }

    /// Iterate over `(source, targets)` rows in source order.
    pub fn entries(&self) -> impl Iterator<Item = (Format, &[Format])> {
        self.entries
            .iter()
            .map(|(source, targets)| (*source, targets.as_slice()))
    }
}
