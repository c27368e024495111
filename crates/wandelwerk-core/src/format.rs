// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format tags and the format identifier.
//
// Identification is deliberately permissive: extension first, then the
// content-type hint, then a sniff of the leading bytes, and finally plain text.
// Strict validation happens on targets (`Format::from_str`) and in the
// conversion matrix.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WandelError;

/// Canonical conversion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Docx,
    Html,
    Md,
    Txt,
    Jpeg,
    Png,
    Webp,
    Avif,
    Tiff,
    Gif,
    Bmp,
    Svg,
    Heic,
}

/// Broad family a format belongs to; decides which pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFamily {
    Text,
    Image,
}

impl Format {
    /// Every known format, in display order.
    pub const ALL: [Format; 14] = [
        Self::Pdf,
        Self::Docx,
        Self::Html,
        Self::Md,
        Self::Txt,
        Self::Jpeg,
        Self::Png,
        Self::Webp,
        Self::Avif,
        Self::Tiff,
        Self::Gif,
        Self::Bmp,
        Self::Svg,
        Self::Heic,
    ];

    /// Canonical lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Html => "html",
            Self::Md => "md",
            Self::Txt => "txt",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Avif => "avif",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Svg => "svg",
            Self::Heic => "heic",
        }
    }

    /// File extension written for outputs of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            other => other.as_str(),
        }
    }

    /// MIME type, used for data URIs and content-type hints.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Html => "text/html",
            Self::Md => "text/markdown",
            Self::Txt => "text/plain",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Avif => "image/avif",
            Self::Tiff => "image/tiff",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Svg => "image/svg+xml",
            Self::Heic => "image/heic",
        }
    }

    /// Whether the format is handled by the text or the image pipeline.
    ///
    /// `Pdf` belongs to the text family as a source; as a target it is reached
    /// from both families.
    pub fn family(&self) -> FormatFamily {
        match self {
            Self::Pdf | Self::Docx | Self::Html | Self::Md | Self::Txt => FormatFamily::Text,
            _ => FormatFamily::Image,
        }
    }

    pub fn is_image(&self) -> bool {
        self.family() == FormatFamily::Image
    }

    /// Infer a format from a bare file extension (no leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "md" | "markdown" | "mdown" | "mkd" => Some(Self::Md),
            "txt" | "text" | "log" => Some(Self::Txt),
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "avif" => Some(Self::Avif),
            "tif" | "tiff" => Some(Self::Tiff),
            "gif" => Some(Self::Gif),
            "bmp" | "dib" => Some(Self::Bmp),
            "svg" | "svgz" => Some(Self::Svg),
            "heic" | "heif" => Some(Self::Heic),
            _ => None,
        }
    }

    /// Infer a format from a MIME content type such as `image/svg+xml` or
    /// `text/plain; charset=utf-8`. Only the subtype is consulted.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        let subtype = essence.rsplit_once('/').map(|(_, sub)| sub)?;
        match subtype.to_ascii_lowercase().as_str() {
            "plain" => Some(Self::Txt),
            "markdown" | "x-markdown" => Some(Self::Md),
            "xhtml+xml" => Some(Self::Html),
            "svg+xml" => Some(Self::Svg),
            "vnd.openxmlformats-officedocument.wordprocessingml.document" => Some(Self::Docx),
            "x-ms-bmp" => Some(Self::Bmp),
            "pjpeg" => Some(Self::Jpeg),
            other => Self::from_extension(other),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = WandelError;

    /// Strict parse used for conversion targets. Accepts canonical tags and
    /// the usual extension aliases (`jpg`, `htm`, `markdown`, ...).
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let trimmed = tag.trim().trim_start_matches('.');
        Self::from_extension(trimmed)
            .ok_or_else(|| WandelError::UnsupportedFormat(tag.to_string()))
    }
}

/// Identify the format of `path`, optionally helped by a content-type hint.
///
/// Never fails: an unrecognisable input is tagged `Txt` and left for the
/// conversion matrix to accept or reject.
pub fn identify(path: &Path, content_type_hint: Option<&str>) -> Format {
    if let Some(format) = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(Format::from_extension)
    {
        return format;
    }

    if let Some(format) = content_type_hint.and_then(Format::from_content_type) {
        debug!(path = %path.display(), %format, "format taken from content-type hint");
        return format;
    }

    if let Some(format) = sniff(path) {
        debug!(path = %path.display(), %format, "format taken from content sniffing");
        return format;
    }

    Format::Txt
}

/// Classify a file by its leading bytes.
fn sniff(path: &Path) -> Option<Format> {
    let kind = infer::get_from_path(path).ok().flatten()?;
    Format::from_content_type(kind.mime_type())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(identify(Path::new("Report.DOCX"), None), Format::Docx);
        assert_eq!(identify(Path::new("photo.JPG"), None), Format::Jpeg);
        assert_eq!(identify(Path::new("notes.markdown"), None), Format::Md);
        assert_eq!(identify(Path::new("scan.tif"), None), Format::Tiff);
    }

    #[test]
    fn content_type_subtype_is_used_for_unknown_extensions() {
        let path = PathBuf::from("/nonexistent/upload.bin");
        assert_eq!(identify(&path, Some("image/svg+xml")), Format::Svg);
        assert_eq!(
            identify(&path, Some("text/plain; charset=utf-8")),
            Format::Txt
        );
        assert_eq!(identify(&path, Some("application/pdf")), Format::Pdf);
    }

    #[test]
    fn unknown_input_defaults_to_text() {
        let path = PathBuf::from("/nonexistent/mystery.xyz");
        assert_eq!(identify(&path, None), Format::Txt);
        assert_eq!(identify(&path, Some("application/x-unknown")), Format::Txt);
    }

    #[test]
    fn sniffing_recognises_png_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        // Minimal PNG signature plus IHDR chunk header.
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
        std::fs::write(&path, bytes).unwrap();
        assert_eq!(identify(&path, None), Format::Png);
    }

    #[test]
    fn strict_target_parse_rejects_unknown_tags() {
        assert_eq!("jpg".parse::<Format>().unwrap(), Format::Jpeg);
        assert_eq!(".PDF".parse::<Format>().unwrap(), Format::Pdf);
        assert!("exe".parse::<Format>().is_err());
    }

    #[test]
    fn tags_round_trip_through_display() {
        for format in Format::ALL {
            assert_eq!(format.to_string().parse::<Format>().unwrap(), format);
        }
    }
}
