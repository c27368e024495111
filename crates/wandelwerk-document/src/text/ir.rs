// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Intermediate document: the hand-off between the read and write stages of
// one text conversion.

use super::markup;

/// Source metadata gathered during the read stage. Every field is optional;
/// readers that cannot determine a value leave it empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub pages: Option<u32>,
    /// `pages` is a heuristic rather than a real page count.
    pub pages_estimated: bool,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// A binary asset (embedded image) pulled out of the source.
#[derive(Debug, Clone)]
pub struct ExtractedAsset {
    /// File name to write the asset under (no directory component).
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Extracted text plus whichever richer renditions the source offered.
#[derive(Debug, Clone, Default)]
pub struct IntermediateDocument {
    pub text: String,
    pub html: Option<String>,
    pub markdown: Option<String>,
    pub metadata: DocumentMetadata,
    pub assets: Vec<ExtractedAsset>,
}

impl IntermediateDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// HTML for the document: the source's own, else rendered from Markdown,
    /// else the text as escaped paragraphs.
    pub fn html_or_derived(&self) -> String {
        if let Some(html) = &self.html {
            return html.clone();
        }
        if let Some(markdown) = &self.markdown {
            return markup::markdown_to_html(markdown);
        }
        markup::text_to_html(&self.text)
    }

    /// Markdown for the document: the source's own, else converted from
    /// HTML, else the text verbatim.
    pub fn markdown_or_derived(&self) -> String {
        if let Some(markdown) = &self.markdown {
            return markdown.clone();
        }
        if let Some(html) = &self.html {
            return markup::html_to_markdown(html);
        }
        self.text.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_falls_through_to_verbatim_markdown() {
        let doc = IntermediateDocument::from_text("just text\nsecond line");
        assert_eq!(doc.markdown_or_derived(), "just text\nsecond line");
    }

    #[test]
    fn markdown_is_preferred_over_text_for_html() {
        let doc = IntermediateDocument {
            text: "# Title".into(),
            markdown: Some("# Title".into()),
            ..IntermediateDocument::default()
        };
        assert!(doc.html_or_derived().contains("<h1>Title</h1>"));
    }
}
