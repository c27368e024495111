// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text document pipeline: read any text-family source into an intermediate
// document, then write it to the target.

pub mod docx;
pub mod ir;
pub mod markup;
pub mod reader;
pub mod writer;

pub use ir::{DocumentMetadata, ExtractedAsset, IntermediateDocument};
pub use reader::read_document;
pub use writer::{pdf_source_html, save_assets, write_document, write_output};
