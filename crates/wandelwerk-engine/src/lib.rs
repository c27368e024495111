// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wandelwerk engine: the `Converter` call contract, the DOCX -> PDF fallback
// chain, file inspection, and batch conversion.

pub mod batch;
pub mod engine;
pub mod fallback;
pub mod inspect;
pub mod strategies;

pub use engine::Converter;
pub use fallback::{ChainOutcome, ConversionStrategy, FallbackChain, StrategyJob, StrategyReport};
pub use inspect::inspect_file;
pub use wandelwerk_core::{
    BatchReport, CancellationToken, ConversionOptions, ConversionRequest, ConversionResult,
    DocumentInfo, EngineConfig, ErrorKind, Format, RenderBackend, Result, SupportedFormats,
    WandelError,
};
