// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Wandelwerk.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Wandelwerk operations.
#[derive(Debug, Error)]
pub enum WandelError {
    // -- Request errors --
    #[error("input file not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: String, to: String },

    // -- Codec errors --
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("DOCX operation failed: {0}")]
    DocxError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("HTML rendering failed: {0}")]
    Render(String),

    // -- External processes --
    #[error("external process failed: {0}")]
    ExternalProcess(String),

    #[error("strategy produced no output: {0}")]
    EmptyOutput(String),

    #[error("all strategies failed: {}", .0.join("; "))]
    StrategiesExhausted(Vec<String>),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Control --
    #[error("conversion cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    // -- Storage --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The source path does not exist.
    InputMissing,
    /// Unknown target tag or a pair outside the conversion matrix.
    UnsupportedConversion,
    /// No codec could parse the source.
    DecodeFailure,
    /// A subprocess, browser, or automation call failed.
    ExternalProcessFailure,
    /// The target could not be produced.
    EncodeFailure,
    /// The caller cancelled the request.
    Cancelled,
    /// I/O, configuration, or serialization trouble.
    Internal,
}

impl WandelError {
    /// Classify this error for the result returned to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputMissing(_) => ErrorKind::InputMissing,
            Self::UnsupportedFormat(_) | Self::UnsupportedConversion { .. } => {
                ErrorKind::UnsupportedConversion
            }
            Self::Decode(_) => ErrorKind::DecodeFailure,
            Self::PdfError(_) | Self::DocxError(_) => ErrorKind::DecodeFailure,
            Self::ExternalProcess(_) | Self::PlatformUnavailable | Self::EmptyOutput(_) => {
                ErrorKind::ExternalProcessFailure
            }
            Self::Encode(_)
            | Self::ImageError(_)
            | Self::Render(_)
            | Self::StrategiesExhausted(_) => ErrorKind::EncodeFailure,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::InputMissing
            }
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WandelError>;
