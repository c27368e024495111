// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wandelwerk: core types, format policy, and error definitions shared across
// all crates.

pub mod cancel;
pub mod config;
pub mod error;
pub mod format;
pub mod matrix;
pub mod types;

pub use cancel::CancellationToken;
pub use config::{EngineConfig, RenderBackend};
pub use error::{ErrorKind, Result, WandelError};
pub use format::{Format, FormatFamily, identify};
pub use matrix::ConversionMatrix;
pub use types::*;
