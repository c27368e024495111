// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image pipeline: fit-mode resizing, colour effects, watermarking, and
// encoding through a primary codec with a software fallback.

pub mod codec;
pub mod geometry;
pub mod pipeline;
pub mod primary;
pub mod processor;
pub mod software;
pub mod svg;
pub mod watermark;

pub use codec::ImageCodec;
pub use pipeline::{ImageOutput, ImagePipeline};
pub use primary::PrimaryCodec;
pub use processor::ImageProcessor;
pub use software::SoftwareCodec;
