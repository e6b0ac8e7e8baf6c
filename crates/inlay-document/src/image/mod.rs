// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — decode, orient, rotate, and size images for embedding.

pub mod prepare;
pub mod processor;

pub use prepare::{PreparedImage, prepare, resolve_dimensions};
pub use processor::{ImageProcessor, PdfSamples};
