// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// inlay-document — Text and image insertion into existing PDF documents.
//
// Provides remote resource fetching, page selection, coordinate
// reconciliation between request and PDF space, image preparation (decode,
// flip, rotate, size), PDF overlay editing, and the insertion engine that
// drives them.

pub mod coords;
pub mod engine;
pub mod fetch;
pub mod image;
pub mod pages;
pub mod pdf;

// Re-export the primary entry points so callers can use `inlay_document::InsertionEngine` etc.
pub use coords::{CoordinateReconciler, PageBox, PageRotation};
pub use engine::{InsertionEngine, process};
pub use fetch::{Resolved, TempAsset};
pub use image::{ImageProcessor, PreparedImage};
pub use pdf::PdfDocument;
