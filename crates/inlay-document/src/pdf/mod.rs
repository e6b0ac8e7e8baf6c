// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — overlay editing of existing documents.

pub mod content;
pub mod document;

pub use content::StandardFont;
pub use document::PdfDocument;
