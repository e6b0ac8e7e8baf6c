// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Inlay.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Inlay operations.
///
/// Every variant is fatal to the `process` call that raised it. Out-of-range
/// page references are not errors and never reach this type.
#[derive(Debug, Error)]
pub enum InlayError {
    // -- Request validation --
    #[error("{0} is required")]
    MissingRequiredField(&'static str),

    #[error("invalid insertion type: {0:?} (expected \"text\" or \"image\")")]
    InvalidInsertionType(String),

    #[error("invalid insertion: {0}")]
    InvalidInstruction(String),

    // -- Resources --
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to fetch {url}: {reason}")]
    FetchError { url: String, reason: String },

    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image could not be decoded: {0}")]
    ImageDecodeError(String),

    #[error("failed to write {}: {reason}", path.display())]
    WriteError { path: PathBuf, reason: String },

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Server(String),
}

impl InlayError {
    /// HTTP status the service layer reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::MissingRequiredField(_)
            | Self::InvalidInsertionType(_)
            | Self::InvalidInstruction(_)
            | Self::Serialization(_) => 400,
            _ => 500,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InlayError>;
