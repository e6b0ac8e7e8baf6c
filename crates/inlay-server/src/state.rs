// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared server state, handed to every connection task.

use std::path::Path;

use inlay_core::ServerConfig;
use inlay_core::error::Result;
use inlay_document::InsertionEngine;
use tracing::debug;

/// Read-only after construction; connection tasks share it through an `Arc`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub engine: InsertionEngine,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let engine = InsertionEngine::new(config.engine.clone());
        Self { config, engine }
    }

    /// Create the input and output directories if they are missing.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config.input_dir, &self.config.output_dir] {
            std::fs::create_dir_all(dir)?;
            debug!(dir = %dir.display(), "Directory ready");
        }
        Ok(())
    }

    pub fn input_dir(&self) -> &Path {
        &self.config.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }
}
