// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine and server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Where the target format puts its coordinate origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeOrigin {
    /// Origin at the bottom-left corner, y grows upward (PDF).
    BottomLeft,
    /// Origin at the top-left corner, y grows downward (matches requests).
    TopLeft,
}

/// Vertical flip applied to text drawn in the request's y-down space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFlip {
    /// Flip around the insertion point whenever the placement space is
    /// mirrored relative to the native space.
    Auto,
    /// Never flip. Glyphs render mirrored if the space is mirrored.
    Never,
}

/// Settings for one insertion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout for each remote fetch, in seconds (default 30).
    pub fetch_timeout_secs: u64,
    /// Upper bound on either side of an auto-scaled image, in points.
    pub image_size_cap: f32,
    /// Fit images inside their rectangle preserving proportions.
    pub keep_proportion: bool,
    /// Native coordinate convention of the output format.
    pub native_origin: NativeOrigin,
    /// Text orientation correction policy.
    pub text_flip: TextFlip,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 30,
            image_size_cap: 200.0,
            keep_proportion: true,
            native_origin: NativeOrigin::BottomLeft,
            text_flip: TextFlip::Auto,
        }
    }
}

/// Settings for the HTTP front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind (default 0.0.0.0).
    pub bind: String,
    /// TCP port (default 8000).
    pub port: u16,
    /// Directory that receives uploaded PDFs.
    pub input_dir: PathBuf,
    /// Directory that receives processed PDFs and serves downloads.
    pub output_dir: PathBuf,
    /// Requests larger than this are rejected.
    pub max_request_bytes: usize,
    /// Engine settings used for every request.
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8000,
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            max_request_bytes: 64 * 1024 * 1024,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Build the config from `INLAY_CONFIG` (optional JSON file) and the
    /// `INLAY_BIND`, `INLAY_PORT`, `INLAY_INPUT_DIR`, `INLAY_OUTPUT_DIR`
    /// overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("INLAY_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup. Unparsable ports are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("INLAY_BIND") {
            self.bind = bind;
        }
        if let Some(port) = lookup("INLAY_PORT").and_then(|p| p.trim().parse().ok()) {
            self.port = port;
        }
        if let Some(dir) = lookup("INLAY_INPUT_DIR") {
            self.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("INLAY_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }
}
