// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resource fetcher — resolve a source reference (local path or URL) to a
// local file, downloading remote content into a temp file that is deleted
// when the returned guard is dropped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use inlay_core::error::{InlayError, Result};
use reqwest::Url;
use tempfile::TempPath;
use tracing::{debug, info, instrument, warn};

/// A locally materialised temporary file. The file is removed when the
/// guard is dropped; removal failures are logged and otherwise ignored.
#[derive(Debug)]
pub struct TempAsset {
    path: Option<TempPath>,
}

impl TempAsset {
    fn new(path: TempPath) -> Self {
        Self { path: Some(path) }
    }

    /// Location of the temp file on disk.
    pub fn path(&self) -> &Path {
        // `path` is only taken in `drop`.
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for TempAsset {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => debug!(path = %shown, "temp asset removed"),
                Err(err) => warn!(path = %shown, error = %err, "failed to remove temp asset"),
            }
        }
    }
}

/// A resolved source reference.
#[derive(Debug)]
pub enum Resolved {
    /// The reference was already a local path.
    Local(PathBuf),
    /// The reference was a URL; its content lives in a temp file.
    Downloaded(TempAsset),
}

impl Resolved {
    /// Local path of the resource regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            Self::Local(path) => path,
            Self::Downloaded(asset) => asset.path(),
        }
    }

    pub fn is_downloaded(&self) -> bool {
        matches!(self, Self::Downloaded(_))
    }
}

/// True when `reference` is an absolute URL with both a scheme and a host.
pub fn is_remote(reference: &str) -> bool {
    match Url::parse(reference) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Resolve `reference` to a local file.
///
/// Local references are returned unchanged (existence is the caller's
/// concern). URLs are downloaded once, with no retry, into a uniquely named
/// temp file.
#[instrument(skip_all, fields(reference = %reference))]
pub fn fetch(reference: &str, timeout: Duration) -> Result<Resolved> {
    if !is_remote(reference) {
        debug!("reference is local");
        return Ok(Resolved::Local(PathBuf::from(reference)));
    }
    download(reference, timeout).map(Resolved::Downloaded)
}

fn download(url: &str, timeout: Duration) -> Result<TempAsset> {
    info!(url, timeout_secs = timeout.as_secs(), "Downloading remote resource");

    let fetch_error = |reason: String| InlayError::FetchError {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| fetch_error(err.to_string()))?;

    let mut response = client.get(url).send().map_err(|err| {
        if err.is_timeout() {
            fetch_error(format!("timed out after {}s", timeout.as_secs()))
        } else {
            fetch_error(err.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(fetch_error(format!("HTTP {status}")));
    }

    let mut file = tempfile::Builder::new()
        .prefix("inlay-")
        .suffix(&suffix_for(url))
        .tempfile()?;

    let bytes = response.copy_to(&mut file).map_err(|err| {
        if err.is_timeout() {
            fetch_error(format!("timed out after {}s", timeout.as_secs()))
        } else {
            fetch_error(err.to_string())
        }
    })?;

    // From here on the file is owned by the guard, so any early return
    // still deletes it.
    let asset = TempAsset::new(file.into_temp_path());
    info!(bytes, path = %asset.path().display(), "Download complete");
    Ok(asset)
}

/// File suffix taken from the last URL path segment, e.g. ".pdf".
fn suffix_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|name| {
            Path::new(&name)
                .extension()
                .and_then(|ext| ext.to_str())
                .filter(|ext| ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
                .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        })
        .unwrap_or_default()
}
