// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request routing and endpoint handlers.
//
// Endpoints:
//   GET  /                     service description
//   GET  /health               liveness plus directory checks
//   POST /process-pdf          apply an InstructionSet (JSON body)
//   POST /upload-pdf           raw PDF body, insertions in the query string
//   GET  /download/{filename}  fetch a processed file
//   GET  /list-files           PDFs in the input and output directories

use std::path::{Path, PathBuf};

use chrono::Utc;
use inlay_core::error::{InlayError, Result};
use inlay_core::{InsertionRequest, InstructionSet};
use inlay_document::InsertionEngine;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::http::{Request, Response};
use crate::state::AppState;

const SERVICE_NAME: &str = "Inlay PDF Processing Service";

const ENDPOINTS: &[(&str, &str)] = &[
    ("GET /", "service description"),
    ("GET /health", "health check"),
    ("POST /process-pdf", "apply insertions to a PDF by path or URL"),
    ("POST /upload-pdf", "upload a PDF and apply insertions"),
    ("GET /download/{filename}", "download a processed PDF"),
    ("GET /list-files", "list input and output PDFs"),
];

/// Result body of `POST /process-pdf`.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub output_path: Option<String>,
    pub processed_at: String,
}

/// Route one request. Never fails: every error becomes a response.
pub async fn dispatch(state: &AppState, request: Request) -> Response {
    let method = request.method.as_str();
    let path = request.path.as_str();

    let result = match (method, path) {
        ("GET", "/") => Ok(index()),
        ("GET", "/health") => Ok(health(state)),
        ("POST", "/process-pdf") => process_pdf(state, &request).await,
        ("POST", "/upload-pdf") => upload_pdf(state, &request).await,
        ("GET", "/list-files") => list_files(state).await,
        ("GET", _) if path.starts_with("/download/") => {
            download(state, &path["/download/".len()..]).await
        }
        (_, "/" | "/health" | "/process-pdf" | "/upload-pdf" | "/list-files") => {
            return Response::error(405, format!("method {method} not allowed on {path}"));
        }
        (_, _) if path.starts_with("/download/") => {
            return Response::error(405, format!("method {method} not allowed on {path}"));
        }
        _ => return Response::error(404, format!("no route for {path}")),
    };

    result.unwrap_or_else(|err| {
        warn!(error = %err, status = err.status_code(), "Request failed");
        Response::from(&err)
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn index() -> Response {
    let endpoints: serde_json::Map<String, serde_json::Value> = ENDPOINTS
        .iter()
        .map(|(route, what)| (route.to_string(), serde_json::Value::from(*what)))
        .collect();
    Response::json(
        200,
        &serde_json::json!({
            "message": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": endpoints,
        }),
    )
}

fn health(state: &AppState) -> Response {
    Response::json(
        200,
        &serde_json::json!({
            "status": "healthy",
            "timestamp": Utc::now().to_rfc3339(),
            "directories": {
                "input": state.input_dir().is_dir(),
                "output": state.output_dir().is_dir(),
            },
        }),
    )
}

#[instrument(skip_all)]
async fn process_pdf(state: &AppState, request: &Request) -> Result<Response> {
    let instructions: InstructionSet = serde_json::from_slice(&request.body)?;
    let output = run_engine(state.engine.clone(), instructions).await?;

    let body = ProcessResponse {
        success: true,
        message: "PDF processed successfully".into(),
        output_path: Some(output.display().to_string()),
        processed_at: Utc::now().to_rfc3339(),
    };
    Ok(Response::json(200, &body))
}

#[instrument(skip_all, fields(bytes = request.body.len()))]
async fn upload_pdf(state: &AppState, request: &Request) -> Result<Response> {
    if let Some(name) = request.query_param("filename") {
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            return Err(InlayError::InvalidInstruction(format!(
                "file must be a PDF, got {name:?}"
            )));
        }
    }
    if !request.body.starts_with(b"%PDF-") {
        return Err(InlayError::InvalidInstruction(
            "request body is not a PDF".into(),
        ));
    }

    // No insertions means the upload comes back unchanged.
    let insertions: Vec<InsertionRequest> = match request.query_param("insertions") {
        Some(json) => serde_json::from_str(json)?,
        None => Vec::new(),
    };

    let suffix = upload_suffix();
    let input = state.input_dir().join(format!("uploaded_{suffix}.pdf"));
    let output_name = format!("processed_{suffix}.pdf");
    let output = state.output_dir().join(&output_name);

    tokio::fs::create_dir_all(state.input_dir()).await?;
    tokio::fs::write(&input, &request.body).await?;
    info!(input = %input.display(), "Upload stored");

    let instructions = InstructionSet {
        pdf_path: input.display().to_string(),
        output_path: output.display().to_string(),
        insertions,
    };
    let written = run_engine(state.engine.clone(), instructions).await?;
    let bytes = tokio::fs::read(&written).await?;
    Ok(Response::pdf(bytes, &output_name))
}

async fn download(state: &AppState, filename: &str) -> Result<Response> {
    if !is_plain_filename(filename) {
        return Err(InlayError::InvalidInstruction(format!(
            "invalid filename {filename:?}"
        )));
    }
    let path = state.output_dir().join(filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(Response::pdf(bytes, filename)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(InlayError::NotFound(path)),
        Err(err) => Err(err.into()),
    }
}

async fn list_files(state: &AppState) -> Result<Response> {
    let input_files = pdf_names(state.input_dir()).await?;
    let output_files = pdf_names(state.output_dir()).await?;
    Ok(Response::json(
        200,
        &serde_json::json!({
            "input_files": input_files,
            "output_files": output_files,
        }),
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run the blocking engine off the async workers.
async fn run_engine(engine: InsertionEngine, instructions: InstructionSet) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || engine.process(&instructions))
        .await
        .map_err(|e| InlayError::Server(format!("processing task failed: {e}")))?
}

/// `<YYYYmmdd_HHMMSS>_<8 hex>`: sortable by time, unique across concurrent
/// uploads within the same second.
fn upload_suffix() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let id = Uuid::new_v4().simple().to_string();
    format!("{stamp}_{}", &id[..8])
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}

/// Sorted names of `.pdf` files in `dir`. A missing directory is empty.
async fn pdf_names(dir: &Path) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.to_ascii_lowercase().ends_with(".pdf") && entry.file_type().await?.is_file() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
