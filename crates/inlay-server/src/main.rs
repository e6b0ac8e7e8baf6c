// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inlay — PDF text and image insertion service
//
// Entry point. Initialises logging, loads configuration, prepares the
// working directories, and serves until Ctrl-C.

mod http;
mod routes;
mod server;
mod state;

use inlay_core::ServerConfig;

use server::HttpServer;
use state::AppState;

#[tokio::main]
async fn main() -> inlay_core::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Inlay starting");

    let config = ServerConfig::from_env()?;
    let state = AppState::new(config);
    state.ensure_directories()?;
    tracing::info!(
        input = %state.input_dir().display(),
        output = %state.output_dir().display(),
        "Working directories ready"
    );

    let mut server = HttpServer::new(state);
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    server.stop().await
}
