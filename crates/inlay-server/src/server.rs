// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP/1.1 listener for the insertion service.
//
// One task per accepted connection, one request per connection. The accept
// loop runs until `stop` signals it; connections already being served are
// allowed to finish on their own tasks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use inlay_core::error::{InlayError, Result};

use crate::http::{self, Response};
use crate::routes;
use crate::state::AppState;

/// Lifecycle of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
}

pub struct HttpServer {
    state: Arc<AppState>,
    status: ServerStatus,
    /// Bound address once running (resolves port 0 to the real port).
    local_addr: Option<SocketAddr>,
    shutdown_signal: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicU32>,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
            status: ServerStatus::Stopped,
            local_addr: None,
            shutdown_signal: Arc::new(Notify::new()),
            task_handle: None,
            active_connections: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn status(&self) -> ServerStatus {
        self.status
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Bind `{bind}:{port}` and start accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`InlayError::Server`] if the address cannot be bound.
    pub async fn start(&mut self) -> Result<()> {
        if self.status == ServerStatus::Running {
            debug!(addr = ?self.local_addr, "Server already running");
            return Ok(());
        }
        self.status = ServerStatus::Starting;

        let config = &self.state.config;
        let bind_addr = format!("{}:{}", config.bind, config.port);
        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.status = ServerStatus::Stopped;
                return Err(InlayError::Server(format!("bind {bind_addr}: {e}")));
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|e| InlayError::Server(format!("local address: {e}")))?;
        info!(addr = %local_addr, "Inlay listening");

        let shutdown = Arc::clone(&self.shutdown_signal);
        let connections = Arc::clone(&self.active_connections);
        let state = Arc::clone(&self.state);

        let handle = tokio::spawn(async move {
            Self::accept_loop(listener, shutdown, connections, state).await;
        });

        self.local_addr = Some(local_addr);
        self.task_handle = Some(handle);
        self.status = ServerStatus::Running;
        Ok(())
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status != ServerStatus::Running {
            return Ok(());
        }
        info!(addr = ?self.local_addr, "Stopping server");

        self.shutdown_signal.notify_one();
        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| InlayError::Server(format!("task join: {e}")))?;
        }

        self.status = ServerStatus::Stopped;
        info!(active = self.active_connections(), "Server stopped");
        Ok(())
    }

    async fn accept_loop(
        listener: TcpListener,
        shutdown: Arc<Notify>,
        connections: Arc<AtomicU32>,
        state: Arc<AppState>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("Accept loop received shutdown signal");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            debug!(peer = %peer, "Connection accepted");
                            let state = Arc::clone(&state);
                            let connections = Arc::clone(&connections);
                            tokio::spawn(async move {
                                connections.fetch_add(1, Ordering::Relaxed);
                                if let Err(e) = Self::handle_connection(stream, peer, &state).await {
                                    warn!(peer = %peer, error = %e, "Connection handler error");
                                }
                                connections.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }
    }

    /// Read one request, route it, write the response.
    async fn handle_connection(
        mut stream: TcpStream,
        peer: SocketAddr,
        state: &AppState,
    ) -> std::io::Result<()> {
        let request = match http::read_request(&mut stream, state.config.max_request_bytes).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(peer = %peer, "Peer closed without a request");
                return Ok(());
            }
            Err(e) => {
                warn!(peer = %peer, error = %e, "Unreadable request");
                return http::send_response(&mut stream, &Response::from(&e)).await;
            }
        };

        let method = request.method.clone();
        let path = request.path.clone();
        let response = routes::dispatch(state, request).await;
        info!(
            peer = %peer,
            method = %method,
            path = %path,
            status = response.status,
            bytes = response.body.len(),
            "Request served"
        );
        http::send_response(&mut stream, &response).await
    }
}
