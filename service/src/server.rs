//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Relay server implementation
//!
//! The RelayServer is the main entry point on the server side. It owns the
//! TCP listener, accepts connections, and hands each one to the Router.

use crate::{
    ConnectionManager, RelayError, Result, Router, ServerConfig, ServerMetrics, ServerSnapshot,
    SessionRegistry,
};
use parley_codec::RelayCodec;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

/// Relay chat server
///
/// Accepts connections on the configured address, assigns each one an
/// identity, and relays chat and roster traffic between them. Runs until
/// `shutdown()` is called. Nothing persists across restarts; the roster is
/// rebuilt from scratch as clients reconnect.
///
/// # Example
///
/// ```no_run
/// use parley_service::{RelayServer, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig::new("127.0.0.1:7777".parse()?);
///     let server = RelayServer::new(config).await?;
///     server.start().await?;
///
///     tokio::signal::ctrl_c().await?;
///     server.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct RelayServer {
    /// Server configuration
    config: ServerConfig,
    /// Identity allocation and roster
    registry: Arc<SessionRegistry>,
    /// Connection manager
    manager: Arc<ConnectionManager>,
    /// Routing engine
    router: Arc<Router>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// TCP listener (wrapped for sharing with the accept loop)
    listener: Arc<tokio::sync::Mutex<TcpListener>>,
    /// Actual bind address
    bind_address: SocketAddr,
    /// Server start time
    started_at: Instant,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Shutdown notification
    shutdown_notify: Arc<Notify>,
    /// Accept loop task handle
    accept_handle: Arc<tokio::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    ///
    /// This binds to the configured address but does not start accepting
    /// connections; call `start()` for that. A bind failure is the fatal
    /// transport-unavailable case and is reported to the caller.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_address).await?;
        let actual_addr = listener.local_addr()?;

        let metrics = Arc::new(ServerMetrics::new());
        let registry = Arc::new(SessionRegistry::new());
        let manager = Arc::new(ConnectionManager::new(
            metrics.clone(),
            config.outbound_buffer_size,
        ));
        let router = Arc::new(Router::new(
            registry.clone(),
            manager.clone(),
            metrics.clone(),
        ));

        tracing::info!("Relay server bound to {}", actual_addr);

        Ok(Self {
            config,
            registry,
            manager,
            router,
            metrics,
            listener: Arc::new(tokio::sync::Mutex::new(listener)),
            bind_address: actual_addr,
            started_at: Instant::now(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            accept_handle: Arc::new(tokio::sync::Mutex::new(None)),
        })
    }

    /// Start accepting connections
    ///
    /// Spawns the accept loop; the server keeps running until `shutdown()`
    /// is called.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RelayError::AlreadyRunning);
        }

        tracing::info!("Starting relay server on {}", self.bind_address);

        let handle = self.spawn_accept_loop().await;
        *self.accept_handle.lock().await = Some(handle);

        Ok(())
    }

    /// Spawn the accept loop task
    async fn spawn_accept_loop(&self) -> JoinHandle<()> {
        let listener = self.listener.clone();
        let manager = self.manager.clone();
        let metrics = self.metrics.clone();
        let router = self.router.clone();
        let config = self.config.clone();
        let running = self.running.clone();
        let shutdown_notify = self.shutdown_notify.clone();

        tokio::spawn(async move {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let accept_result = tokio::select! {
                    result = async {
                        listener.lock().await.accept().await
                    } => result,
                    _ = shutdown_notify.notified() => break,
                };

                match accept_result {
                    Ok((socket, peer_addr)) => {
                        tracing::debug!("Accepted connection from {}", peer_addr);

                        if manager.connection_count() >= config.max_connections {
                            tracing::warn!(
                                "Connection limit reached ({}), rejecting connection from {}",
                                config.max_connections,
                                peer_addr
                            );
                            metrics.connection_rejected();
                            drop(socket);
                            continue;
                        }

                        let framed = Framed::new(socket, RelayCodec::new());
                        let id = router.clone().on_connect(framed).await;
                        tracing::info!("Connection {} established from {}", id, peer_addr);
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);

                        // Back off on errors to avoid a tight loop
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }

            tracing::info!("Accept loop terminated");
        })
    }

    /// Shutdown the server gracefully
    ///
    /// Stops accepting new connections and drains existing ones, up to the
    /// configured shutdown timeout.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(RelayError::ServerNotRunning);
        }

        tracing::info!("Shutting down relay server");

        self.shutdown_notify.notify_waiters();

        if let Some(handle) = self.accept_handle.lock().await.take() {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        }

        self.manager.shutdown(self.config.shutdown_timeout).await;

        tracing::info!("Relay server shutdown complete");

        Ok(())
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the server's actual bind address
    pub fn local_addr(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the number of active connections
    pub fn connection_count(&self) -> usize {
        self.manager.connection_count()
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            active_connections: self.manager.connection_count(),
            total_connections: self.metrics.total_connections(),
            bind_address: self.local_addr(),
            uptime: self.started_at.elapsed(),
            started_at: self.started_at,
        }
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    /// Get the session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayServer")
            .field("bind_address", &self.local_addr())
            .field("running", &self.is_running())
            .field("connection_count", &self.connection_count())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

// Implement Drop to ensure cleanup
impl Drop for RelayServer {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("RelayServer dropped while still running");
            self.running.store(false, Ordering::SeqCst);
            self.shutdown_notify.notify_waiters();
        }
    }
}
