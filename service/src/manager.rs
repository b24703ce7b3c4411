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

//! Connection manager implementation
//!
//! The ConnectionManager is responsible for:
//! - Managing all active connections
//! - Spawning and tracking connection workers
//! - Delivering messages to individual connections
//! - Broadcasting messages to all connections except the originator
//! - Graceful shutdown coordination
//!
//! Delivery is queue-based: a message is enqueued whole on the target
//! connection's outbound channel and written as a single frame by the
//! owning worker, so concurrent broadcasts never interleave bytes within
//! a frame on any connection.

use crate::{ConnectionWorker, ControlMessage, RelayError, Result, Router, ServerMetrics};
use dashmap::DashMap;
use parley_codec::{ClientId, RelayCodec, RelayMessage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

/// Result of a broadcast operation
#[derive(Debug, Clone)]
pub struct BroadcastResult {
    /// Total number of connections attempted
    pub total: usize,
    /// Number of successful sends
    pub succeeded: usize,
    /// Number of failed sends
    pub failed: usize,
    /// Identities whose delivery failed
    pub errors: Vec<ClientId>,
}

impl BroadcastResult {
    fn new() -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            errors: Vec::new(),
        }
    }

    /// Check if all broadcasts succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Managed connection entry
struct ManagedConnection {
    /// Outbound message channel to the connection's worker
    control_tx: mpsc::Sender<ControlMessage>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
    /// When the connection was created
    created_at: Instant,
}

/// Connection manager
pub struct ConnectionManager {
    /// Active connections (lock-free concurrent map)
    connections: Arc<DashMap<ClientId, ManagedConnection>>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Per-connection outbound queue depth
    outbound_buffer_size: usize,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(metrics: Arc<ServerMetrics>, outbound_buffer_size: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            metrics,
            outbound_buffer_size,
        }
    }

    /// Add a new connection under an already-allocated identity.
    ///
    /// This spawns a worker task owning the framed stream and tracks it.
    /// The worker unregisters itself from this manager when it finishes,
    /// whatever the reason.
    pub fn add_connection(
        &self,
        id: ClientId,
        framed: Framed<TcpStream, RelayCodec>,
        router: Arc<Router>,
    ) {
        let (worker, control_tx) =
            ConnectionWorker::new(id, framed, router, self.outbound_buffer_size);

        let connections = self.connections.clone();
        let metrics = self.metrics.clone();
        let worker_handle = tokio::spawn(async move {
            let start = Instant::now();
            worker.run().await;

            // Cleanup after worker finishes
            connections.remove(&id);
            metrics.connection_closed(start.elapsed());
        });

        let managed = ManagedConnection {
            control_tx,
            worker_handle,
            created_at: Instant::now(),
        };

        self.connections.insert(id, managed);
        self.metrics.connection_opened();
    }

    /// Remove a connection
    ///
    /// This sends a close message to the worker and waits briefly for it
    /// to finish.
    pub async fn remove_connection(&self, id: ClientId) -> Result<()> {
        if let Some((_, managed)) = self.connections.remove(&id) {
            let _ = managed.control_tx.send(ControlMessage::Close).await;
            let _ = tokio::time::timeout(Duration::from_secs(5), managed.worker_handle).await;
            Ok(())
        } else {
            Err(RelayError::ConnectionNotFound(id))
        }
    }

    /// Get all connected identities
    pub fn connection_ids(&self) -> Vec<ClientId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Get the number of active connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Age of one connection, if it is still tracked
    pub fn connection_age(&self, id: ClientId) -> Option<Duration> {
        self.connections
            .get(&id)
            .map(|entry| entry.created_at.elapsed())
    }

    /// Queue a message for a specific connection
    pub async fn send_to(&self, id: ClientId, message: RelayMessage) -> Result<()> {
        let control_tx = match self.connections.get(&id) {
            Some(managed) => managed.control_tx.clone(),
            None => return Err(RelayError::ConnectionNotFound(id)),
        };
        control_tx
            .send(ControlMessage::Deliver(message))
            .await
            .map_err(|_| RelayError::ConnectionClosed)
    }

    /// Broadcast a message to every connection except the originator.
    ///
    /// The origin never receives its own message back. Sends are queued
    /// concurrently; each worker writes its copy as one frame. Returns
    /// statistics about the broadcast.
    pub async fn broadcast_except(
        &self,
        origin: ClientId,
        message: RelayMessage,
    ) -> BroadcastResult {
        let mut result = BroadcastResult::new();

        let mut sends = Vec::new();
        for entry in self.connections.iter() {
            let id = *entry.key();
            if id == origin {
                continue;
            }
            result.total += 1;
            let tx = entry.control_tx.clone();
            let msg = message.clone();

            sends.push(async move {
                match tx.send(ControlMessage::Deliver(msg)).await {
                    Ok(_) => (id, true),
                    Err(_) => (id, false),
                }
            });
        }

        let outcomes = futures::future::join_all(sends).await;

        for (id, delivered) in outcomes {
            if delivered {
                result.succeeded += 1;
            } else {
                result.failed += 1;
                result.errors.push(id);
                self.metrics.send_failure();
            }
        }

        self.metrics.messages_relayed(result.succeeded as u64);
        result
    }

    /// Shutdown all connections gracefully
    pub async fn shutdown(&self, timeout: Duration) {
        // Snapshot the senders first; workers unregister concurrently and
        // a map guard must not be held across an await.
        let senders: Vec<mpsc::Sender<ControlMessage>> = self
            .connections
            .iter()
            .map(|entry| entry.control_tx.clone())
            .collect();
        for tx in senders {
            let _ = tx.send(ControlMessage::Close).await;
        }

        // Workers remove themselves from the map as they exit.
        let deadline = Instant::now() + timeout;
        while !self.connections.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        // Anything still running gets cut off.
        for entry in self.connections.iter() {
            entry.worker_handle.abort();
        }
        self.connections.clear();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_count", &self.connection_count())
            .finish()
    }
}
