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

//! Broadcast routing engine
//!
//! The Router decides, for each connection event, what gets sent to whom:
//!
//! - **Connect**: allocate and register an identity, assign it to the new
//!   connection, then bootstrap the newcomer with the current roster as a
//!   sequence of username announcements. Nothing is sent to anyone else.
//! - **Username announcement**: record it, then announce it to every other
//!   connection. The origin never gets its own announcement echoed back.
//! - **Chat**: relay to every other connection, attributed to the sender's
//!   registered identity. Never echoed to the originator.
//! - **Disconnect**: forget the identity and destroy its roster record.
//!
//! All per-message failures (undecodable frames, unknown identities) are
//! logged and dropped; they never close a connection or stop the loop.

use crate::{ConnectionManager, ServerMetrics, SessionRegistry};
use parley_codec::{ClientId, CodecError, RelayCodec, RelayMessage};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Server-side routing engine.
///
/// Owns no connection state of its own: sessions live in the
/// [`SessionRegistry`], transport handles in the [`ConnectionManager`].
/// The Router is the only component that mutates the registry, and each
/// mutation happens from the affected connection's worker, so a given
/// record has at most one mutation in flight at a time.
pub struct Router {
    /// Authoritative identity allocator and roster
    registry: Arc<SessionRegistry>,
    /// Live connection handles
    manager: Arc<ConnectionManager>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
}

impl Router {
    /// Create a new router over the given registry and connection manager
    pub fn new(
        registry: Arc<SessionRegistry>,
        manager: Arc<ConnectionManager>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            registry,
            manager,
            metrics,
        }
    }

    /// The registry this router mutates
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The connection manager this router sends through
    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    /// Handle a newly accepted connection.
    ///
    /// Allocates and registers a fresh identity, spawns the connection's
    /// worker, sends the identity assignment, and bootstraps the newcomer
    /// with the current roster so it can render existing participants
    /// before any chat arrives. The newcomer stays `Pending` until it
    /// announces its own username.
    pub async fn on_connect(self: Arc<Self>, framed: Framed<TcpStream, RelayCodec>) -> ClientId {
        let id = self.registry.allocate();
        self.registry.insert(id);
        self.manager.add_connection(id, framed, self.clone());

        info!(%id, "connection registered");

        // Assignment must reach the client before any roster traffic; the
        // per-connection queue preserves this order.
        if let Err(error) = self.manager.send_to(id, RelayMessage::assign_id(id)).await {
            warn!(%id, %error, "failed to queue identity assignment");
            return id;
        }

        for record in self.registry.snapshot() {
            if record.id == id {
                continue;
            }
            let announce = RelayMessage::Username {
                id: record.id,
                username: record.username,
            };
            if let Err(error) = self.manager.send_to(id, announce).await {
                warn!(%id, %error, "failed to queue roster bootstrap");
                break;
            }
        }

        id
    }

    /// Handle one decoded inbound message from connection `id`.
    pub async fn on_message(&self, id: ClientId, message: RelayMessage) {
        self.metrics.message_received();
        match message {
            RelayMessage::Username { username, .. } => {
                // The sender's registered identity is authoritative; the
                // identity field on an inbound announce is ignored.
                match self.registry.set_username(id, username.clone()) {
                    Ok(Some(previous)) => {
                        info!(%id, from = %previous, to = %username, "username changed")
                    }
                    Ok(None) => info!(%id, %username, "username announced"),
                    Err(error) => {
                        // Unknown identity: drop like any malformed message.
                        warn!(%id, %error, "dropping announce for unknown identity");
                        return;
                    }
                }

                let announce = RelayMessage::Username { id, username };
                let result = self.manager.broadcast_except(id, announce).await;
                debug!(%id, delivered = result.succeeded, "announced username to peers");
            }
            RelayMessage::Chat { text, .. } => {
                if !self.registry.contains(id) {
                    warn!(%id, "dropping chat from unknown identity");
                    return;
                }
                let relay = RelayMessage::Chat { id, text };
                let result = self.manager.broadcast_except(id, relay).await;
                debug!(%id, delivered = result.succeeded, "relayed chat to peers");
            }
            RelayMessage::AssignId { .. } => {
                // Only the server assigns identities; a client sending this
                // is treated like any other malformed message.
                warn!(%id, "dropping identity assignment from client");
                self.metrics.decode_failure();
            }
        }
    }

    /// Handle an undecodable frame from connection `id`.
    ///
    /// The message is dropped and the connection stays open.
    pub async fn on_decode_error(&self, id: ClientId, error: CodecError) {
        self.metrics.decode_failure();
        warn!(%id, %error, "dropping undecodable frame");
    }

    /// Handle a disconnect of connection `id`.
    ///
    /// Forgets the identity; the roster record is destroyed and nothing
    /// retains a reference to it afterwards. No departure notice is
    /// broadcast.
    pub async fn on_disconnect(&self, id: ClientId) {
        if self.registry.remove(id) {
            info!(%id, "session closed");
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("sessions", &self.registry.len())
            .field("connections", &self.manager.connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionState;
    use tracing_test::traced_test;

    fn test_router() -> (Arc<Router>, Arc<SessionRegistry>, Arc<ServerMetrics>) {
        let metrics = Arc::new(ServerMetrics::new());
        let registry = Arc::new(SessionRegistry::new());
        let manager = Arc::new(ConnectionManager::new(metrics.clone(), 16));
        let router = Arc::new(Router::new(registry.clone(), manager, metrics.clone()));
        (router, registry, metrics)
    }

    #[tokio::test]
    async fn test_username_announce_identifies_session() {
        let (router, registry, _metrics) = test_router();
        let id = registry.allocate();
        registry.insert(id);

        // The identity field from the wire is advisory; the registered
        // binding wins even if a client lies about its identity.
        let forged = RelayMessage::Username {
            id: ClientId::new(999),
            username: "alice".to_string(),
        };
        router.on_message(id, forged).await;

        assert_eq!(registry.state(id), SessionState::Identified);
        assert_eq!(registry.username(id), Some("alice".to_string()));
        assert_eq!(registry.username(ClientId::new(999)), None);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_announce_for_unknown_identity_is_dropped() {
        let (router, registry, _metrics) = test_router();

        let ghost = ClientId::new(77);
        let announce = RelayMessage::Username {
            id: ghost,
            username: "ghost".to_string(),
        };
        router.on_message(ghost, announce).await;

        assert!(registry.is_empty());
        assert!(logs_contain("dropping announce for unknown identity"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_client_sent_assignment_is_dropped() {
        let (router, registry, metrics) = test_router();
        let id = registry.allocate();
        registry.insert(id);

        router
            .on_message(id, RelayMessage::assign_id(ClientId::new(5)))
            .await;

        assert_eq!(registry.state(id), SessionState::Pending);
        assert_eq!(metrics.snapshot().decode_failures, 1);
        assert!(logs_contain("dropping identity assignment from client"));
    }

    #[tokio::test]
    async fn test_decode_error_only_counts_and_logs() {
        let (router, registry, metrics) = test_router();
        let id = registry.allocate();
        registry.insert(id);
        registry.set_username(id, "alice".to_string()).unwrap();

        router
            .on_decode_error(
                id,
                CodecError::UnknownTag {
                    tag: "9".to_string(),
                },
            )
            .await;

        // Nothing about the session changed.
        assert_eq!(registry.state(id), SessionState::Identified);
        assert_eq!(registry.username(id), Some("alice".to_string()));
        assert_eq!(metrics.snapshot().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_disconnect_forgets_identity() {
        let (router, registry, _metrics) = test_router();
        let id = registry.allocate();
        registry.insert(id);
        registry.set_username(id, "bob".to_string()).unwrap();

        router.on_disconnect(id).await;
        assert_eq!(registry.state(id), SessionState::Closed);

        // A second disconnect for the same identity is harmless.
        router.on_disconnect(id).await;
    }
}
