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

//! Connection worker implementation
//!
//! The ConnectionWorker owns one connection's framed stream for the whole
//! session and is the only task that ever writes to it, which is what makes
//! outbound frames atomic per connection. It is responsible for:
//! - Pumping inbound frames into the Router
//! - Writing queued outbound messages, one frame per send
//! - Isolating per-message decode failures from the session
//! - Notifying the Router exactly once when the session ends

use crate::Router;
use parley_codec::{ClientId, RelayCodec, RelayMessage};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::select;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

/// Control messages for the worker
#[derive(Debug)]
pub enum ControlMessage {
    /// Deliver a message to the connection as one frame
    Deliver(RelayMessage),
    /// Gracefully close the connection
    Close,
}

/// Connection worker that manages a single connection's lifecycle
pub struct ConnectionWorker {
    /// Identity bound to this connection
    id: ClientId,
    /// The framed stream being managed
    framed: Framed<TcpStream, RelayCodec>,
    /// Routing engine
    router: Arc<Router>,
    /// Control message receiver
    control_rx: mpsc::Receiver<ControlMessage>,
}

impl ConnectionWorker {
    /// Create a new connection worker
    pub fn new(
        id: ClientId,
        framed: Framed<TcpStream, RelayCodec>,
        router: Arc<Router>,
        buffer_size: usize,
    ) -> (Self, mpsc::Sender<ControlMessage>) {
        let (control_tx, control_rx) = mpsc::channel(buffer_size);

        let worker = Self {
            id,
            framed,
            router,
            control_rx,
        };

        (worker, control_tx)
    }

    /// Run the worker event loop
    ///
    /// This is the main entry point for the worker. It runs until the peer
    /// disconnects, the transport fails, or a close is requested, then
    /// notifies the Router so session state is cleaned up.
    pub async fn run(mut self) {
        self.event_loop().await;
        self.router.on_disconnect(self.id).await;

        // Drain whatever deliveries were still queued; the connection is
        // gone and they have nowhere to go.
        self.control_rx.close();
        while self.control_rx.try_recv().is_ok() {}
    }

    /// Main event processing loop
    async fn event_loop(&mut self) {
        loop {
            select! {
                inbound = self.framed.next() => {
                    match inbound {
                        Some(Ok(Ok(message))) => {
                            self.router.on_message(self.id, message).await;
                        }
                        Some(Ok(Err(error))) => {
                            // Per-message failure: drop it, keep the session.
                            self.router.on_decode_error(self.id, error).await;
                        }
                        Some(Err(error)) => {
                            warn!(id = %self.id, %error, "transport error, closing connection");
                            return;
                        }
                        None => {
                            // Peer disconnected; an expected transition.
                            debug!(id = %self.id, "peer disconnected");
                            return;
                        }
                    }
                }

                control = self.control_rx.recv() => {
                    match control {
                        Some(ControlMessage::Deliver(message)) => {
                            if let Err(error) = self.framed.send(message).await {
                                warn!(id = %self.id, %error, "failed to deliver frame, closing connection");
                                return;
                            }
                        }
                        Some(ControlMessage::Close) | None => {
                            return;
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for ConnectionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("id", &self.id)
            .finish()
    }
}
