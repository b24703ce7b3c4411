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

//! Relay client implementation
//!
//! The client runs two independent tasks over one framed connection: a
//! read task that applies inbound messages to the [`ClientMirror`] and
//! forwards the resulting events to the display handler, and a write task
//! that is the connection's only writer, draining an outbound queue one
//! frame at a time. Local input never touches the socket directly; it goes
//! through [`RelayClient::send_chat`], which enqueues a complete frame, so
//! sends from either side can never interleave at the byte level.

use crate::{ChatHandler, ClientConfig, ClientError, ClientMirror, MirrorEvent, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parley_codec::{ClientId, RelayCodec, RelayMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// How long `close()` waits for each session task before cutting it off.
const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

type FrameSink = SplitSink<Framed<TcpStream, RelayCodec>, RelayMessage>;
type FrameStream = SplitStream<Framed<TcpStream, RelayCodec>>;

/// A connected relay client session.
///
/// Created by [`RelayClient::connect`]; lives until [`RelayClient::close`]
/// or the server drops the connection. There is no automatic reconnection:
/// a dropped connection requires a fresh `connect`.
pub struct RelayClient {
    config: ClientConfig,
    mirror: Arc<Mutex<ClientMirror>>,
    outbound_tx: mpsc::Sender<RelayMessage>,
    read_handle: JoinHandle<()>,
    write_handle: JoinHandle<()>,
}

impl RelayClient {
    /// Connect to the server and start the session tasks.
    ///
    /// Resolution and dialing are bounded by the configured connect
    /// timeout. A failure here is the fatal transport-unavailable case;
    /// the caller reports it and exits.
    ///
    /// Once the server assigns an identity, the client announces the
    /// configured username for itself exactly once, before any chat can
    /// be sent.
    pub async fn connect<H: ChatHandler>(config: ClientConfig, handler: Arc<H>) -> Result<Self> {
        let addr = config.address();
        info!("Connecting to {}...", addr);

        let stream = match timeout(config.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ClientError::ConnectionTimeout),
        };

        info!("Connected to {}", stream.peer_addr()?);

        let framed = Framed::new(stream, RelayCodec::new());
        let (sink, frames) = framed.split();

        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_buffer_size);
        let mirror = Arc::new(Mutex::new(ClientMirror::new()));

        let write_handle = tokio::spawn(write_loop(sink, outbound_rx));
        let read_handle = tokio::spawn(read_loop(
            frames,
            mirror.clone(),
            handler,
            outbound_tx.clone(),
            config.username.clone(),
        ));

        Ok(Self {
            config,
            mirror,
            outbound_tx,
            read_handle,
            write_handle,
        })
    }

    /// Identity assigned by the server, once it has arrived
    pub async fn self_id(&self) -> Option<ClientId> {
        self.mirror.lock().await.self_id()
    }

    /// Known peers, ordered by identity
    pub async fn peers(&self) -> Vec<(ClientId, String)> {
        self.mirror.lock().await.peers()
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Queue one chat line for sending.
    ///
    /// Fails with [`ClientError::NotAssigned`] until the server's identity
    /// assignment has arrived, and with a codec error if the text exceeds
    /// the wire bounds or contains reserved bytes. The message is enqueued
    /// whole; the write task emits it as a single frame.
    ///
    /// Local echo is the embedder's concern: display the line under the
    /// local username immediately, independent of the server round-trip.
    pub async fn send_chat(&self, text: impl Into<String>) -> Result<()> {
        let id = self
            .mirror
            .lock()
            .await
            .self_id()
            .ok_or(ClientError::NotAssigned)?;
        let message = RelayMessage::chat(id, text.into())?;
        self.outbound_tx
            .send(message)
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Close the session cleanly.
    ///
    /// Pending sends are drained and flushed before the write half shuts
    /// down; the network task is then joined, so nothing is lost and no
    /// task outlives the session.
    pub async fn close(self) -> Result<()> {
        let Self {
            outbound_tx,
            mut read_handle,
            mut write_handle,
            ..
        } = self;

        // Dropping the last queue sender lets the write task drain what is
        // left, flush, and shut the write half down.
        drop(outbound_tx);
        if timeout(SHUTDOWN_WAIT, &mut write_handle).await.is_err() {
            warn!("write task did not drain in time");
            write_handle.abort();
        }

        // The server closes the socket once our write half is gone; the
        // read task observes the end of stream and finishes.
        if timeout(SHUTDOWN_WAIT, &mut read_handle).await.is_err() {
            warn!("read task did not finish in time");
            read_handle.abort();
        }

        debug!("session closed");
        Ok(())
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("address", &self.config.address())
            .field("username", &self.config.username)
            .finish()
    }
}

/// Sole writer to the connection: drains the outbound queue one frame at
/// a time, then flushes and closes the write half when the queue ends.
async fn write_loop(mut sink: FrameSink, mut outbound_rx: mpsc::Receiver<RelayMessage>) {
    while let Some(message) = outbound_rx.recv().await {
        if let Err(error) = sink.send(message).await {
            warn!(%error, "failed to send frame");
            break;
        }
    }
    let _ = sink.close().await;
}

/// Applies inbound messages to the mirror and forwards the resulting
/// events to the display handler.
async fn read_loop<H: ChatHandler>(
    mut frames: FrameStream,
    mirror: Arc<Mutex<ClientMirror>>,
    handler: Arc<H>,
    outbound_tx: mpsc::Sender<RelayMessage>,
    username: String,
) {
    // The read task needs the queue exactly once, for the
    // self-announcement; holding the sender any longer would keep the
    // write task alive after `close()` drops the client's own sender.
    let mut outbound_tx = Some(outbound_tx);

    while let Some(item) = frames.next().await {
        match item {
            Err(error) => {
                warn!(%error, "transport error");
                break;
            }
            Ok(Err(error)) => {
                // Undecodable frame: drop it, the session continues.
                warn!(%error, "dropping undecodable frame");
            }
            Ok(Ok(message)) => {
                let event = mirror.lock().await.apply(message);
                match event {
                    MirrorEvent::Assigned(id) => {
                        info!(%id, "identity assigned");
                        handler.on_assigned(id).await;

                        // Exactly one self-announcement, immediately upon
                        // assignment.
                        let Some(tx) = outbound_tx.take() else {
                            continue;
                        };
                        match RelayMessage::username(id, username.clone()) {
                            Ok(announce) => {
                                if tx.send(announce).await.is_err() {
                                    warn!("outbound queue closed before self-announcement");
                                    break;
                                }
                            }
                            Err(error) => {
                                warn!(%error, "configured username is not sendable")
                            }
                        }
                    }
                    MirrorEvent::PeerAnnounced {
                        id,
                        username,
                        renamed_from,
                    } => {
                        handler
                            .on_peer_announced(id, &username, renamed_from.as_deref())
                            .await;
                    }
                    MirrorEvent::Chat { label, text, .. } => {
                        handler.on_chat(&label, &text).await;
                    }
                    MirrorEvent::Ignored => {}
                }
            }
        }
    }

    debug!("server connection ended");
    handler.on_disconnect().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_service::{RelayServer, ServerConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct RecordingHandler {
        assigned: Notify,
        disconnects: AtomicUsize,
    }

    impl RecordingHandler {
        fn new() -> Self {
            Self {
                assigned: Notify::new(),
                disconnects: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChatHandler for RecordingHandler {
        async fn on_assigned(&self, _id: ClientId) {
            self.assigned.notify_one();
        }

        async fn on_disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn start_server() -> RelayServer {
        let server = RelayServer::new(ServerConfig::new("127.0.0.1:0".parse().unwrap()))
            .await
            .unwrap();
        server.start().await.unwrap();
        server
    }

    fn client_config(server: &RelayServer, username: &str) -> ClientConfig {
        let addr = server.local_addr();
        ClientConfig::new(addr.ip().to_string(), addr.port()).with_username(username)
    }

    #[tokio::test]
    async fn test_connect_assigns_identity_and_announces() {
        let server = start_server().await;
        let handler = Arc::new(RecordingHandler::new());

        let client = RelayClient::connect(client_config(&server, "alice"), handler.clone())
            .await
            .unwrap();

        handler.assigned.notified().await;
        let id = client.self_id().await.expect("identity should be assigned");

        // The automatic self-announcement reaches the server's roster.
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if server.registry().username(id).as_deref() == Some("alice") {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("announce never reached the server");

        client.close().await.unwrap();
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_chat_before_assignment_fails() {
        let server = start_server().await;
        let handler = Arc::new(RecordingHandler::new());

        // Connect but race the assignment: sending before the id arrives
        // must fail rather than fabricate an identity.
        let client = RelayClient::connect(client_config(&server, "bob"), handler.clone())
            .await
            .unwrap();
        if client.self_id().await.is_none() {
            assert!(matches!(
                client.send_chat("too early").await,
                Err(ClientError::NotAssigned)
            ));
        }

        client.close().await.unwrap();
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_joins_tasks_and_reports_disconnect() {
        let server = start_server().await;
        let handler = Arc::new(RecordingHandler::new());

        let client = RelayClient::connect(client_config(&server, "carol"), handler.clone())
            .await
            .unwrap();
        handler.assigned.notified().await;

        client.close().await.unwrap();
        assert_eq!(handler.disconnects.load(Ordering::SeqCst), 1);

        server.shutdown().await.unwrap();
    }
}
