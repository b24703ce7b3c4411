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

//! Shared harness for the end-to-end relay tests.
//!
//! `RawClient` speaks the wire protocol directly over a plain socket so
//! tests can observe exactly what the server sends (and feed it exactly
//! the bytes they want, including malformed ones) without going through
//! the client library.

use futures::{SinkExt, StreamExt};
use parley_codec::{CodecResult, RelayCodec, RelayMessage};
use parley_service::{RelayServer, ServerConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;

/// Default wait for an expected frame.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Window in which an excluded recipient must stay silent.
pub const SILENCE_WINDOW: Duration = Duration::from_millis(250);

/// Start a relay server on an ephemeral loopback port.
pub async fn start_server() -> RelayServer {
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
    let server = RelayServer::new(config).await.expect("bind server");
    server.start().await.expect("start server");
    server
}

/// A protocol-level test client over one raw socket.
pub struct RawClient {
    framed: Framed<TcpStream, RelayCodec>,
}

impl RawClient {
    /// Connect to the server under test.
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self {
            framed: Framed::new(stream, RelayCodec::new()),
        }
    }

    /// Send one well-formed message.
    pub async fn send(&mut self, message: RelayMessage) {
        self.framed.send(message).await.expect("send frame");
    }

    /// Write raw bytes straight to the socket, bypassing the encoder.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.framed
            .get_mut()
            .write_all(bytes)
            .await
            .expect("write raw bytes");
        self.framed.get_mut().flush().await.expect("flush raw bytes");
    }

    /// Receive the next decode outcome, or `None` on end of stream.
    pub async fn recv(&mut self) -> Option<CodecResult<RelayMessage>> {
        match timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for a frame")
        {
            Some(Ok(outcome)) => Some(outcome),
            Some(Err(error)) => panic!("transport error: {}", error),
            None => None,
        }
    }

    /// Receive the next frame, asserting it decodes.
    pub async fn expect(&mut self) -> RelayMessage {
        self.recv()
            .await
            .expect("connection closed while expecting a frame")
            .expect("expected a well-formed frame")
    }

    /// Assert that nothing arrives within the silence window.
    pub async fn expect_silence(&mut self) {
        let outcome = timeout(SILENCE_WINDOW, self.framed.next()).await;
        assert!(
            outcome.is_err(),
            "expected silence but received {:?}",
            outcome
        );
    }

    /// Drop the connection.
    pub async fn close(mut self) {
        let _ = SinkExt::<RelayMessage>::close(&mut self.framed).await;
    }
}

/// Poll until `predicate` holds or the timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(predicate: F, what: &str) {
    timeout(RECV_TIMEOUT, async {
        while !predicate() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}
