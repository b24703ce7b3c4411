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

//! Relay Server Implementation
//!
//! This crate provides the server side of the relay protocol: identity
//! allocation, the authoritative roster, and the broadcast-routing engine
//! that fans inbound chat and roster updates out to every other connected
//! client.
//!
//! # Architecture
//!
//! ```text
//! RelayServer
//!     ↓ accept
//! Router ── SessionRegistry
//!     ↓
//! ConnectionManager
//!     ↓
//! ConnectionWorker → Framed<TcpStream, RelayCodec>
//! ```
//!
//! Each connection is owned by exactly one [`ConnectionWorker`] task; the
//! worker is the only writer to its stream, so queued frames are written
//! atomically and broadcasts never interleave bytes on a connection. The
//! [`Router`] mutates the [`SessionRegistry`] only from the affected
//! connection's worker, giving at most one in-flight mutation per record.
//!
//! # Example
//!
//! ```no_run
//! use parley_service::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new("127.0.0.1:7777".parse()?);
//!     let server = RelayServer::new(config).await?;
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod manager;
mod metrics;
mod registry;
mod router;
mod server;
mod types;
mod worker;

pub use config::ServerConfig;
pub use error::{RelayError, Result};
pub use manager::{BroadcastResult, ConnectionManager};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use registry::SessionRegistry;
pub use router::Router;
pub use server::RelayServer;
pub use types::{ClientRecord, ServerSnapshot, SessionState};
pub use worker::{ConnectionWorker, ControlMessage};

// The identity and message types come from the codec crate; re-exported so
// embedders of the server need only this crate.
pub use parley_codec::{ClientId, CodecError, RelayCodec, RelayMessage};
