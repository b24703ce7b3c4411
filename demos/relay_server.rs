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

//! Relay Chat Server
//!
//! Accepts client connections, assigns identities, and relays chat and
//! roster updates between everyone connected.
//!
//! ## Usage
//!
//! Run the server (address defaults to 127.0.0.1:7777):
//! ```bash
//! cargo run --example relay_server -- 0.0.0.0:7777
//! ```

use parley_service::{RelayServer, ServerConfig};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7777".to_string())
        .parse()?;

    let config = ServerConfig::new(addr);
    let server = RelayServer::new(config).await?;
    server.start().await?;

    println!("Relay server listening on {}", server.local_addr());
    println!("Press Ctrl+C to stop the server");

    // Wait for Ctrl+C
    tokio::signal::ctrl_c().await?;
    println!("\nShutting down server...");

    server.shutdown().await?;

    let metrics = server.metrics().snapshot();
    println!(
        "Server stopped: {} connections served, {} messages relayed, {} frames dropped",
        metrics.total_connections, metrics.messages_relayed, metrics.decode_failures
    );

    Ok(())
}
