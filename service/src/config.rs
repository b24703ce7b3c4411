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

//! Relay server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration.
///
/// The bind address always comes from the embedder (demo binaries take it
/// from the command line); nothing in the server hardcodes an address.
///
/// # Examples
///
/// ```
/// use parley_service::ServerConfig;
///
/// let config = ServerConfig::new("127.0.0.1:7777".parse().unwrap())
///     .with_max_connections(64);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_address: SocketAddr,

    /// Maximum number of simultaneous connections; further sockets are
    /// accepted and immediately dropped
    pub max_connections: usize,

    /// Per-connection outbound queue depth
    pub outbound_buffer_size: usize,

    /// How long `shutdown()` waits for connection workers to drain
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // Loopback default for tests and demos; embedders override.
            bind_address: "127.0.0.1:7777".parse().expect("static address"),
            max_connections: 32,
            outbound_buffer_size: 64,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Create a configuration bound to the given address
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the maximum number of simultaneous connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the per-connection outbound queue depth
    pub fn with_outbound_buffer_size(mut self, size: usize) -> Self {
        self.outbound_buffer_size = size;
        self
    }

    /// Set the shutdown drain timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.bind_address.port(), 7777);
    }

    #[test]
    fn test_builder_methods() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_max_connections(8)
            .with_outbound_buffer_size(16)
            .with_shutdown_timeout(Duration::from_secs(1));
        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.outbound_buffer_size, 16);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }
}
