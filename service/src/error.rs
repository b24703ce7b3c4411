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

//! Error types for the relay server

use parley_codec::{ClientId, CodecError};
use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Relay server error types
#[derive(Debug, Error)]
pub enum RelayError {
    /// I/O error from the underlying TCP stream. At startup this is the
    /// fatal transport-unavailable case; mid-session it closes only the
    /// affected connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol error from the codec layer
    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    /// A registry operation referenced an identity that was never allocated
    /// or has been forgotten
    #[error("Unknown identity {0}")]
    UnknownIdentity(ClientId),

    /// Connection with the given identity was not found
    #[error("Connection {0} not found")]
    ConnectionNotFound(ClientId),

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server is already running
    #[error("Server already running")]
    AlreadyRunning,

    /// Maximum number of connections reached
    #[error("Maximum connections ({0}) reached")]
    MaxConnectionsReached(usize),
}

impl RelayError {
    /// Check if the error is scoped to a single message.
    ///
    /// Per-message errors are dropped with the message; they never close
    /// the connection or terminate the event loop.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            RelayError::Protocol(_) | RelayError::UnknownIdentity(_)
        )
    }

    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RelayError::ConnectionNotFound(_) | RelayError::ConnectionClosed | RelayError::Io(_)
        )
    }
}
