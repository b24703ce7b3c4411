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

//! Core types for the relay server

use parley_codec::ClientId;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Lifecycle state of one client session.
///
/// Transitions are strictly forward: `Pending → Identified → Closed`, with
/// `Identified` entered on the session's first username announcement and
/// `Closed` terminal on disconnect. Every event handler matches on this
/// exhaustively; there is no implicit fallthrough between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Identity assigned, username not yet announced
    Pending,
    /// Username announced at least once
    Identified,
    /// Connection gone, record destroyed
    Closed,
}

impl SessionState {
    /// Check if the session still has a live connection
    pub fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Identified)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Identified => write!(f, "identified"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One identity → username binding in the authoritative roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    /// Identity the record belongs to
    pub id: ClientId,
    /// The announced username
    pub username: String,
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Number of active connections
    pub active_connections: usize,
    /// Total connections since server start
    pub total_connections: u64,
    /// Server bind address
    pub bind_address: SocketAddr,
    /// Server uptime
    pub uptime: Duration,
    /// Server start time
    pub started_at: Instant,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RelayServer {{ active: {}, total: {}, addr: {}, uptime: {:?} }}",
            self.active_connections, self.total_connections, self.bind_address, self.uptime
        )
    }
}
