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

//! Relay message types and wire constants

use crate::result::{CodecError, CodecResult};
use std::fmt;

/// Byte separating the tag and fields within a frame.
pub const FIELD_SEPARATOR: u8 = b'|';

/// Byte terminating a frame. Reserved: no string field may contain it.
pub const FRAME_END: u8 = b'\n';

/// Maximum length of a chat text field, in bytes.
pub const MAX_TEXT_LEN: usize = 120;

/// Maximum length of a username field, in bytes.
pub const MAX_USERNAME_LEN: usize = 80;

/// Maximum length of a complete frame including its terminator.
///
/// Sized for the largest representable message: a Chat frame with a
/// 20-digit identity and a maximal text field.
pub const MAX_FRAME_LEN: usize = 1 + 1 + 20 + 1 + MAX_TEXT_LEN + 1;

/// Wire tag for [`RelayMessage::Chat`].
pub const TAG_CHAT: u8 = 1;

/// Wire tag for [`RelayMessage::Username`].
pub const TAG_USERNAME: u8 = 2;

/// Wire tag for [`RelayMessage::AssignId`].
pub const TAG_ASSIGN_ID: u8 = 3;

/// Unique identity of a connected client.
///
/// Assigned by the server, monotonically increasing, and never reused for
/// the lifetime of the server process. Carried on every attributed wire
/// message, so it lives in the codec crate alongside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Create a client identity from its raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// A single relay protocol message.
///
/// One value corresponds to exactly one wire frame. Use the validating
/// constructors ([`RelayMessage::chat`], [`RelayMessage::username`]) when
/// building messages from untrusted or user-supplied strings; the encoder
/// re-checks the bounds regardless, so a directly constructed value with an
/// invalid field fails at encode time rather than corrupting the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// A chat line attributed to `id`.
    ///
    /// Client → server: the author's outgoing line (the server overwrites
    /// the identity with the sender's own). Server → client: a relayed
    /// line attributed to its author.
    Chat {
        /// Author of the line
        id: ClientId,
        /// The chat text, at most [`MAX_TEXT_LEN`] bytes
        text: String,
    },

    /// A username announcement for `id`.
    ///
    /// Client → server announces the local user's chosen name; server →
    /// client announces a peer's name.
    Username {
        /// Identity the name belongs to
        id: ClientId,
        /// The username, at most [`MAX_USERNAME_LEN`] bytes
        username: String,
    },

    /// Identity assignment, sent by the server to a newly connected client
    /// exactly once, immediately after accept.
    AssignId {
        /// The identity assigned to the receiving connection
        id: ClientId,
    },
}

impl RelayMessage {
    /// Build a validated Chat message.
    pub fn chat(id: ClientId, text: impl Into<String>) -> CodecResult<Self> {
        let text = text.into();
        validate_field("text", &text, MAX_TEXT_LEN)?;
        Ok(Self::Chat { id, text })
    }

    /// Build a validated Username message.
    pub fn username(id: ClientId, username: impl Into<String>) -> CodecResult<Self> {
        let username = username.into();
        validate_field("username", &username, MAX_USERNAME_LEN)?;
        if username.is_empty() {
            return Err(CodecError::EmptyField { field: "username" });
        }
        Ok(Self::Username { id, username })
    }

    /// Build an AssignId message.
    pub fn assign_id(id: ClientId) -> Self {
        Self::AssignId { id }
    }

    /// The wire tag of this message.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Chat { .. } => TAG_CHAT,
            Self::Username { .. } => TAG_USERNAME,
            Self::AssignId { .. } => TAG_ASSIGN_ID,
        }
    }

    /// The identity this message is attributed to.
    pub fn id(&self) -> ClientId {
        match self {
            Self::Chat { id, .. } | Self::Username { id, .. } | Self::AssignId { id } => *id,
        }
    }
}

/// Check a string field against its length bound and the reserved bytes.
pub(crate) fn validate_field(field: &'static str, value: &str, max: usize) -> CodecResult<()> {
    if value.len() > max {
        return Err(CodecError::FieldTooLong {
            field,
            len: value.len(),
            max,
        });
    }
    if value
        .bytes()
        .any(|b| b == FIELD_SEPARATOR || b == FRAME_END)
    {
        return Err(CodecError::ReservedByte { field });
    }
    Ok(())
}
