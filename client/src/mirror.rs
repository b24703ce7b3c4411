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

//! Client-side roster mirror
//!
//! The mirror is the client's partial copy of the server's roster, driven
//! purely by inbound broadcasts: every entry was explicitly introduced by
//! a well-formed server message. The client's own identity is tracked
//! separately and never appears as a roster entry.

use parley_codec::{ClientId, RelayMessage};
use std::collections::HashMap;

/// Result of applying one inbound message to the mirror.
///
/// This is the mirror's whole output surface: the network task forwards
/// these to the display collaborator without interpreting them further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    /// The server assigned this client its identity
    Assigned(ClientId),
    /// A peer announced or changed its username
    PeerAnnounced {
        /// The peer's identity
        id: ClientId,
        /// The announced username
        username: String,
        /// Previous username if this was a rename
        renamed_from: Option<String>,
    },
    /// A chat line to display, already attributed
    Chat {
        /// The author's identity
        id: ClientId,
        /// Display label: the author's username, or a placeholder if the
        /// author was never announced
        label: String,
        /// The chat text
        text: String,
    },
    /// Message carried no displayable information (duplicate assignment,
    /// echo of the local user's own announcement)
    Ignored,
}

/// Local, possibly incomplete copy of the server's roster.
#[derive(Debug, Default)]
pub struct ClientMirror {
    /// Identity assigned to this client, once known
    self_id: Option<ClientId>,
    /// Known peers; never contains `self_id`
    roster: HashMap<ClientId, String>,
}

impl ClientMirror {
    /// Create an empty mirror
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity assigned by the server, if it has arrived yet
    pub fn self_id(&self) -> Option<ClientId> {
        self.self_id
    }

    /// Username of a known peer
    pub fn username_of(&self, id: ClientId) -> Option<&str> {
        self.roster.get(&id).map(String::as_str)
    }

    /// Number of known peers
    pub fn peer_count(&self) -> usize {
        self.roster.len()
    }

    /// Known peers, ordered by identity
    pub fn peers(&self) -> Vec<(ClientId, String)> {
        let mut peers: Vec<(ClientId, String)> = self
            .roster
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect();
        peers.sort_by_key(|(id, _)| *id);
        peers
    }

    /// Apply one inbound message and report what it meant.
    ///
    /// Never fails: a chat from an unannounced identity is attributed to a
    /// placeholder label rather than rejected, and anything that carries
    /// no new information comes back as [`MirrorEvent::Ignored`].
    pub fn apply(&mut self, message: RelayMessage) -> MirrorEvent {
        match message {
            RelayMessage::AssignId { id } => {
                if self.self_id.is_some() {
                    // The server assigns exactly once; anything after the
                    // first is dropped rather than re-keying the session.
                    return MirrorEvent::Ignored;
                }
                self.self_id = Some(id);
                MirrorEvent::Assigned(id)
            }
            RelayMessage::Username { id, username } => {
                if self.self_id == Some(id) {
                    // Own identity is tracked in `self_id`, never in the
                    // roster.
                    return MirrorEvent::Ignored;
                }
                let renamed_from = self.roster.insert(id, username.clone());
                MirrorEvent::PeerAnnounced {
                    id,
                    username,
                    renamed_from,
                }
            }
            RelayMessage::Chat { id, text } => {
                let label = match self.roster.get(&id) {
                    Some(username) => username.clone(),
                    // Late or missing announce: attribute to a placeholder
                    // instead of failing.
                    None => id.to_string(),
                };
                MirrorEvent::Chat { id, label, text }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn announce(id: u64, name: &str) -> RelayMessage {
        RelayMessage::Username {
            id: ClientId::new(id),
            username: name.to_string(),
        }
    }

    fn chat(id: u64, text: &str) -> RelayMessage {
        RelayMessage::Chat {
            id: ClientId::new(id),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_assignment_sets_self_id_once() {
        let mut mirror = ClientMirror::new();
        assert_eq!(mirror.self_id(), None);

        let event = mirror.apply(RelayMessage::assign_id(ClientId::new(4)));
        assert_eq!(event, MirrorEvent::Assigned(ClientId::new(4)));
        assert_eq!(mirror.self_id(), Some(ClientId::new(4)));

        // A duplicate assignment never re-keys the session.
        let event = mirror.apply(RelayMessage::assign_id(ClientId::new(9)));
        assert_eq!(event, MirrorEvent::Ignored);
        assert_eq!(mirror.self_id(), Some(ClientId::new(4)));
    }

    #[test]
    fn test_peer_announce_populates_roster() {
        let mut mirror = ClientMirror::new();
        mirror.apply(RelayMessage::assign_id(ClientId::new(2)));

        let event = mirror.apply(announce(1, "alice"));
        assert_eq!(
            event,
            MirrorEvent::PeerAnnounced {
                id: ClientId::new(1),
                username: "alice".to_string(),
                renamed_from: None,
            }
        );
        assert_eq!(mirror.username_of(ClientId::new(1)), Some("alice"));
        assert_eq!(mirror.peer_count(), 1);
    }

    #[test]
    fn test_rename_reports_previous_name() {
        let mut mirror = ClientMirror::new();
        mirror.apply(RelayMessage::assign_id(ClientId::new(2)));
        mirror.apply(announce(1, "alice"));

        let event = mirror.apply(announce(1, "alicia"));
        assert_eq!(
            event,
            MirrorEvent::PeerAnnounced {
                id: ClientId::new(1),
                username: "alicia".to_string(),
                renamed_from: Some("alice".to_string()),
            }
        );
        assert_eq!(mirror.peer_count(), 1);
    }

    #[test]
    fn test_own_announce_never_enters_roster() {
        let mut mirror = ClientMirror::new();
        mirror.apply(RelayMessage::assign_id(ClientId::new(2)));

        let event = mirror.apply(announce(2, "me"));
        assert_eq!(event, MirrorEvent::Ignored);
        assert_eq!(mirror.peer_count(), 0);
        assert_eq!(mirror.username_of(ClientId::new(2)), None);
    }

    #[test]
    fn test_chat_resolves_known_sender() {
        let mut mirror = ClientMirror::new();
        mirror.apply(RelayMessage::assign_id(ClientId::new(2)));
        mirror.apply(announce(1, "alice"));

        let event = mirror.apply(chat(1, "hello"));
        assert_eq!(
            event,
            MirrorEvent::Chat {
                id: ClientId::new(1),
                label: "alice".to_string(),
                text: "hello".to_string(),
            }
        );
    }

    #[test]
    fn test_chat_from_unannounced_sender_gets_placeholder() {
        let mut mirror = ClientMirror::new();
        mirror.apply(RelayMessage::assign_id(ClientId::new(2)));

        let event = mirror.apply(chat(7, "who am i"));
        assert_eq!(
            event,
            MirrorEvent::Chat {
                id: ClientId::new(7),
                label: "client-7".to_string(),
                text: "who am i".to_string(),
            }
        );
        // Placeholder attribution never fabricates a roster entry.
        assert_eq!(mirror.peer_count(), 0);
    }

    #[test]
    fn test_peers_ordered_by_identity() {
        let mut mirror = ClientMirror::new();
        mirror.apply(RelayMessage::assign_id(ClientId::new(10)));
        mirror.apply(announce(3, "carol"));
        mirror.apply(announce(1, "alice"));
        mirror.apply(announce(2, "bob"));

        let names: Vec<String> = mirror.peers().into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }
}
