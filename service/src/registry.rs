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

//! Session registry implementation
//!
//! The SessionRegistry owns identity allocation and the authoritative
//! roster. It is an owned instance handed to the Router, never a process
//! global. Identity allocation is a monotonic counter: an identity, once
//! allocated, is never handed out again for the lifetime of the process,
//! so a reconnecting client can never collide with a still-connected one.

use crate::{RelayError, Result, SessionState};
use dashmap::DashMap;
use parley_codec::ClientId;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::ClientRecord;

/// One live session: the username is `None` until the client announces it.
#[derive(Debug)]
struct Session {
    username: Option<String>,
}

/// Authoritative identity allocator and roster.
///
/// Mutation happens per entry under the map's own sharding, which gives
/// the required contract of at-most-one in-flight mutation per record.
#[derive(Debug)]
pub struct SessionRegistry {
    /// Next identity (monotonically increasing, never reused)
    next_id: AtomicU64,
    /// Live sessions keyed by identity
    sessions: DashMap<ClientId, Session>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create an empty registry. Identities start at 1.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: DashMap::new(),
        }
    }

    /// Allocate a fresh identity, strictly greater than every identity
    /// allocated before it during this process's lifetime.
    pub fn allocate(&self) -> ClientId {
        ClientId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Bind an allocated identity as a live session.
    pub fn insert(&self, id: ClientId) {
        self.sessions.insert(id, Session { username: None });
    }

    /// Unbind an identity and destroy its roster record.
    ///
    /// Returns `true` if the identity was live. Nothing retains the record
    /// afterwards; the identity itself is never reallocated.
    pub fn remove(&self, id: ClientId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Create or update the username record for a live identity.
    ///
    /// Returns the previous username on rename. Referencing an identity
    /// that was never allocated or has been forgotten fails with
    /// [`RelayError::UnknownIdentity`]; callers treat that like any other
    /// malformed message and drop it.
    pub fn set_username(&self, id: ClientId, username: String) -> Result<Option<String>> {
        match self.sessions.get_mut(&id) {
            Some(mut session) => Ok(session.username.replace(username)),
            None => Err(RelayError::UnknownIdentity(id)),
        }
    }

    /// Get the username announced for an identity, if any.
    pub fn username(&self, id: ClientId) -> Option<String> {
        self.sessions.get(&id).and_then(|s| s.username.clone())
    }

    /// Lifecycle state of an identity.
    pub fn state(&self, id: ClientId) -> SessionState {
        match self.sessions.get(&id) {
            Some(session) if session.username.is_some() => SessionState::Identified,
            Some(_) => SessionState::Pending,
            None => SessionState::Closed,
        }
    }

    /// Check whether an identity is live.
    pub fn contains(&self, id: ClientId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check whether the registry holds no live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Immutable copy of the current roster, for bootstrapping a newly
    /// joined client. Only identified sessions appear; ordered by identity
    /// so the bootstrap sequence is deterministic.
    pub fn snapshot(&self) -> Vec<ClientRecord> {
        let mut records: Vec<ClientRecord> = self
            .sessions
            .iter()
            .filter_map(|entry| {
                entry.value().username.as_ref().map(|username| ClientRecord {
                    id: *entry.key(),
                    username: username.clone(),
                })
            })
            .collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_strictly_monotonic() {
        let registry = SessionRegistry::new();
        let mut previous = 0;
        for _ in 0..100 {
            let id = registry.allocate().as_u64();
            assert!(id > previous);
            previous = id;
        }
    }

    #[test]
    fn test_identity_never_reused_after_remove() {
        let registry = SessionRegistry::new();
        let first = registry.allocate();
        registry.insert(first);
        registry.remove(first);

        let second = registry.allocate();
        assert!(second > first);
    }

    #[test]
    fn test_set_username_creates_and_renames() {
        let registry = SessionRegistry::new();
        let id = registry.allocate();
        registry.insert(id);

        assert_eq!(registry.state(id), SessionState::Pending);
        assert_eq!(registry.set_username(id, "alice".to_string()).unwrap(), None);
        assert_eq!(registry.state(id), SessionState::Identified);
        assert_eq!(registry.username(id), Some("alice".to_string()));

        // Re-announcement is a rename and reports the previous name.
        assert_eq!(
            registry.set_username(id, "alicia".to_string()).unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(registry.username(id), Some("alicia".to_string()));
    }

    #[test]
    fn test_set_username_unknown_identity() {
        let registry = SessionRegistry::new();
        let never_allocated = ClientId::new(99);
        assert!(matches!(
            registry.set_username(never_allocated, "ghost".to_string()),
            Err(RelayError::UnknownIdentity(id)) if id == never_allocated
        ));

        let forgotten = registry.allocate();
        registry.insert(forgotten);
        registry.remove(forgotten);
        assert!(matches!(
            registry.set_username(forgotten, "ghost".to_string()),
            Err(RelayError::UnknownIdentity(_))
        ));
    }

    #[test]
    fn test_remove_destroys_record() {
        let registry = SessionRegistry::new();
        let id = registry.allocate();
        registry.insert(id);
        registry.set_username(id, "bob".to_string()).unwrap();

        assert!(registry.remove(id));
        assert!(!registry.contains(id));
        assert_eq!(registry.username(id), None);
        assert_eq!(registry.state(id), SessionState::Closed);
        assert!(!registry.remove(id));
    }

    #[test]
    fn test_snapshot_contains_only_identified_sessions() {
        let registry = SessionRegistry::new();

        let identified = registry.allocate();
        registry.insert(identified);
        registry
            .set_username(identified, "alice".to_string())
            .unwrap();

        let pending = registry.allocate();
        registry.insert(pending);

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot,
            vec![ClientRecord {
                id: identified,
                username: "alice".to_string(),
            }]
        );
    }

    #[test]
    fn test_snapshot_is_ordered_by_identity() {
        let registry = SessionRegistry::new();
        let mut ids = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let id = registry.allocate();
            registry.insert(id);
            registry.set_username(id, name.to_string()).unwrap();
            ids.push(id);
        }

        let snapshot = registry.snapshot();
        let snapshot_ids: Vec<ClientId> = snapshot.iter().map(|r| r.id).collect();
        assert_eq!(snapshot_ids, ids);
    }
}
