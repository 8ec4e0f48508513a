//! Session store: ordered, capped turn history per session.

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Duration;

use serde::Serialize;
use switchyard_core::{Capability, SessionId, Turn};
use switchyard_resilience::TtlCache;
use tokio::sync::Mutex;
use tracing::debug;

const LOCK_STRIPES: usize = 64;

/// Turn history keyed by session id.
///
/// Backed by a [`TtlCache`], so idle sessions expire and the number of live
/// sessions is bounded. Writers to the same session are serialized through
/// one of a fixed set of striped locks; sessions hashing to other stripes
/// never wait on each other.
pub struct SessionStore {
    sessions: TtlCache<SessionId, Vec<Turn>>,
    stripes: Vec<Mutex<()>>,
    max_turns: usize,
}

/// Snapshot returned by [`SessionStore::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_count: usize,
    pub max_sessions: usize,
    pub ttl_secs: u64,
    /// Turn count per live session.
    pub sessions: BTreeMap<SessionId, usize>,
}

impl SessionStore {
    pub fn new(max_sessions: usize, ttl: Duration, max_turns: usize) -> Self {
        Self {
            sessions: TtlCache::new(max_sessions, ttl),
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            max_turns: max_turns.max(1),
        }
    }

    fn stripe(&self, session_id: SessionId) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        session_id.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }

    /// Append a turn, keeping only the newest `max_turns`. Refreshes the session's TTL.
    pub async fn append_turn(&self, session_id: SessionId, turn: Turn) {
        let _guard = self.stripe(session_id).lock().await;
        let mut turns = self.sessions.get(&session_id).unwrap_or_default();
        turns.push(turn);
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }
        debug!(session_id, turns = turns.len(), "Turn appended");
        self.sessions.set(session_id, turns);
    }

    /// The newest `limit` turns, oldest first.
    pub async fn get_turns(&self, session_id: SessionId, limit: usize) -> Vec<Turn> {
        let _guard = self.stripe(session_id).lock().await;
        let mut turns = self.sessions.get(&session_id).unwrap_or_default();
        if turns.len() > limit {
            let excess = turns.len() - limit;
            turns.drain(..excess);
        }
        turns
    }

    /// Capability of the most recent turn that delegated, if any.
    pub async fn get_active_capability(&self, session_id: SessionId) -> Option<Capability> {
        let _guard = self.stripe(session_id).lock().await;
        self.sessions
            .get(&session_id)?
            .iter()
            .rev()
            .find_map(|t| t.delegated_capability)
    }

    /// Forget a session. Returns whether it existed.
    pub async fn clear(&self, session_id: SessionId) -> bool {
        let _guard = self.stripe(session_id).lock().await;
        let existed = self.sessions.remove(&session_id).is_some();
        if existed {
            debug!(session_id, "Session cleared");
        }
        existed
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn stats(&self) -> SessionStats {
        let sessions: BTreeMap<SessionId, usize> = self
            .sessions
            .map_live(|id, turns| (*id, turns.len()))
            .into_iter()
            .collect();
        SessionStats {
            session_count: sessions.len(),
            max_sessions: self.sessions.max_entries(),
            ttl_secs: self.sessions.ttl().as_secs(),
            sessions,
        }
    }
}
