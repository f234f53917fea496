//! Session-scoped conversation memory
//!
//! Two concerns live here: the trim policy that keeps a transcript's
//! aggregate content under a character budget, and the in-memory store that
//! owns one transcript per active session. History is deliberately
//! ephemeral; a session's transcript is gone when the session is deleted
//! or the process exits.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::conversation::{Message, Transcript};

/// Default transcript budget, in characters of message content.
pub const DEFAULT_BUDGET: usize = 4000;

/// Keeps a transcript under a character budget by evicting the oldest
/// exchanges, whole units at a time.
///
/// The budget is a soft target: the system message and the most recent
/// exchange are never evicted, so a single oversized turn survives until a
/// newer one displaces it. Nothing is ever truncated mid-message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryPolicy {
    pub max_chars: usize,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_BUDGET,
        }
    }
}

impl MemoryPolicy {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Trim `transcript` in place until its total content size fits the
    /// budget or only one exchange remains. Returns the number of exchanges
    /// evicted. Never fails, never suspends.
    pub fn trim(&self, transcript: &mut Transcript) -> usize {
        let mut evicted = 0;
        while transcript.total_chars() > self.max_chars && transcript.exchanges().len() > 1 {
            transcript.evict_oldest();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(
                evicted,
                remaining_chars = transcript.total_chars(),
                budget = self.max_chars,
                "trimmed transcript"
            );
        }
        evicted
    }
}

/// One active chat session and its exclusively-owned transcript.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub transcript: Transcript,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    fn new(system_prompt: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transcript: Transcript::new(system_prompt),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Listing view of a session, without the transcript body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// In-memory session registry shared across request handlers.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with the given system prompt and return its id.
    pub async fn create(&self, system_prompt: &str) -> Uuid {
        let session = Session::new(system_prompt);
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        tracing::debug!(%id, "created session");
        id
    }

    /// Run `f` against the session's mutable state. Returns `None` if the
    /// session does not exist.
    pub async fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Option<T> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&id)?;
        let out = f(session);
        session.updated_at = Utc::now();
        Some(out)
    }

    /// Flattened transcript of a session, oldest first.
    pub async fn messages(&self, id: Uuid) -> Option<Vec<Message>> {
        let sessions = self.sessions.read().await;
        sessions.get(&id).map(|s| s.transcript.messages())
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .map(|s| SessionSummary {
                id: s.id,
                created_at: s.created_at,
                updated_at: s.updated_at,
                message_count: s.transcript.len(),
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Delete a session and its transcript. Returns whether it existed.
    pub async fn remove(&self, id: Uuid) -> bool {
        let existed = self.sessions.write().await.remove(&id).is_some();
        if existed {
            tracing::debug!(%id, "deleted session");
        }
        existed
    }
}
