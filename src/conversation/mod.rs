//! Conversation types and transcript state
//!
//! A transcript is the system prompt plus an ordered list of exchanges,
//! where an exchange is a user message paired with the assistant reply it
//! produced. Eviction (see `core::memory`) always removes whole exchanges,
//! so a trim pass can never split a user message from its reply.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Content size in Unicode scalar values, the unit the memory budget
    /// is expressed in.
    pub fn chars(&self) -> usize {
        self.content.chars().count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversational turn: a user message and, once the completion call
/// returns, the assistant reply. The assistant half is `None` while the
/// turn is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub user: Message,
    pub assistant: Option<Message>,
}

impl Exchange {
    fn open(user: Message) -> Self {
        Self {
            user,
            assistant: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.assistant.is_none()
    }

    pub fn chars(&self) -> usize {
        self.user.chars() + self.assistant.as_ref().map_or(0, Message::chars)
    }
}

/// One session's conversation: the system message at the head, then the
/// exchanges in order. Owned exclusively by the session that created it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    system: Message,
    exchanges: Vec<Exchange>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system: Message::system(system_prompt),
            exchanges: Vec::new(),
        }
    }

    pub fn system(&self) -> &Message {
        &self.system
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Open a new exchange with a user message. If the previous exchange is
    /// still open (no reply ever arrived), it stays in the transcript as an
    /// incomplete unit and is evicted like any other.
    pub fn push_user(&mut self, content: impl Into<String>) {
        if self.exchanges.last().is_some_and(Exchange::is_open) {
            tracing::warn!("user message appended while previous exchange still open");
        }
        self.exchanges.push(Exchange::open(Message::user(content)));
    }

    /// Complete the open exchange with the assistant reply. A reply with no
    /// open exchange has no turn of its own; it is folded into the previous
    /// reply rather than given an invented user half.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        let content = content.into();
        match self.exchanges.last_mut() {
            Some(exchange) if exchange.is_open() => {
                exchange.assistant = Some(Message::assistant(content));
            }
            Some(exchange) => {
                tracing::warn!("assistant message with no open exchange, merging");
                if let Some(reply) = exchange.assistant.as_mut() {
                    reply.content.push('\n');
                    reply.content.push_str(&content);
                }
            }
            None => {
                tracing::warn!("assistant message on empty transcript, dropping");
            }
        }
    }

    /// Remove the oldest exchange. Callers enforce the floor: the system
    /// message and the most recent exchange are never evicted.
    pub(crate) fn evict_oldest(&mut self) -> Option<Exchange> {
        if self.exchanges.is_empty() {
            None
        } else {
            Some(self.exchanges.remove(0))
        }
    }

    /// Flattened message count: system message plus both halves of every
    /// exchange that has them.
    pub fn len(&self) -> usize {
        1 + self
            .exchanges
            .iter()
            .map(|e| if e.is_open() { 1 } else { 2 })
            .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Total content size across every message, in characters.
    pub fn total_chars(&self) -> usize {
        self.system.chars() + self.exchanges.iter().map(Exchange::chars).sum::<usize>()
    }

    /// Flattened view in wire order, for the completion provider.
    pub fn messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.len());
        out.push(self.system.clone());
        for exchange in &self.exchanges {
            out.push(exchange.user.clone());
            if let Some(ref reply) = exchange.assistant {
                out.push(reply.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transcript_holds_only_system() {
        let t = Transcript::new("You are ChAI.");
        assert_eq!(t.len(), 1);
        assert!(t.is_empty());
        assert_eq!(t.system().content, "You are ChAI.");
        assert_eq!(t.messages().len(), 1);
    }

    #[test]
    fn test_user_then_assistant_forms_one_exchange() {
        let mut t = Transcript::new("sys");
        t.push_user("hello");
        t.push_assistant("hi there");

        assert_eq!(t.exchanges().len(), 1);
        assert!(!t.exchanges()[0].is_open());
        assert_eq!(t.len(), 3);

        let messages = t.messages();
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, "hi there");
    }

    #[test]
    fn test_open_exchange_flattens_without_reply() {
        let mut t = Transcript::new("sys");
        t.push_user("anyone home?");
        assert_eq!(t.len(), 2);
        assert_eq!(t.messages().len(), 2);
        assert!(t.exchanges()[0].is_open());
    }

    #[test]
    fn test_consecutive_users_leave_incomplete_exchange() {
        let mut t = Transcript::new("sys");
        t.push_user("first");
        t.push_user("second");

        assert_eq!(t.exchanges().len(), 2);
        assert!(t.exchanges()[0].is_open());
        assert!(t.exchanges()[1].is_open());
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_orphan_assistant_merges_into_previous_reply() {
        let mut t = Transcript::new("sys");
        t.push_user("q");
        t.push_assistant("a1");
        t.push_assistant("a2");

        assert_eq!(t.exchanges().len(), 1);
        let reply = t.exchanges()[0].assistant.as_ref().unwrap();
        assert_eq!(reply.content, "a1\na2");
    }

    #[test]
    fn test_total_chars_counts_scalar_values() {
        let mut t = Transcript::new("ab");
        t.push_user("héllo");
        t.push_assistant("ok");
        // 2 + 5 + 2, not byte length
        assert_eq!(t.total_chars(), 9);
    }

    #[test]
    fn test_evict_oldest_removes_front_exchange() {
        let mut t = Transcript::new("sys");
        t.push_user("old");
        t.push_assistant("old reply");
        t.push_user("new");
        t.push_assistant("new reply");

        let evicted = t.evict_oldest().unwrap();
        assert_eq!(evicted.user.content, "old");
        assert_eq!(t.exchanges().len(), 1);
        assert_eq!(t.exchanges()[0].user.content, "new");
    }
}
