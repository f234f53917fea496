//! Core chat components
//!
//! Conversation orchestration and session-scoped memory management.

mod chat;
mod memory;

pub use chat::{ChatEngine, ChatError, ChatRequest, ChatResponse};
pub use memory::{MemoryPolicy, SessionStore, SessionSummary, DEFAULT_BUDGET};
