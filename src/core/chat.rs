//! Chat engine
//!
//! One turn of conversation runs through here:
//! 1. Find or create the session for the request
//! 2. Append the user message to the transcript
//! 3. Trim the transcript to the memory budget
//! 4. Send the trimmed transcript to the completion provider
//! 5. Append the reply (or a warning string if the call failed)
//! 6. Return the reply to the caller

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{prompts_builtin, Config, PromptManager};
use crate::core::memory::{MemoryPolicy, SessionStore};
use crate::providers::{Provider, ProviderError};

/// Request for one chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Session to continue; omit to start a new one
    #[serde(default)]
    pub session_id: Option<Uuid>,

    /// System prompt for a new session (takes precedence over persona)
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Persona for a new session: built-in ("default", "concise", "tutor")
    /// or the name of a TOML file in the prompts directory
    #[serde(default)]
    pub persona: Option<String>,

    /// Provider to use (defaults to "ollama")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model to use (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

/// Response for one chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant's reply
    pub message: String,

    /// Session id for continuation
    pub session_id: Uuid,

    /// Exchanges evicted from memory to fit the budget this turn
    #[serde(default, skip_serializing_if = "is_zero")]
    pub evicted_exchanges: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Errors from the chat engine
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Unknown session: {0}")]
    UnknownSession(Uuid),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// The core chat engine
pub struct ChatEngine {
    config: Config,
    sessions: SessionStore,
    policy: MemoryPolicy,
    personas: Mutex<PromptManager>,
}

impl ChatEngine {
    pub fn new(config: Config) -> Self {
        let policy = MemoryPolicy::new(config.memory_budget);
        let personas = Mutex::new(PromptManager::new(config.prompts_dir.clone()));
        Self {
            config,
            sessions: SessionStore::new(),
            policy,
            personas,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Persona names a new session can be created with: the built-ins plus
    /// any TOML files in the prompts directory.
    pub async fn list_personas(&self) -> Vec<String> {
        let mut names: Vec<String> = ["default", "concise", "tutor"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Ok(custom) = self.personas.lock().await.list_available().await {
            names.extend(custom);
        }
        names
    }

    /// Resolve the system prompt for a new session:
    /// explicit override > built-in persona > persona file > configured
    /// default > built-in default.
    async fn resolve_system_prompt(&self, request: &ChatRequest) -> String {
        if let Some(ref prompt) = request.system_prompt {
            return prompt.clone();
        }

        if let Some(ref persona) = request.persona {
            if let Some(prompt) = builtin_persona(persona) {
                return prompt.to_string();
            }
            match self.personas.lock().await.load(persona).await {
                Ok(template) => return template.system_prompt.content.clone(),
                Err(e) => {
                    tracing::warn!(persona = %persona, error = %e, "persona not found");
                    return format!(
                        "{}\n\nNote: Unknown persona '{}', using default.",
                        prompts_builtin::DEFAULT,
                        persona
                    );
                }
            }
        }

        self.config
            .system_prompt
            .clone()
            .unwrap_or_else(|| prompts_builtin::DEFAULT.to_string())
    }

    /// Run one chat turn.
    ///
    /// Provider failures do not abort the turn: per the original ChAI
    /// behavior, the failure is rendered as a warning string, stored as the
    /// assistant reply, and returned like any other response.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        // Resolve the provider up front so a bad provider name fails the
        // request before the transcript is touched.
        let provider = Provider::from_name(&request.provider, &self.config)?;

        let session_id = match request.session_id {
            Some(id) => id,
            None => {
                let prompt = self.resolve_system_prompt(&request).await;
                self.sessions.create(&prompt).await
            }
        };

        // Append the user message and trim before the completion call, so
        // the provider sees the budgeted transcript. The lock is not held
        // across the network call.
        let (messages, evicted) = self
            .sessions
            .with_session(session_id, |session| {
                session.transcript.push_user(&request.message);
                let evicted = self.policy.trim(&mut session.transcript);
                (session.transcript.messages(), evicted)
            })
            .await
            .ok_or(ChatError::UnknownSession(session_id))?;

        let reply = match provider.chat(&messages, &request.model).await {
            Ok(message) => message.content,
            Err(e) => {
                tracing::warn!(provider = %request.provider, error = %e, "completion call failed");
                warning_message(&e)
            }
        };

        self.sessions
            .with_session(session_id, |session| {
                session.transcript.push_assistant(&reply);
            })
            .await
            .ok_or(ChatError::UnknownSession(session_id))?;

        Ok(ChatResponse {
            message: reply,
            session_id,
            evicted_exchanges: evicted,
        })
    }
}

/// Render a completion failure as a user-visible reply string.
fn warning_message(err: &ProviderError) -> String {
    format!("⚠️ Error: {err}")
}

fn builtin_persona(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "default" => Some(prompts_builtin::DEFAULT),
        "concise" => Some(prompts_builtin::CONCISE),
        "tutor" => Some(prompts_builtin::TUTOR),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            session_id: None,
            system_prompt: None,
            persona: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
        }
    }

    /// Engine whose completion calls fail fast (closed port), so turns
    /// complete with warning replies and no network.
    fn offline_engine() -> ChatEngine {
        let mut config = Config::for_tests();
        config.ollama_url = Some("http://127.0.0.1:1".to_string());
        ChatEngine::new(config)
    }

    #[test]
    fn test_warning_message_carries_marker() {
        let err = ProviderError::NotConfigured("openai".to_string());
        let rendered = warning_message(&err);
        assert!(rendered.starts_with("⚠️ Error: "));
        assert!(rendered.contains("openai"));
    }

    #[test]
    fn test_builtin_persona_lookup() {
        assert_eq!(builtin_persona("concise"), Some(prompts_builtin::CONCISE));
        assert_eq!(builtin_persona("TUTOR"), Some(prompts_builtin::TUTOR));
        assert_eq!(builtin_persona("pirate"), None);
    }

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(request.provider, "ollama");
        assert_eq!(request.model, "llama3.2");
        assert!(request.session_id.is_none());
        assert!(request.persona.is_none());
    }

    #[tokio::test]
    async fn test_chat_unknown_session_is_rejected() {
        let engine = ChatEngine::new(Config::for_tests());
        let mut request = request_with("hello");
        request.session_id = Some(Uuid::new_v4());

        match engine.chat(request).await {
            Err(ChatError::UnknownSession(_)) => {}
            other => panic!("expected UnknownSession, got {:?}", other.map(|r| r.message)),
        }
    }

    #[tokio::test]
    async fn test_chat_unknown_provider_is_request_error() {
        let engine = ChatEngine::new(Config::for_tests());
        let mut request = request_with("hello");
        request.provider = "g4f".to_string();

        // Provider resolution happens before the transcript is touched; an
        // unknown provider name is a request error, not a completion failure.
        assert!(matches!(
            engine.chat(request).await,
            Err(ChatError::Provider(ProviderError::UnknownProvider(_)))
        ));
    }

    #[tokio::test]
    async fn test_chat_failure_is_stored_as_assistant_reply() {
        let engine = offline_engine();

        let response = engine.chat(request_with("hello")).await.unwrap();
        assert!(response.message.starts_with("⚠️ Error: "));

        let messages = engine
            .sessions()
            .messages(response.session_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].content, response.message);
    }

    #[tokio::test]
    async fn test_chat_session_continues_across_turns() {
        let engine = offline_engine();

        let first = engine.chat(request_with("one")).await.unwrap();
        let mut second = request_with("two");
        second.session_id = Some(first.session_id);
        let second = engine.chat(second).await.unwrap();

        assert_eq!(first.session_id, second.session_id);
        let messages = engine
            .sessions()
            .messages(first.session_id)
            .await
            .unwrap();
        // sys + two user/assistant exchanges
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[1].content, "one");
        assert_eq!(messages[3].content, "two");
    }

    #[tokio::test]
    async fn test_chat_trims_before_completion_call() {
        let mut config = Config::for_tests();
        config.ollama_url = Some("http://127.0.0.1:1".to_string());
        config.memory_budget = 200;
        let engine = ChatEngine::new(config);

        let first = engine.chat(request_with(&"x".repeat(150))).await.unwrap();
        let mut second = request_with(&"y".repeat(150));
        second.session_id = Some(first.session_id);
        let second = engine.chat(second).await.unwrap();

        // The first exchange was evicted to make room for the second.
        assert_eq!(second.evicted_exchanges, 1);
        let messages = engine
            .sessions()
            .messages(second.session_id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages[1].content.starts_with('y'));
    }

    #[tokio::test]
    async fn test_chat_builtin_persona_sets_system_prompt() {
        let engine = offline_engine();

        let mut request = request_with("hello");
        request.persona = Some("concise".to_string());
        let response = engine.chat(request).await.unwrap();

        let messages = engine
            .sessions()
            .messages(response.session_id)
            .await
            .unwrap();
        assert_eq!(messages[0].content, prompts_builtin::CONCISE);
    }

    #[tokio::test]
    async fn test_chat_file_persona_loaded_from_prompts_dir() {
        let dir = std::env::temp_dir().join(format!("chai-personas-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("pirate.toml"),
            "[persona]\nname = \"Pirate\"\n\n[system_prompt]\ncontent = \"Ye be ChAI.\"\n",
        )
        .unwrap();

        let mut config = Config::for_tests();
        config.ollama_url = Some("http://127.0.0.1:1".to_string());
        config.prompts_dir = dir.clone();
        let engine = ChatEngine::new(config);

        let mut request = request_with("ahoy");
        request.persona = Some("pirate".to_string());
        let response = engine.chat(request).await.unwrap();

        let messages = engine
            .sessions()
            .messages(response.session_id)
            .await
            .unwrap();
        assert_eq!(messages[0].content, "Ye be ChAI.");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_list_personas_without_prompts_dir_is_builtins_only() {
        let engine = ChatEngine::new(Config::for_tests());
        let personas = engine.list_personas().await;
        assert_eq!(personas, vec!["default", "concise", "tutor"]);
    }

    #[tokio::test]
    async fn test_chat_unknown_persona_falls_back_with_note() {
        let engine = offline_engine();

        let mut request = request_with("hello");
        request.persona = Some("astronaut".to_string());
        let response = engine.chat(request).await.unwrap();

        let messages = engine
            .sessions()
            .messages(response.session_id)
            .await
            .unwrap();
        assert!(messages[0].content.starts_with(prompts_builtin::DEFAULT));
        assert!(messages[0].content.contains("astronaut"));
    }
}
