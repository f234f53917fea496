//! Completion providers
//!
//! Each provider is an opaque request/response HTTP client: it takes the
//! full (already trimmed) message list and returns one assistant message.

mod ollama;
mod openai_compat;

use thiserror::Error;

use crate::config::Config;
use crate::conversation::Message;

pub use openai_compat::OpenAICompatConfig;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub enum Provider {
    Ollama(ollama::OllamaProvider),
    OpenAICompat(openai_compat::OpenAICompatProvider),
}

impl Provider {
    pub fn from_name(name: &str, config: &Config) -> Result<Self, ProviderError> {
        match name.to_lowercase().as_str() {
            "ollama" => {
                let url = config
                    .ollama_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".into());
                Ok(Provider::Ollama(ollama::OllamaProvider::new(url)))
            }
            "openai" => {
                let api_key = config
                    .openai_api_key
                    .clone()
                    .ok_or_else(|| ProviderError::NotConfigured("openai".to_string()))?;
                let mut compat = OpenAICompatConfig::openai(api_key);
                if let Some(ref base_url) = config.openai_base_url {
                    compat.base_url = base_url.clone();
                }
                Ok(Provider::OpenAICompat(
                    openai_compat::OpenAICompatProvider::new(compat),
                ))
            }
            _ => Err(ProviderError::UnknownProvider(name.to_string())),
        }
    }

    pub async fn chat(&self, messages: &[Message], model: &str) -> Result<Message, ProviderError> {
        match self {
            Provider::Ollama(p) => p.chat(messages, model).await,
            Provider::OpenAICompat(p) => p.chat(messages, model).await,
        }
    }

    /// Models the provider can serve, for the model-selection UI.
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        match self {
            Provider::Ollama(p) => p.list_models().await,
            Provider::OpenAICompat(p) => p.list_models().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_unknown() {
        let config = Config::for_tests();
        assert!(matches!(
            Provider::from_name("g4f", &config),
            Err(ProviderError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_from_name_openai_requires_key() {
        let config = Config::for_tests();
        assert!(matches!(
            Provider::from_name("openai", &config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_from_name_ollama_has_default_url() {
        let config = Config::for_tests();
        assert!(Provider::from_name("OLLAMA", &config).is_ok());
    }
}
