//! Application configuration

pub mod prompts;

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use prompts::{builtin as prompts_builtin, PromptManager, PromptTemplate};

use crate::core::DEFAULT_BUDGET;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub ollama_url: Option<String>,
    /// Transcript memory budget, in characters of message content
    pub memory_budget: usize,
    /// Default system prompt for new sessions
    pub system_prompt: Option<String>,
    /// Directory of persona TOML files
    pub prompts_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            ollama_url: env::var("OLLAMA_URL").ok(),
            memory_budget: env::var("CHAI_MEMORY_BUDGET")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(DEFAULT_BUDGET),
            system_prompt: env::var("CHAI_SYSTEM_PROMPT").ok(),
            prompts_dir: env::var("CHAI_PROMPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./prompts")),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: None,
            memory_budget: DEFAULT_BUDGET,
            system_prompt: None,
            prompts_dir: PathBuf::from("/nonexistent/prompts"),
        }
    }
}
