//! Persona templates and system prompts
//!
//! Built-in personas cover the common cases; custom personas can be loaded
//! from TOML files at runtime.
//!
//! # Example Persona File
//!
//! ```toml
//! [persona]
//! name = "Study Buddy"
//! description = "Patient explainer for students"
//!
//! [system_prompt]
//! content = """
//! You are a patient study companion...
//! """
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

/// A persona template loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub persona: PersonaInfo,
    pub system_prompt: SystemPrompt,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaInfo {
    pub name: String,

    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPrompt {
    pub content: String,
}

/// Loads and caches persona templates from a directory of TOML files.
#[derive(Debug)]
pub struct PromptManager {
    prompts_dir: PathBuf,
    cache: HashMap<String, PromptTemplate>,
}

impl PromptManager {
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Load a template by name (file name without extension), caching it.
    pub async fn load(&mut self, name: &str) -> Result<&PromptTemplate, PromptError> {
        if !self.cache.contains_key(name) {
            let path = self.prompts_dir.join(format!("{}.toml", name));
            let template = Self::load_from_file(&path).await?;
            self.cache.insert(name.to_string(), template);
        }
        Ok(self.cache.get(name).expect("just inserted"))
    }

    pub async fn load_from_file(path: &Path) -> Result<PromptTemplate, PromptError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| PromptError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| PromptError::Parse(e.to_string()))
    }

    /// List persona names available in the directory.
    pub async fn list_available(&self) -> Result<Vec<String>, PromptError> {
        let mut prompts = Vec::new();

        let mut entries = fs::read_dir(&self.prompts_dir)
            .await
            .map_err(|e| PromptError::Io(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PromptError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                if let Some(stem) = path.file_stem() {
                    prompts.push(stem.to_string_lossy().to_string());
                }
            }
        }

        Ok(prompts)
    }

}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Built-in personas that don't require files
pub mod builtin {
    /// Default companion prompt
    pub const DEFAULT: &str =
        "You are ChAI, a helpful AI assistant with memory. Be warm, clear, and concise.";

    /// Short-answer persona
    pub const CONCISE: &str = "You are ChAI, a helpful AI assistant with memory. Answer in as few words as accuracy allows. No filler, no restating the question.";

    /// Teaching persona
    pub const TUTOR: &str = r#"You are ChAI, a patient tutor with memory of the conversation so far.

When explaining:
1. Start from what the student already said they know
2. Use one concrete example per concept
3. Check understanding with a short follow-up question

Never dump a full solution when a hint will do."#;
}
