//! Answer generation from a question and its retrieved context

mod chat_completions;

pub use chat_completions::{ChatCompletionsProvider, SYSTEM_PROMPT};

use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Model answer plus the time the service took to produce it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub answer: String,
    pub latency_ms: u64,
}

/// Trait for text generation services
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Answer `question` using only the numbered `context` block
    async fn generate(
        &self,
        question: &str,
        context: &str,
    ) -> Result<GenerationResult, GenerationError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Keys that ship in sample env files and must not be sent upstream
const PLACEHOLDER_KEYS: &[&str] = &["your_deepseek_key", "placeholder"];

/// True when the key is empty or one of the known placeholders
pub fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim().to_lowercase();
    key.is_empty() || PLACEHOLDER_KEYS.contains(&key.as_str())
}
