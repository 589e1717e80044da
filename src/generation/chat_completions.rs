use super::{GenerationProvider, GenerationResult, is_placeholder_key};
use crate::config::{ApiKey, GenerationConfig};
use crate::error::{GenerationError, truncate_body};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::{Duration, Instant};

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Instruction sent as the system message of every request
pub const SYSTEM_PROMPT: &str = "You are a course teaching assistant. Answer the question using only \
the provided context. If the context is not sufficient, say clearly that the answer cannot be found \
in the material. Keep the answer concise and well structured, and end it with the citation markers \
of the passages you used, such as [1][2].";

/// Chat completions client for DeepSeek and other OpenAI-compatible services
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
    api_key: ApiKey,
}

impl ChatCompletionsProvider {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            api_key: config.api_key.clone(),
        })
    }

    fn request_body(&self, question: &str, context: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_message(question, context)},
            ],
            "temperature": self.temperature,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout_secs)
        } else {
            GenerationError::Request(err.without_url().to_string())
        }
    }
}

fn user_message(question: &str, context: &str) -> String {
    format!("Question: {}\n\nContext:\n{}", question, context)
}

#[async_trait]
impl GenerationProvider for ChatCompletionsProvider {
    async fn generate(
        &self,
        question: &str,
        context: &str,
    ) -> Result<GenerationResult, GenerationError> {
        if is_placeholder_key(self.api_key.expose()) {
            return Err(GenerationError::MissingCredentials);
        }

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&self.request_body(question, context))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            tracing::warn!("Generation service returned HTTP {}", status.as_u16());
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate_body(&text, MAX_ERROR_BODY_CHARS),
            });
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        let answer = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GenerationError::MalformedResponse(
                    "missing choices[0].message.content".to_string(),
                )
            })?
            .trim()
            .to_string();

        Ok(GenerationResult {
            answer,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
