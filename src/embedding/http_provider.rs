use super::{EmbeddingProvider, check_dimensions};
use crate::config::{ApiKey, EmbeddingConfig};
use crate::error::{EmbeddingError, truncate_body};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Longest slice of an error response body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Embedding provider for OpenAI-compatible `/embeddings` endpoints
///
/// Works against DashScope's compatible mode out of the box and also accepts
/// the DashScope-native `output.embeddings` response shape.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    timeout_secs: u64,
    api_key: ApiKey,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimension: config.dimension,
            batch_size: config.batch_size.max(1),
            timeout_secs: config.timeout_secs,
            api_key: config.api_key.clone(),
        })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dimension,
            "encoding_format": "float",
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body: truncate_body(&text, MAX_ERROR_BODY_CHARS),
            });
        }

        parse_embeddings(&text, texts.len())
    }

    fn transport_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout(self.timeout_secs)
        } else {
            EmbeddingError::Request(err.without_url().to_string())
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if self.api_key.is_empty() {
            return Err(EmbeddingError::MissingCredentials);
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!(
                "Embedding batch {} ({} texts) with {}",
                i + 1,
                batch.len(),
                self.model
            );
            vectors.extend(self.request_batch(batch).await?);
        }

        check_dimensions(&vectors, self.dimension)?;
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Option<Vec<EmbeddingItem>>,
    #[serde(default)]
    output: Option<NativeOutput>,
}

#[derive(Debug, Deserialize)]
struct NativeOutput {
    #[serde(default)]
    embeddings: Option<Vec<EmbeddingItem>>,
    #[serde(default)]
    data: Option<Vec<EmbeddingItem>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default, alias = "text_index")]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Parse either response shape into vectors ordered like the inputs
fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::MalformedResponse(e.to_string()))?;

    let mut items = response
        .data
        .or_else(|| response.output.and_then(|o| o.embeddings.or(o.data)))
        .ok_or_else(|| {
            EmbeddingError::MalformedResponse("missing data or output.embeddings".to_string())
        })?;

    if items.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: items.len(),
        });
    }

    if items.iter().all(|item| item.index.is_some()) {
        items.sort_by_key(|item| item.index);
    }

    Ok(items.into_iter().map(|item| item.embedding).collect())
}
