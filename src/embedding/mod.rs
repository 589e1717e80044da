mod http_provider;

pub use http_provider::HttpEmbeddingProvider;

use crate::error::EmbeddingError;
use async_trait::async_trait;

/// Trait for embedding generation
///
/// Implementations must return exactly one vector per input, in input order,
/// each of length [`EmbeddingProvider::dimension`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query string
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Check that every vector has the expected dimension
pub(crate) fn check_dimensions(
    vectors: &[Vec<f32>],
    expected: usize,
) -> Result<(), EmbeddingError> {
    match vectors.iter().find(|v| v.len() != expected) {
        Some(bad) => Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}
