//! Fake providers for integration tests

use async_trait::async_trait;
use easy_rag::embedding::EmbeddingProvider;
use easy_rag::generation::{GenerationProvider, GenerationResult};
use easy_rag::{Config, EmbeddingError, GenerationError};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const DIM: usize = 256;

/// Embeds text as normalized counts of lower-cased words hashed into `DIM` buckets
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn embed(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(5381usize, |h, b| h.wrapping_mul(33) ^ b as usize);
            v[bucket % DIM] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::embed(t)).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Answers by quoting the first line of its context
#[derive(Default)]
pub struct EchoGenerator {
    pub contexts: Mutex<Vec<String>>,
}

#[async_trait]
impl GenerationProvider for EchoGenerator {
    async fn generate(
        &self,
        _question: &str,
        context: &str,
    ) -> Result<GenerationResult, GenerationError> {
        self.contexts.lock().unwrap().push(context.to_string());
        let first = context.lines().next().unwrap_or_default();
        Ok(GenerationResult {
            answer: format!("According to {}", first),
            latency_ms: 5,
        })
    }

    fn model_name(&self) -> &str {
        "echo-test"
    }
}

pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.storage.raw_dir = root.join("raw");
    config.storage.index_dir = root.join("index");
    config.storage.lock_timeout_secs = 2;
    config.embedding.dimension = DIM;
    config
}
