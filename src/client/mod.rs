//! Core library client for easy-rag
//!
//! [`RagClient`] runs the two pipelines: ingest (load, chunk, embed, publish
//! an index) and ask (retrieve, budget, generate). It is cheap to clone and
//! safe to share between tasks.

mod fs_lock;
mod index_lock;

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, HttpEmbeddingProvider, check_dimensions};
use crate::error::{EmbeddingError, IngestError, RagError, ValidationError};
use crate::generation::{ChatCompletionsProvider, GenerationProvider};
use crate::loader::{FileWalker, SentenceChunker};
use crate::paths::{
    namespace_index_dir, namespace_lock_path, namespace_raw_dir, validate_namespace,
};
use crate::retrieval::{ContextBudget, RetrievedChunk, Retriever, render_numbered};
use crate::types::*;
use crate::vector_db::{IndexBuilder, ManualRetriever, has_published_index, load_index};
use index_lock::NamespaceLocks;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main client for interacting with the RAG system
///
/// # Example
///
/// ```no_run
/// use easy_rag::{AskRequest, IngestRequest, RagClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), easy_rag::RagError> {
///     let client = RagClient::new()?;
///
///     let ingest = client.ingest(IngestRequest::new("networks")).await?;
///     println!("Indexed {} chunks", ingest.chunks);
///
///     let answer = client
///         .ask(AskRequest {
///             namespace: "networks".to_string(),
///             question: "What does TCP guarantee?".to_string(),
///             top_k: None,
///         })
///         .await?;
///     println!("{}", answer.answer);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RagClient {
    pub(crate) config: Arc<Config>,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) generator: Arc<dyn GenerationProvider>,
    pub(crate) chunker: Arc<SentenceChunker>,
    // Per-namespace ingest locks (single writer per knowledge base)
    pub(crate) ingest_locks: Arc<NamespaceLocks>,
}

impl RagClient {
    /// Create a client from the default configuration file and environment
    pub fn new() -> Result<Self, RagError> {
        Self::with_config(Config::new()?)
    }

    /// Create a client talking to the HTTP services named in `config`
    pub fn with_config(config: Config) -> Result<Self, RagError> {
        let embedder = Arc::new(HttpEmbeddingProvider::new(&config.embedding)?);
        let generator = Arc::new(ChatCompletionsProvider::new(&config.generation)?);
        Self::with_providers(config, embedder, generator)
    }

    /// Create a client with explicit provider implementations
    pub fn with_providers(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Result<Self, RagError> {
        config.validate()?;
        let chunker =
            SentenceChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;

        tracing::debug!(
            "RAG client ready: embedding={} ({}d), generation={}",
            embedder.model_name(),
            config.embedding.dimension,
            generator.model_name()
        );

        Ok(Self {
            config: Arc::new(config),
            embedder,
            generator,
            chunker: Arc::new(chunker),
            ingest_locks: Arc::new(NamespaceLocks::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build (or rebuild) the index of a knowledge base from its raw corpus
    ///
    /// Runs under the namespace's ingest lock. The published index only
    /// changes once the new one is completely written, so a failure at any
    /// step (including embedding) leaves the previous index usable.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse, RagError> {
        validate_namespace(&request.namespace)?;
        let namespace = request.namespace;
        let start = Instant::now();

        let storage = &self.config.storage;
        let raw_dir = namespace_raw_dir(&storage.raw_dir, &namespace);
        let index_dir = namespace_index_dir(&storage.index_dir, &namespace);

        let _lock = self
            .ingest_locks
            .acquire(
                &namespace,
                namespace_lock_path(&storage.index_dir, &namespace),
                Duration::from_secs(storage.lock_timeout_secs),
            )
            .await?;

        tracing::info!("Ingesting '{}' from {:?}", namespace, raw_dir);

        let documents = tokio::task::spawn_blocking(move || FileWalker::new(raw_dir).walk())
            .await
            .map_err(|e| RagError::other(format!("loader task failed: {}", e)))??;

        let sources: HashSet<&str> = documents
            .iter()
            .map(|d| d.metadata.source.as_str())
            .collect();
        let document_count = sources.len();

        let timestamp = chrono::Utc::now().timestamp();
        let chunks = self.chunker.chunk_documents(&documents, timestamp);
        if chunks.is_empty() {
            return Err(IngestError::NoDocuments(namespace).into());
        }
        tracing::info!(
            "Chunked {} documents from {} files into {} chunks",
            documents.len(),
            document_count,
            chunks.len()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            }
            .into());
        }
        let dimension = self.config.embedding.dimension;
        check_dimensions(&embeddings, dimension)?;

        let builder = IndexBuilder::new(&index_dir).with_rebuild(request.rebuild);
        let model = self.embedder.model_name().to_string();
        let outcome = tokio::task::spawn_blocking(move || {
            builder.build(&chunks, &embeddings, dimension, &model)
        })
        .await
        .map_err(|e| RagError::other(format!("index build task failed: {}", e)))??;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Ingested '{}': {} files, {} chunks in {} ms",
            namespace,
            document_count,
            outcome.count,
            duration_ms
        );

        Ok(IngestResponse {
            namespace,
            documents: document_count,
            chunks: outcome.count,
            index_dir,
            duration_ms,
        })
    }

    /// Answer a question from one knowledge base
    pub async fn ask(&self, request: AskRequest) -> Result<AskResponse, RagError> {
        validate_namespace(&request.namespace)?;
        let question = request.question.trim();
        if question.is_empty() {
            return Err(ValidationError::Empty("question".to_string()).into());
        }
        let retrieval = &self.config.retrieval;
        let top_k = request.top_k.unwrap_or(retrieval.top_k);
        if top_k < 1 || top_k > retrieval.max_top_k {
            return Err(ValidationError::ConstraintViolation {
                field: "top_k".to_string(),
                constraint: format!("between 1 and {}", retrieval.max_top_k),
                actual: top_k.to_string(),
            }
            .into());
        }

        let start = Instant::now();
        let namespace = request.namespace.as_str();
        tracing::debug!("Question for '{}': {}", namespace, question);

        let retrieved = self.retrieve(namespace, question, top_k).await?;

        let items: Vec<ContextItem> = retrieved
            .iter()
            .map(RetrievedChunk::to_context_item)
            .collect();
        let contexts = ContextBudget::from_tokens(retrieval.context_token_budget).trim(items);
        if contexts.is_empty() {
            return Err(RagError::NoContext {
                namespace: namespace.to_string(),
            });
        }

        let context = render_numbered(&contexts);
        let generated = self.generator.generate(question, &context).await?;

        let latency_ms = (start.elapsed().as_millis() as u64).max(generated.latency_ms);
        tracing::info!(
            "Answered from '{}' with {} passages in {} ms",
            namespace,
            contexts.len(),
            latency_ms
        );

        Ok(AskResponse {
            answer: generated.answer,
            contexts,
            latency_ms,
        })
    }

    /// Primary load and search, falling back to the manual reader when the
    /// structured loader cannot use the index
    async fn retrieve(
        &self,
        namespace: &str,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let index_dir = namespace_index_dir(&self.config.storage.index_dir, namespace);
        let dimension = self.config.embedding.dimension;

        let dir = index_dir.clone();
        let primary = tokio::task::spawn_blocking(move || load_index(&dir, dimension))
            .await
            .map_err(|e| RagError::other(format!("index loader task failed: {}", e)))?;

        match primary {
            Ok(index) => {
                let query = self.embedder.embed_query(question).await?;
                let index = Arc::new(index);
                tokio::task::spawn_blocking(move || Retriever::retrieve(&index, &query, top_k))
                    .await
                    .map_err(|e| RagError::other(format!("search task failed: {}", e)))?
            }
            Err(primary_err) if primary_err.is_index_not_found() => {
                tracing::warn!("{}; trying the manual index reader", primary_err);
                let fallback =
                    ManualRetriever::retrieve(&index_dir, question, top_k, self.embedder.as_ref())
                        .await;
                match fallback {
                    Ok(results) => Ok(results),
                    Err(fallback_err) if fallback_err.is_index_not_found() => {
                        tracing::debug!("Manual index reader failed too: {}", fallback_err);
                        Err(primary_err)
                    }
                    Err(other) => Err(other),
                }
            }
            Err(other) => Err(other),
        }
    }

    /// Knowledge bases that have a raw corpus directory, sorted by name
    pub async fn list_namespaces(&self) -> Result<Vec<NamespaceInfo>, RagError> {
        let raw_root = self.config.storage.raw_dir.clone();
        let index_root = self.config.storage.index_dir.clone();

        tokio::task::spawn_blocking(move || list_namespaces_blocking(&raw_root, &index_root))
            .await
            .map_err(|e| RagError::other(format!("listing task failed: {}", e)))?
    }
}

fn list_namespaces_blocking(
    raw_root: &Path,
    index_root: &Path,
) -> Result<Vec<NamespaceInfo>, RagError> {
    if !raw_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut namespaces = Vec::new();
    for entry in fs::read_dir(raw_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if validate_namespace(&name).is_err() {
            continue;
        }
        namespaces.push(NamespaceInfo {
            files: FileWalker::new(entry.path()).count_files(),
            indexed: has_published_index(&namespace_index_dir(index_root, &name)),
            name,
        });
    }

    namespaces.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(namespaces)
}
