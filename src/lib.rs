//! # Easy RAG - Question Answering over Course Material
//!
//! A library and CLI that turns a folder of lecture material (PDF, PowerPoint
//! and Markdown files) into a searchable vector index, then answers questions
//! by retrieving the most similar passages and handing them to a chat model.
//!
//! ## Overview
//!
//! Each knowledge base ("namespace") has a raw corpus directory and an index
//! directory. Ingest walks the corpus, splits it into overlapping chunks,
//! embeds them with an OpenAI-compatible embedding service and publishes a new
//! index generation atomically. Ask embeds the question, searches the
//! published index and generates an answer that cites the passages it used.
//!
//! ## Key Features
//!
//! - **Atomic publishing**: readers only ever see a complete index generation
//! - **Manual fallback**: indexes without a manifest (older layouts) are still searchable
//! - **Context budgeting**: retrieved passages are trimmed to a token allowance
//! - **Per-namespace locking**: one ingest per knowledge base, across processes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / caller   │
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    RagClient    │  (ingest, ask, list)
//! └────────┬────────┘
//!          │
//!    ┌─────┴─────┬────────────┬─────────────┐
//!    │           │            │             │
//! ┌──▼───┐  ┌────▼────┐  ┌────▼─────┐  ┌────▼──────┐
//! │Loader│  │Embedding│  │Vector DB │  │Generation │
//! │+Chunk│  │ (HTTP)  │  │(flat L2) │  │  (HTTP)   │
//! └──────┘  └─────────┘  └──────────┘  └───────────┘
//! ```
//!
//! ## Modules
//!
//! - [`client`]: The ingest and ask pipelines
//! - [`loader`]: File walking, text extraction and chunking
//! - [`embedding`]: Embedding provider trait and HTTP adapter
//! - [`generation`]: Generation provider trait and chat-completions adapter
//! - [`vector_db`]: Index building, publishing and loading
//! - [`retrieval`]: Similarity search and context budgeting
//! - [`config`]: Configuration management with environment variable support
//! - [`types`]: Request/response types
//! - [`error`]: Error types
//! - [`paths`]: Namespace validation and platform directories
//!
//! ## Usage Example
//!
//! ```no_run
//! use easy_rag::{AskRequest, IngestRequest, RagClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RagClient::new()?;
//!     client.ingest(IngestRequest::new("networks")).await?;
//!
//!     let response = client
//!         .ask(AskRequest {
//!             namespace: "networks".to_string(),
//!             question: "Why does TCP use a three-way handshake?".to_string(),
//!             top_k: Some(4),
//!         })
//!         .await?;
//!     println!("{}", response.answer);
//!     Ok(())
//! }
//! ```

/// Ingest and ask pipelines
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding provider trait and the OpenAI-compatible HTTP adapter
pub mod embedding;

/// Error types for the whole pipeline
pub mod error;

/// Generation provider trait and the chat-completions adapter
pub mod generation;

/// Corpus walking, text extraction and chunking
pub mod loader;

/// Namespace validation and platform-specific directories
pub mod paths;

/// Similarity search and context budgeting
pub mod retrieval;

/// Request and response types
pub mod types;

/// Persisted vector index
pub mod vector_db;

#[cfg(test)]
mod testing;

pub use client::RagClient;
pub use config::Config;
pub use error::{
    EmbeddingError, ErrorClass, GenerationError, IngestError, RagError, ValidationError,
};
pub use types::{
    AskRequest, AskResponse, ContextItem, IngestRequest, IngestResponse, NamespaceInfo,
};
