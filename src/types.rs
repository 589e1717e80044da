use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Provenance attached to a document and inherited by its chunks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentMetadata {
    /// File name the text came from
    pub source: String,
    /// Path relative to the namespace's raw corpus directory
    pub file_path: String,
    /// PDF page label (1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Slide number in a deck (1-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide: Option<u32>,
    /// Heading the text sits under, when the format has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl DocumentMetadata {
    /// Page-like locator for citations: page label, else slide, else section
    pub fn locator(&self) -> Option<String> {
        self.page
            .clone()
            .or_else(|| self.slide.map(|s| s.to_string()))
            .or_else(|| self.section.clone())
    }
}

/// A unit of ingested content, produced by the loader and discarded after chunking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Metadata stored with every chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub document: DocumentMetadata,
    /// Shared ingest timestamp (unix seconds)
    #[serde(default)]
    pub timestamp: i64,
}

/// A contiguous span of one document; the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A retrieved passage as shown to the generation service and the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextItem {
    pub source: String,
    #[serde(default)]
    pub page: Option<String>,
    pub text: String,
}

/// Request to (re)build the index of a knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Knowledge base name
    pub namespace: String,
    /// Remove every earlier index generation once the new one is published
    #[serde(default = "default_rebuild")]
    pub rebuild: bool,
}

fn default_rebuild() -> bool {
    true
}

impl IngestRequest {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            rebuild: default_rebuild(),
        }
    }
}

/// Response from an ingest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub namespace: String,
    /// Number of distinct source files that produced text
    pub documents: usize,
    /// Number of chunks embedded and indexed
    pub chunks: usize,
    /// Published index directory of the namespace
    pub index_dir: PathBuf,
    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Request to answer a question from a knowledge base
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub namespace: String,
    pub question: String,
    /// Number of passages to retrieve (defaults to `retrieval.top_k`)
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// Answer with the passages it was generated from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    /// Budgeted context, in rank order; `[n]` citations refer to position n
    pub contexts: Vec<ContextItem>,
    pub latency_ms: u64,
}

/// Knowledge base listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub name: String,
    /// Number of supported, non-hidden files under the raw corpus directory
    pub files: usize,
    /// Whether a published index exists
    pub indexed: bool,
}

#[cfg(test)]
mod tests;
