use crate::error::{EmbeddingError, RagError};
use crate::types::{ChunkMetadata, ContextItem};
use crate::vector_db::{LoadedIndex, StoredChunk};
use std::collections::HashSet;

/// A chunk returned by a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub position: usize,
    /// Squared L2 distance to the query
    pub distance: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl RetrievedChunk {
    pub(crate) fn from_stored(position: usize, distance: f32, chunk: &StoredChunk) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            position,
            distance,
            text: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
        }
    }

    pub fn to_context_item(&self) -> ContextItem {
        ContextItem {
            source: self.metadata.document.source.clone(),
            page: self.metadata.document.locator(),
            text: self.text.trim().to_string(),
        }
    }
}

/// Nearest-neighbour search over a loaded index
pub struct Retriever;

impl Retriever {
    /// Up to `k` (at least 1) distinct chunks, nearest first, ties by position
    pub fn retrieve(
        index: &LoadedIndex,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        if query.len() != index.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: index.dimension,
                actual: query.len(),
            }
            .into());
        }
        let k = k.max(1);

        let ranked = index
            .index
            .rank(query)
            .map_err(|e| RagError::other(e.to_string()))?;

        let mut seen = HashSet::new();
        let results: Vec<RetrievedChunk> = ranked
            .into_iter()
            .filter_map(|(position, distance)| {
                let chunk = index.chunk_at(position)?;
                (!chunk.text.trim().is_empty() && seen.insert(chunk.id.clone()))
                    .then(|| RetrievedChunk::from_stored(position, distance, chunk))
            })
            .take(k)
            .collect();

        tracing::debug!(
            "Retrieved {} of {} chunks from '{}'",
            results.len(),
            index.len(),
            index.namespace
        );
        Ok(results)
    }
}
