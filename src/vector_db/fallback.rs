//! Manual retrieval straight from the raw index files
//!
//! Used when the structured loader rejects an index (missing manifest, older
//! layout). Reads the vector file and the two JSON stores without any
//! integrity checks and resolves positions one by one, skipping anything it
//! cannot resolve.

use super::flat_index::FlatIndex;
use super::layout::{
    DOCSTORE_FILE, INDEX_STORE_FILE, LEGACY_VECTORS_FILE, VECTORS_FILE, resolve_generation,
};
use super::store::{NodeMap, StoredChunk, parse_docstore};
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, RagError};
use crate::retrieval::RetrievedChunk;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Raw artifacts of an index, parsed but not verified
#[derive(Debug)]
pub struct RawIndex {
    pub index: FlatIndex,
    pub nodes: NodeMap,
    pub chunks: HashMap<String, StoredChunk>,
    pub source_dir: PathBuf,
}

impl RawIndex {
    /// Read the raw files of the published generation (or legacy layout)
    pub fn open(namespace_dir: &Path) -> Result<Self, String> {
        let dir = resolve_generation(namespace_dir)?;

        let vectors_path = [VECTORS_FILE, LEGACY_VECTORS_FILE]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| "no vector file".to_string())?;
        let bytes = fs::read(&vectors_path).map_err(|e| format!("vector file unreadable: {}", e))?;
        let index =
            FlatIndex::from_bytes(&bytes).map_err(|e| format!("vector file invalid: {}", e))?;

        let index_store = fs::read_to_string(dir.join(INDEX_STORE_FILE))
            .map_err(|e| format!("{} unreadable: {}", INDEX_STORE_FILE, e))?;
        let nodes =
            NodeMap::parse(&index_store).map_err(|e| format!("node store invalid: {}", e))?;

        let docstore = fs::read_to_string(dir.join(DOCSTORE_FILE))
            .map_err(|e| format!("{} unreadable: {}", DOCSTORE_FILE, e))?;
        let chunks = parse_docstore(&docstore).map_err(|e| format!("docstore invalid: {}", e))?;

        Ok(Self {
            index,
            nodes,
            chunks,
            source_dir: dir,
        })
    }

    /// Walk the full ranking for `query`, keeping the first `k` resolvable,
    /// non-blank, distinct chunks
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, EmbeddingError> {
        let ranked = self
            .index
            .rank(query)
            .map_err(|_| EmbeddingError::DimensionMismatch {
                expected: self.index.dimension(),
                actual: query.len(),
            })?;

        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(k);
        for (position, distance) in ranked {
            if results.len() >= k {
                break;
            }
            let Some(id) = self.nodes.get(position) else {
                tracing::debug!("Position {} has no node entry, skipping", position);
                continue;
            };
            let Some(chunk) = self.chunks.get(id) else {
                tracing::debug!("Chunk {} missing from docstore, skipping", id);
                continue;
            };
            if chunk.text.trim().is_empty() || !seen.insert(id.to_string()) {
                continue;
            }
            results.push(RetrievedChunk::from_stored(position, distance, chunk));
        }
        Ok(results)
    }
}

/// Retrieval path that bypasses the structured loader
pub struct ManualRetriever;

impl ManualRetriever {
    /// Embed `question` and return its `k` nearest chunks from the raw files
    ///
    /// Unreadable files or stores without a node map yield
    /// [`RagError::IndexNotFound`]; the embedder is only called once the
    /// files have been read.
    pub async fn retrieve(
        namespace_dir: &Path,
        question: &str,
        k: usize,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let namespace = namespace_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let dir = namespace_dir.to_path_buf();

        let raw = tokio::task::spawn_blocking(move || RawIndex::open(&dir))
            .await
            .map_err(|e| RagError::other(format!("fallback loader task failed: {}", e)))?
            .map_err(|reason| RagError::index_not_found(&namespace, reason))?;

        tracing::warn!(
            "Using manual index reader for '{}' ({:?})",
            namespace,
            raw.source_dir
        );

        let query = embedder.embed_query(question).await?;
        if query.len() != raw.index.dimension() {
            return Err(RagError::index_not_found(
                &namespace,
                format!(
                    "index dimension {} does not match query dimension {}; re-run ingest",
                    raw.index.dimension(),
                    query.len()
                ),
            ));
        }

        let k = k.max(1);
        let results = tokio::task::spawn_blocking(move || raw.search(&query, k))
            .await
            .map_err(|e| RagError::other(format!("fallback search task failed: {}", e)))??;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::HashEmbedder;
    use crate::types::{Chunk, ChunkMetadata};
    use crate::vector_db::IndexBuilder;
    use crate::vector_db::layout::MANIFEST_FILE;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_legacy(dir: &Path, vectors: &[Vec<f32>], nodes: serde_json::Value, docs: serde_json::Value) {
        fs::create_dir_all(dir).unwrap();
        let index = FlatIndex::from_vectors(vectors[0].len(), vectors).unwrap();
        fs::write(dir.join(LEGACY_VECTORS_FILE), index.to_bytes()).unwrap();
        let store = json!({"index_store/data": {"legacy": {
            "__type__": "vector_store",
            "__data__": json!({"index_id": "legacy", "nodes_dict": nodes}).to_string(),
        }}});
        fs::write(dir.join(INDEX_STORE_FILE), store.to_string()).unwrap();
        fs::write(dir.join(DOCSTORE_FILE), json!({"docstore/data": docs}).to_string()).unwrap();
    }

    #[test]
    fn test_search_skips_unresolvable_and_blank_positions() {
        let temp = TempDir::new().unwrap();
        let ns = temp.path().join("kb");
        write_legacy(
            &ns,
            &[vec![0.0, 0.0], vec![1.0, 0.0], vec![2.0, 0.0], vec![3.0, 0.0]],
            json!({"0": "blank", "1": "dangling", "3": "far"}),
            json!({
                "blank": {"__data__": {"text": "   "}},
                "far": {"__data__": {"text": "Far away.", "metadata": {"file_name": "x.pdf", "page_label": "2"}}},
            }),
        );

        let raw = RawIndex::open(&ns).unwrap();
        let results = raw.search(&[0.0, 0.0], 2).unwrap();
        // positions 0 (blank), 1 (not in docstore) and 2 (no node) are skipped
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].position, 3);
        assert_eq!(results[0].chunk_id, "far");
        assert_eq!(results[0].metadata.document.page.as_deref(), Some("2"));
    }

    #[test]
    fn test_search_fills_k_past_skipped_positions() {
        let temp = TempDir::new().unwrap();
        let ns = temp.path().join("kb");
        write_legacy(
            &ns,
            &[vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            json!({"0": "a", "1": "gone", "2": "c", "3": "d"}),
            json!({
                "a": {"text": "A."},
                "c": {"text": "C."},
                "d": {"text": "D."},
            }),
        );

        let raw = RawIndex::open(&ns).unwrap();
        let ids: Vec<String> = raw
            .search(&[0.0], 3)
            .unwrap()
            .into_iter()
            .map(|r| r.chunk_id)
            .collect();
        assert_eq!(ids, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_open_requires_node_map() {
        let temp = TempDir::new().unwrap();
        let ns = temp.path().join("kb");
        write_legacy(&ns, &[vec![0.0]], json!({}), json!({}));
        fs::write(
            ns.join(INDEX_STORE_FILE),
            json!({"index_store/data": {"x": {"__data__": {"no_nodes": 1}}}}).to_string(),
        )
        .unwrap();

        assert!(RawIndex::open(&ns).unwrap_err().contains("node store"));
    }

    #[tokio::test]
    async fn test_missing_namespace_does_not_embed() {
        let temp = TempDir::new().unwrap();
        let embedder = HashEmbedder::new(4);
        let err = ManualRetriever::retrieve(&temp.path().join("nope"), "q", 3, &embedder)
            .await
            .unwrap_err();
        assert!(err.is_index_not_found());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_retrieve_without_manifest() {
        let temp = TempDir::new().unwrap();
        let ns = temp.path().join("kb");
        let embedder = HashEmbedder::new(8);
        let texts = ["routing tables forward packets", "congestion control window"];
        let vectors: Vec<Vec<f32>> = texts.iter().map(|t| embedder.vector(t)).collect();
        write_legacy(
            &ns,
            &vectors,
            json!({"0": "r", "1": "c"}),
            json!({"r": {"text": texts[0]}, "c": {"text": texts[1]}}),
        );
        assert!(!ns.join(MANIFEST_FILE).exists());

        let results = ManualRetriever::retrieve(&ns, "congestion control window", 1, &embedder)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_id, "c");
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_index_not_found() {
        let temp = TempDir::new().unwrap();
        let ns = temp.path().join("kb");
        write_legacy(&ns, &[vec![0.0, 1.0]], json!({"0": "a"}), json!({"a": {"text": "A."}}));

        let embedder = HashEmbedder::new(8);
        let err = ManualRetriever::retrieve(&ns, "q", 1, &embedder)
            .await
            .unwrap_err();
        assert!(err.is_index_not_found());
        assert!(err.to_string().contains("re-run ingest"));
    }

    #[tokio::test]
    async fn test_returns_every_chunk_when_k_covers_index() {
        let temp = TempDir::new().unwrap();
        let ns = temp.path().join("kb");
        let embedder = HashEmbedder::new(16);

        let chunks: Vec<Chunk> = (0..7)
            .map(|i| Chunk {
                id: format!("notes.md#{}", i),
                document_id: "notes.md".to_string(),
                text: format!("Lecture {} covers routing protocol number {}.", i, i * 3),
                metadata: ChunkMetadata::default(),
            })
            .collect();
        let vectors: Vec<Vec<f32>> = chunks.iter().map(|c| embedder.vector(&c.text)).collect();
        IndexBuilder::new(&ns)
            .build(&chunks, &vectors, 16, "hash-embedder")
            .unwrap();

        for k in [7, 20] {
            let results = ManualRetriever::retrieve(&ns, "routing protocol", k, &embedder)
                .await
                .unwrap();
            let ids: HashSet<String> = results.iter().map(|r| r.chunk_id.clone()).collect();
            assert_eq!(results.len(), 7);
            assert_eq!(ids, chunks.iter().map(|c| c.id.clone()).collect());
        }
    }
}
