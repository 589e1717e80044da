use super::flat_index::FlatIndex;
use super::layout::{
    DOCSTORE_FILE, INDEX_STORE_FILE, MANIFEST_FILE, VECTORS_FILE, resolve_generation, sha256_hex,
};
use super::store::{Manifest, NodeMap, StoredChunk, parse_docstore};
use crate::error::RagError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A verified, fully resident index generation
#[derive(Debug)]
pub struct LoadedIndex {
    pub namespace: String,
    pub dimension: usize,
    pub index: FlatIndex,
    /// Chunk id stored at each vector position
    pub positions: Vec<String>,
    pub chunks: HashMap<String, StoredChunk>,
    pub generation_dir: PathBuf,
    pub manifest: Manifest,
}

impl LoadedIndex {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Stored chunk at a vector position
    pub fn chunk_at(&self, position: usize) -> Option<&StoredChunk> {
        self.positions
            .get(position)
            .and_then(|id| self.chunks.get(id))
    }
}

/// Load the published index of a namespace, verifying it end to end
///
/// Every failure (missing files, checksum or dimension mismatch, inconsistent
/// counts) is reported as [`RagError::IndexNotFound`] so callers can fall back
/// to the manual loader.
pub fn load_index(namespace_dir: &Path, expected_dimension: usize) -> Result<LoadedIndex, RagError> {
    let namespace = namespace_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let not_found = |reason: String| RagError::index_not_found(namespace.clone(), reason);

    let generation_dir = resolve_generation(namespace_dir).map_err(&not_found)?;

    let manifest_json = fs::read_to_string(generation_dir.join(MANIFEST_FILE))
        .map_err(|e| not_found(format!("manifest unreadable: {}", e)))?;
    let manifest = Manifest::parse(&manifest_json)
        .map_err(|e| not_found(format!("manifest invalid: {}", e)))?;

    let vectors = read_verified(&generation_dir, VECTORS_FILE, &manifest).map_err(&not_found)?;
    let index_store =
        read_verified(&generation_dir, INDEX_STORE_FILE, &manifest).map_err(&not_found)?;
    let docstore = read_verified(&generation_dir, DOCSTORE_FILE, &manifest).map_err(&not_found)?;

    let index = FlatIndex::from_bytes(&vectors)
        .map_err(|e| not_found(format!("vector file invalid: {}", e)))?;

    if index.dimension() != manifest.dimension {
        return Err(not_found(format!(
            "vector file dimension {} disagrees with manifest dimension {}",
            index.dimension(),
            manifest.dimension
        )));
    }
    if manifest.dimension != expected_dimension {
        return Err(not_found(format!(
            "index was built with dimension {} but {} is configured; re-run ingest",
            manifest.dimension, expected_dimension
        )));
    }

    let index_store = String::from_utf8(index_store)
        .map_err(|_| not_found("node store is not UTF-8".to_string()))?;
    let nodes = NodeMap::parse(&index_store)
        .map_err(|e| not_found(format!("node store invalid: {}", e)))?;

    let docstore =
        String::from_utf8(docstore).map_err(|_| not_found("docstore is not UTF-8".to_string()))?;
    let chunks = parse_docstore(&docstore)
        .map_err(|e| not_found(format!("docstore invalid: {}", e)))?;

    if index.len() != manifest.count || nodes.len() != manifest.count || !nodes.is_dense() {
        return Err(not_found(format!(
            "manifest lists {} vectors but found {} vectors and {} nodes",
            manifest.count,
            index.len(),
            nodes.len()
        )));
    }

    let positions: Vec<String> = nodes.nodes.into_values().collect();
    if let Some(missing) = positions.iter().find(|id| !chunks.contains_key(*id)) {
        return Err(not_found(format!("chunk {} missing from docstore", missing)));
    }

    tracing::debug!(
        "Loaded index {} for '{}' ({} vectors)",
        manifest.index_id,
        namespace,
        index.len()
    );

    Ok(LoadedIndex {
        namespace,
        dimension: manifest.dimension,
        index,
        positions,
        chunks,
        generation_dir,
        manifest,
    })
}

fn read_verified(dir: &Path, name: &str, manifest: &Manifest) -> Result<Vec<u8>, String> {
    let expected = manifest
        .artifacts
        .get(name)
        .ok_or_else(|| format!("manifest has no checksum for {}", name))?;
    let bytes = fs::read(dir.join(name)).map_err(|e| format!("{} unreadable: {}", name, e))?;
    if &sha256_hex(&bytes) != expected {
        return Err(format!("{} failed checksum verification", name));
    }
    Ok(bytes)
}
