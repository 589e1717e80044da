use super::flat_index::FlatIndex;
use super::layout::{
    CURRENT_FILE, CURRENT_TMP_FILE, DOCSTORE_FILE, GENERATION_PREFIX, INDEX_STORE_FILE,
    LEGACY_ARTIFACTS, MANIFEST_FILE, STAGING_PREFIX, VECTORS_FILE, read_current, sync_dir,
    write_synced,
};
use super::store::{Manifest, NodeMap, STORE_FORMAT_VERSION, StoredChunk, docstore_to_json};
use crate::error::{IngestError, RagError};
use crate::types::Chunk;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Published result of a build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub index_id: String,
    pub generation_dir: PathBuf,
    pub count: usize,
}

/// Writes a complete index generation and publishes it atomically
pub struct IndexBuilder {
    namespace_dir: PathBuf,
    rebuild: bool,
}

impl IndexBuilder {
    pub fn new(namespace_dir: impl AsRef<Path>) -> Self {
        Self {
            namespace_dir: namespace_dir.as_ref().to_path_buf(),
            rebuild: true,
        }
    }

    /// With `rebuild = false` the previously published generation is kept
    pub fn with_rebuild(mut self, rebuild: bool) -> Self {
        self.rebuild = rebuild;
        self
    }

    /// Build and publish an index over `chunks`, whose i-th embedding is `embeddings[i]`
    ///
    /// Nothing visible to readers changes unless the whole generation was
    /// written; a failed build leaves the previous index in place.
    pub fn build(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        dimension: usize,
        model: &str,
    ) -> Result<BuildOutcome, RagError> {
        if chunks.len() != embeddings.len() {
            return Err(build_error(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        let index = FlatIndex::from_vectors(dimension, embeddings)
            .map_err(|e| build_error(e.to_string()))?;

        fs::create_dir_all(&self.namespace_dir)?;
        let previous = read_current(&self.namespace_dir).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable CURRENT: {}", e);
            None
        });

        let index_id = uuid::Uuid::new_v4().to_string();
        let staging = self
            .namespace_dir
            .join(format!("{}{}", STAGING_PREFIX, uuid::Uuid::new_v4()));

        if let Err(e) = write_generation(&staging, &index_id, &index, chunks, model) {
            let _ = fs::remove_dir_all(&staging);
            return Err(build_error(format!("{:#}", e)));
        }

        let generation_name = format!("{}{}", GENERATION_PREFIX, index_id);
        let generation_dir = self.namespace_dir.join(&generation_name);
        if let Err(e) = fs::rename(&staging, &generation_dir) {
            let _ = fs::remove_dir_all(&staging);
            return Err(build_error(format!("failed to move staging directory: {}", e)));
        }

        if let Err(e) = self.publish(&generation_name) {
            let _ = fs::remove_dir_all(&generation_dir);
            return Err(build_error(format!("{:#}", e)));
        }

        tracing::info!(
            "Published index {} ({} vectors) in {:?}",
            index_id,
            index.len(),
            self.namespace_dir
        );

        self.prune(&generation_name, previous.as_deref());

        Ok(BuildOutcome {
            index_id,
            generation_dir,
            count: index.len(),
        })
    }

    /// Point `CURRENT` at the new generation
    fn publish(&self, generation_name: &str) -> Result<()> {
        let tmp = self.namespace_dir.join(CURRENT_TMP_FILE);
        write_synced(&tmp, format!("{}\n", generation_name).as_bytes())
            .context("Failed to write CURRENT.tmp")?;
        fs::rename(&tmp, self.namespace_dir.join(CURRENT_FILE))
            .context("Failed to publish CURRENT")?;
        sync_dir(&self.namespace_dir);
        Ok(())
    }

    /// Remove generations and legacy files that are no longer needed
    ///
    /// Failures are logged only: the new index is already published.
    fn prune(&self, current: &str, previous: Option<&str>) {
        let keep_previous = !self.rebuild;
        let keep_legacy = keep_previous && previous.is_none();

        let entries = match fs::read_dir(&self.namespace_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to list {:?} for pruning: {}", self.namespace_dir, e);
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let path = entry.path();

            let stale = if name.starts_with(GENERATION_PREFIX) {
                name != current && !(keep_previous && Some(name.as_str()) == previous)
            } else if name.starts_with(STAGING_PREFIX) {
                true
            } else {
                !keep_legacy && LEGACY_ARTIFACTS.contains(&name.as_str())
            };
            if !stale {
                continue;
            }

            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => tracing::debug!("Pruned {:?}", path),
                Err(e) => tracing::warn!("Failed to prune {:?}: {}", path, e),
            }
        }
    }
}

fn build_error(msg: impl Into<String>) -> RagError {
    IngestError::IndexBuild(msg.into()).into()
}

fn write_generation(
    dir: &Path,
    index_id: &str,
    index: &FlatIndex,
    chunks: &[Chunk],
    model: &str,
) -> Result<()> {
    fs::create_dir_all(dir).context("Failed to create staging directory")?;

    let mut artifacts = BTreeMap::new();

    let sum = write_synced(&dir.join(VECTORS_FILE), &index.to_bytes())
        .context("Failed to write vector file")?;
    artifacts.insert(VECTORS_FILE.to_string(), sum);

    let nodes = NodeMap::from_chunk_ids(index_id, chunks.iter().map(|c| c.id.clone()));
    let sum = write_synced(&dir.join(INDEX_STORE_FILE), nodes.to_json()?.as_bytes())
        .context("Failed to write node store")?;
    artifacts.insert(INDEX_STORE_FILE.to_string(), sum);

    let stored: Vec<StoredChunk> = chunks.iter().map(StoredChunk::from).collect();
    let sum = write_synced(&dir.join(DOCSTORE_FILE), docstore_to_json(&stored)?.as_bytes())
        .context("Failed to write document store")?;
    artifacts.insert(DOCSTORE_FILE.to_string(), sum);

    let manifest = Manifest {
        format_version: STORE_FORMAT_VERSION,
        index_id: index_id.to_string(),
        dimension: index.dimension(),
        count: index.len(),
        embedding_model: model.to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        artifacts,
    };
    write_synced(&dir.join(MANIFEST_FILE), manifest.to_json()?.as_bytes())
        .context("Failed to write manifest")?;

    sync_dir(dir);
    Ok(())
}
