//! JSON side files of an index generation
//!
//! `index_store.json` maps vector positions to chunk ids, `docstore.json`
//! holds chunk text and metadata, and `manifest.json` describes the whole
//! generation. The node and document stores use the `"<kind>/data"` envelope
//! with `__type__`/`__data__` entries so older indices remain readable.

use crate::types::{Chunk, ChunkMetadata};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

pub const STORE_FORMAT_VERSION: u32 = 1;

const INDEX_STORE_KEY: &str = "index_store/data";
const DOCSTORE_KEY: &str = "docstore/data";
const TYPE_KEY: &str = "__type__";
const DATA_KEY: &str = "__data__";
const VECTOR_STORE_TYPE: &str = "vector_store";
const CHUNK_TYPE: &str = "chunk";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Schema(String),
}

fn schema(msg: impl Into<String>) -> StoreError {
    StoreError::Schema(msg.into())
}

/// Position → chunk id mapping of one vector index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMap {
    pub index_id: String,
    pub nodes: BTreeMap<usize, String>,
}

impl NodeMap {
    pub fn from_chunk_ids(index_id: &str, ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            index_id: index_id.to_string(),
            nodes: ids.into_iter().enumerate().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.nodes.get(&position).map(String::as_str)
    }

    /// True when the keys are exactly `0..len`
    pub fn is_dense(&self) -> bool {
        self.nodes.keys().enumerate().all(|(i, pos)| i == *pos)
    }

    /// Serialize in the envelope layout; the payload is an embedded JSON string
    pub fn to_json(&self) -> Result<String, StoreError> {
        let nodes_dict: BTreeMap<String, &String> = self
            .nodes
            .iter()
            .map(|(pos, id)| (pos.to_string(), id))
            .collect();
        let payload = json!({
            "index_id": self.index_id,
            "nodes_dict": nodes_dict,
        });
        let document = json!({
            "format_version": STORE_FORMAT_VERSION,
            INDEX_STORE_KEY: {
                self.index_id.clone(): {
                    TYPE_KEY: VECTOR_STORE_TYPE,
                    DATA_KEY: serde_json::to_string(&payload)?,
                }
            }
        });
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Parse `index_store.json`; the first entry carrying `nodes_dict` wins
    pub fn parse(json: &str) -> Result<Self, StoreError> {
        let root: Value = serde_json::from_str(json)?;
        let entries = root
            .get(INDEX_STORE_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| schema(format!("missing '{}' object", INDEX_STORE_KEY)))?;

        for (index_id, entry) in entries {
            let payload = match entry.get(DATA_KEY) {
                Some(Value::String(embedded)) => serde_json::from_str::<Value>(embedded)?,
                Some(obj @ Value::Object(_)) => obj.clone(),
                Some(_) => return Err(schema(format!("'{}' has an ill-typed payload", index_id))),
                None => continue,
            };
            let Some(dict) = payload.get("nodes_dict") else {
                continue;
            };
            let dict = dict
                .as_object()
                .ok_or_else(|| schema("'nodes_dict' is not an object"))?;

            let mut nodes = BTreeMap::new();
            for (pos, id) in dict {
                let pos: usize = pos
                    .parse()
                    .map_err(|_| schema(format!("node position '{}' is not an integer", pos)))?;
                let id = id
                    .as_str()
                    .ok_or_else(|| schema(format!("node {} has a non-string id", pos)))?;
                nodes.insert(pos, id.to_string());
            }
            return Ok(Self {
                index_id: index_id.clone(),
                nodes,
            });
        }

        Err(schema("no entry with 'nodes_dict'"))
    }
}

/// Chunk text and metadata as persisted in the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub document_id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl From<&Chunk> for StoredChunk {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            document_id: chunk.document_id.clone(),
            text: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
        }
    }
}

pub fn docstore_to_json(chunks: &[StoredChunk]) -> Result<String, StoreError> {
    let mut entries = Map::new();
    for chunk in chunks {
        entries.insert(
            chunk.id.clone(),
            json!({ TYPE_KEY: CHUNK_TYPE, DATA_KEY: chunk }),
        );
    }
    let document = json!({
        "format_version": STORE_FORMAT_VERSION,
        DOCSTORE_KEY: entries,
    });
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Parse `docstore.json` into chunk id → chunk
///
/// Entries may be wrapped in `__data__` (as an object or an embedded JSON
/// string) or stored bare. Entries that do not parse are skipped.
pub fn parse_docstore(json: &str) -> Result<HashMap<String, StoredChunk>, StoreError> {
    let root: Value = serde_json::from_str(json)?;
    let entries = root
        .get(DOCSTORE_KEY)
        .and_then(Value::as_object)
        .ok_or_else(|| schema(format!("missing '{}' object", DOCSTORE_KEY)))?;

    let mut chunks = HashMap::with_capacity(entries.len());
    for (id, entry) in entries {
        let payload = match entry.get(DATA_KEY) {
            Some(Value::String(embedded)) => match serde_json::from_str(embedded) {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!("Skipping docstore entry {}: {}", id, e);
                    continue;
                }
            },
            Some(value) => value.clone(),
            None => entry.clone(),
        };
        match serde_json::from_value::<StoredChunk>(normalize_legacy_metadata(payload)) {
            Ok(mut chunk) => {
                if chunk.id.is_empty() {
                    chunk.id = id.clone();
                }
                chunks.insert(id.clone(), chunk);
            }
            Err(e) => tracing::debug!("Skipping docstore entry {}: {}", id, e),
        }
    }
    Ok(chunks)
}

/// Map older metadata keys (`file_name`, `page_label`) onto the current ones
fn normalize_legacy_metadata(mut payload: Value) -> Value {
    let Some(metadata) = payload.get_mut("metadata").and_then(Value::as_object_mut) else {
        return payload;
    };
    for (legacy, current) in [("file_name", "source"), ("page_label", "page")] {
        if metadata.contains_key(current) {
            continue;
        }
        let value = match metadata.get(legacy) {
            Some(Value::String(s)) => Value::String(s.clone()),
            Some(Value::Number(n)) => Value::String(n.to_string()),
            _ => continue,
        };
        metadata.insert(current.to_string(), value);
    }
    if let Some(Value::Number(n)) = metadata.get("page").cloned() {
        metadata.insert("page".to_string(), Value::String(n.to_string()));
    }
    payload
}

/// Description of one published generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub index_id: String,
    pub dimension: usize,
    pub count: usize,
    pub embedding_model: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// Artifact file name → SHA-256 (hex)
    pub artifacts: BTreeMap<String, String>,
}

impl Manifest {
    pub fn parse(json: &str) -> Result<Self, StoreError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        if manifest.format_version != STORE_FORMAT_VERSION {
            return Err(schema(format!(
                "unsupported manifest format version {}",
                manifest.format_version
            )));
        }
        Ok(manifest)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentMetadata;

    fn stored(id: &str, text: &str) -> StoredChunk {
        StoredChunk {
            id: id.to_string(),
            document_id: "notes.md".to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                document: DocumentMetadata {
                    source: "notes.md".to_string(),
                    file_path: "notes.md".to_string(),
                    section: Some("Intro".to_string()),
                    ..Default::default()
                },
                timestamp: 42,
            },
        }
    }

    #[test]
    fn test_node_map_written_with_embedded_string_payload() {
        let map = NodeMap::from_chunk_ids("idx-1", vec!["a".to_string(), "b".to_string()]);
        let json = map.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        let entry = &value["index_store/data"]["idx-1"];
        assert_eq!(entry["__type__"], "vector_store");
        assert!(entry["__data__"].is_string());
        assert_eq!(NodeMap::parse(&json).unwrap(), map);
    }

    #[test]
    fn test_node_map_accepts_object_payload() {
        let json = r#"{"index_store/data": {"legacy": {
            "__type__": "vector_store",
            "__data__": {"index_id": "legacy", "nodes_dict": {"1": "b", "0": "a"}}
        }}}"#;
        let map = NodeMap::parse(json).unwrap();
        assert_eq!(map.index_id, "legacy");
        assert_eq!(map.get(0), Some("a"));
        assert_eq!(map.get(1), Some("b"));
        assert!(map.is_dense());
    }

    #[test]
    fn test_node_map_schema_errors() {
        assert!(matches!(NodeMap::parse("[]"), Err(StoreError::Schema(_))));
        assert!(matches!(NodeMap::parse("{"), Err(StoreError::Json(_))));

        let no_nodes = r#"{"index_store/data": {"x": {"__data__": {"other": 1}}}}"#;
        assert!(NodeMap::parse(no_nodes).is_err());

        let bad_type = r#"{"index_store/data": {"x": {"__data__": 7}}}"#;
        assert!(NodeMap::parse(bad_type).is_err());

        let bad_pos = r#"{"index_store/data": {"x": {"__data__": {"nodes_dict": {"one": "a"}}}}}"#;
        assert!(NodeMap::parse(bad_pos).is_err());
    }

    #[test]
    fn test_sparse_node_map_is_not_dense() {
        let json = r#"{"index_store/data": {"x": {"__data__": {"nodes_dict": {"0": "a", "2": "c"}}}}}"#;
        assert!(!NodeMap::parse(json).unwrap().is_dense());
    }

    #[test]
    fn test_docstore_round_trip() {
        let chunks = vec![stored("a", "Alpha."), stored("b", "Beta.")];
        let json = docstore_to_json(&chunks).unwrap();
        let parsed = parse_docstore(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["b"], chunks[1]);
    }

    #[test]
    fn test_docstore_accepts_bare_and_string_entries() {
        let json = r#"{"docstore/data": {
            "bare": {"text": "Bare entry.", "metadata": {"file_name": "old.pdf", "page_label": 4}},
            "embedded": {"__data__": "{\"text\": \"Embedded entry.\"}"},
            "broken": {"__data__": {"no_text": true}}
        }}"#;
        let parsed = parse_docstore(json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["bare"].id, "bare");
        assert_eq!(parsed["bare"].metadata.document.source, "old.pdf");
        assert_eq!(parsed["bare"].metadata.document.page.as_deref(), Some("4"));
        assert_eq!(parsed["embedded"].text, "Embedded entry.");
        assert_eq!(parsed["embedded"].metadata.document.page, None);
    }

    #[test]
    fn test_manifest_version_checked() {
        let manifest = Manifest {
            format_version: STORE_FORMAT_VERSION,
            index_id: "idx".to_string(),
            dimension: 8,
            count: 2,
            embedding_model: "text-embedding-v4".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            artifacts: BTreeMap::new(),
        };
        let json = manifest.to_json().unwrap();
        assert_eq!(Manifest::parse(&json).unwrap(), manifest);

        let future = json.replace("\"format_version\": 1", "\"format_version\": 2");
        assert!(matches!(Manifest::parse(&future), Err(StoreError::Schema(_))));
    }
}
