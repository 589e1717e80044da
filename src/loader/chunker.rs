use crate::error::ChunkingError;
use crate::types::{Chunk, ChunkMetadata, Document};
use sha2::{Digest, Sha256};

/// Characters after which a sentence is considered finished
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', ';', '。', '！', '？', '；', '\n'];

/// Splits documents into overlapping character windows that end on sentence
/// boundaries where possible
///
/// Sizes are measured in characters (Unicode scalar values). Every chunk is at
/// most `chunk_size` long and each chunk after the first starts with the last
/// `chunk_overlap` characters of its predecessor.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 || chunk_overlap == 0 {
            return Err(ChunkingError::InvalidChunkSize(format!(
                "chunk_size ({}) and chunk_overlap ({}) must both be positive",
                chunk_size, chunk_overlap
            )));
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkingError::InvalidChunkSize(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Chunk every document, stamping all chunks with the same ingest timestamp
    pub fn chunk_documents(&self, documents: &[Document], timestamp: i64) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunk_document(doc, timestamp))
            .collect()
    }

    /// Chunk a single document
    pub fn chunk_document(&self, document: &Document, timestamp: i64) -> Vec<Chunk> {
        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk {
                id: chunk_id(&document.id, ordinal, &text),
                document_id: document.id.clone(),
                text,
                metadata: ChunkMetadata {
                    document: document.metadata.clone(),
                    timestamp,
                },
            })
            .collect()
    }

    /// Split text into windows; whitespace-only windows are dropped
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut pieces = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let hard_end = start + self.chunk_size;
            if hard_end >= chars.len() {
                push_piece(&mut pieces, &chars[start..]);
                break;
            }

            let end = self.find_split(&chars, start, hard_end);
            push_piece(&mut pieces, &chars[start..end]);
            start = end - self.chunk_overlap;
        }

        pieces
    }

    /// Pick the end of the window starting at `start`
    ///
    /// Candidates lie in `(floor, hard_end]` with `floor >= start + chunk_overlap`,
    /// so the next window always starts after this one did.
    fn find_split(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = (start + self.chunk_overlap).max(start + self.chunk_size / 2);

        let sentence_end = (floor + 1..=hard_end)
            .rev()
            .find(|&end| is_sentence_boundary(chars, end));
        if let Some(end) = sentence_end {
            return end;
        }

        let word_end = (floor + 1..=hard_end)
            .rev()
            .find(|&end| chars[end - 1].is_whitespace() && !chars[end].is_whitespace());
        word_end.unwrap_or(hard_end)
    }
}

/// A boundary at `end` means the window `[.., end)` finishes a sentence and the
/// next character starts a new one (after the terminator's trailing whitespace).
fn is_sentence_boundary(chars: &[char], end: usize) -> bool {
    if end == 0 || end >= chars.len() || chars[end].is_whitespace() {
        return false;
    }
    let mut i = end;
    while i > 0 && chars[i - 1].is_whitespace() && chars[i - 1] != '\n' {
        i -= 1;
    }
    i > 0 && SENTENCE_TERMINATORS.contains(&chars[i - 1])
}

fn push_piece(pieces: &mut Vec<String>, chars: &[char]) {
    if chars.iter().any(|c| !c.is_whitespace()) {
        pieces.push(chars.iter().collect());
    }
}

/// Deterministic chunk id derived from the document, ordinal and text
fn chunk_id(document_id: &str, ordinal: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(ordinal.to_le_bytes());
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    hash[..32].to_string()
}
