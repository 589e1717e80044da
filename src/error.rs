/// Centralized error types for easy-rag using thiserror
///
/// Lower layers return the narrow error enums below; the pipeline bubbles them up
/// unchanged inside [`RagError`] so callers can branch on the failure kind.
use thiserror::Error;

/// Main error type for the RAG pipeline
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Index for knowledge base '{namespace}' not found: {reason}. Run ingest first")]
    IndexNotFound { namespace: String, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error(
        "No matching context in knowledge base '{namespace}'. Ingest material relevant to the question first"
    )]
    NoContext { namespace: String },

    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while building an index from a raw corpus
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No documents found in '{0}'")]
    NoDocuments(String),

    #[error("Failed to build index: {0}")]
    IndexBuild(String),

    #[error("Another ingest of '{0}' is still running")]
    Busy(String),
}

/// Errors from the embedding service adapter
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding API key is not configured")]
    MissingCredentials,

    #[error("Embedding request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Embedding request failed: {0}")]
    Request(String),

    #[error("Embedding service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("Embedding service returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors from the generation service adapter
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation API key is missing or is a placeholder")]
    MissingCredentials,

    #[error("Generation request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Generation request failed: {0}")]
    Request(String),

    #[error("Generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),
}

/// Errors related to text chunking
#[derive(Error, Debug)]
pub enum ChunkingError {
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid knowledge base name: {0}")]
    InvalidNamespace(String),

    #[error("{field} must be {constraint}, got {actual}")]
    ConstraintViolation {
        field: String,
        constraint: String,
        actual: String,
    },

    #[error("Empty {0}")]
    Empty(String),
}

/// How a failure should be reported to whoever called the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller can fix it (bad input, missing ingest, nothing relevant indexed)
    ClientInput,
    /// An external service (embedding or generation) misbehaved
    Upstream,
    /// Local failure such as IO or a broken configuration
    Internal,
}

// Conversion from anyhow::Error to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Other(format!("{:#}", err))
    }
}

impl RagError {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        RagError::Other(msg.into())
    }

    pub fn index_not_found(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        RagError::IndexNotFound {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    /// Classify the error for reporting
    pub fn class(&self) -> ErrorClass {
        match self {
            RagError::Ingest(_)
            | RagError::IndexNotFound { .. }
            | RagError::NoContext { .. }
            | RagError::Chunking(_)
            | RagError::Validation(_) => ErrorClass::ClientInput,
            RagError::Embedding(_) | RagError::Generation(_) => ErrorClass::Upstream,
            RagError::Config(_) | RagError::Io(_) | RagError::Other(_) => ErrorClass::Internal,
        }
    }

    /// Check if this is a user error (validation, not found) vs system error
    pub fn is_user_error(&self) -> bool {
        self.class() == ErrorClass::ClientInput
    }

    /// Check if the primary index loader failure can be recovered by the fallback path
    pub fn is_index_not_found(&self) -> bool {
        matches!(self, RagError::IndexNotFound { .. })
    }
}

/// Cut a response body down to at most `max_chars` characters for error messages
pub(crate) fn truncate_body(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}
