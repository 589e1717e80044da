/// Configuration system for easy-rag
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, RagError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation service configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Raw corpus and index locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval and context budget configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Secret credential. Never serialized back to disk and redacted in Debug output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key, for building request headers only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("ApiKey(<unset>)")
        } else {
            f.write_str("ApiKey(***)")
        }
    }
}

/// Embedding service configuration (OpenAI-compatible `/embeddings` endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL, e.g. "https://dashscope.aliyuncs.com/compatible-mode/v1"
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Model name (e.g., "text-embedding-v4")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Dimension every vector in an index must have
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Texts per embedding request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout in seconds for a single embedding request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing)]
    pub api_key: ApiKey,
}

/// Generation service configuration (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Timeout in seconds for a generation request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing)]
    pub api_key: ApiKey,
}

/// Where raw documents and indexes live; each namespace gets a subdirectory of both
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// How long an ingest waits for another process holding the namespace lock
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
}

/// Chunking configuration (sizes in characters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Default number of passages to retrieve
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Largest top_k a caller may request
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    /// Token allowance for the assembled context
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: usize,
}

// Default value functions
fn default_embedding_base_url() -> String {
    "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-v4".to_string()
}

fn default_embedding_dimension() -> usize {
    1024
}

fn default_batch_size() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_generation_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_generation_model() -> String {
    "deepseek-chat".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_raw_dir() -> PathBuf {
    crate::paths::PlatformPaths::default_raw_dir()
}

fn default_index_dir() -> PathBuf {
    crate::paths::PlatformPaths::default_index_dir()
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    120
}

fn default_top_k() -> usize {
    6
}

fn default_max_top_k() -> usize {
    20
}

fn default_context_token_budget() -> usize {
    2500
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            api_key: ApiKey::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            model: default_generation_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            api_key: ApiKey::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            index_dir: default_index_dir(),
            lock_timeout_secs: default_lock_timeout_secs(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            context_token_budget: default_context_token_budget(),
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> RagError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, RagError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, RagError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file. API keys are never written.
    pub fn save(&self, path: &Path) -> Result<(), RagError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RagError> {
        if self.embedding.dimension == 0 {
            return Err(invalid("embedding.dimension", "must be greater than 0"));
        }

        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size", "must be greater than 0"));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(invalid("embedding.timeout_secs", "must be greater than 0"));
        }

        if self.generation.timeout_secs == 0 {
            return Err(invalid("generation.timeout_secs", "must be greater than 0"));
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(invalid(
                "generation.temperature",
                format!(
                    "must be between 0.0 and 2.0, got {}",
                    self.generation.temperature
                ),
            ));
        }

        if self.chunking.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size", "must be greater than 0"));
        }

        if self.chunking.chunk_overlap == 0 {
            return Err(invalid("chunking.chunk_overlap", "must be greater than 0"));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(invalid(
                "chunking.chunk_overlap",
                format!(
                    "must be less than chunk_size ({}), got {}",
                    self.chunking.chunk_size, self.chunking.chunk_overlap
                ),
            ));
        }

        if self.retrieval.max_top_k == 0 {
            return Err(invalid("retrieval.max_top_k", "must be greater than 0"));
        }

        if self.retrieval.top_k == 0 || self.retrieval.top_k > self.retrieval.max_top_k {
            return Err(invalid(
                "retrieval.top_k",
                format!(
                    "must be between 1 and {}, got {}",
                    self.retrieval.max_top_k, self.retrieval.top_k
                ),
            ));
        }

        if self.retrieval.context_token_budget == 0 {
            return Err(invalid(
                "retrieval.context_token_budget",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup (the process environment in production)
    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(k).filter(|v| !v.is_empty()));

        if let Some(key) = first(&["EASY_RAG_EMBED_API_KEY", "QWEN_API_KEY"]) {
            self.embedding.api_key = ApiKey::new(key);
        }

        if let Some(url) = first(&["EASY_RAG_EMBED_BASE_URL"]) {
            self.embedding.base_url = url;
        }

        if let Some(model) = first(&["EASY_RAG_EMBED_MODEL", "EMBED_MODEL"]) {
            self.embedding.model = model;
        }

        if let Some(dimension) = first(&["EASY_RAG_EMBED_DIMENSION"])
            && let Ok(dim) = dimension.parse()
        {
            self.embedding.dimension = dim;
        }

        if let Some(key) = first(&["EASY_RAG_GENERATION_API_KEY", "DEEPSEEK_API_KEY"]) {
            self.generation.api_key = ApiKey::new(key);
        }

        if let Some(url) = first(&["EASY_RAG_GENERATION_BASE_URL", "DEEPSEEK_BASE_URL"]) {
            self.generation.base_url = url;
        }

        if let Some(model) = first(&["EASY_RAG_GENERATION_MODEL", "DEEPSEEK_MODEL"]) {
            self.generation.model = model;
        }

        if let Some(path) = first(&["EASY_RAG_RAW_DIR", "RAW_DIR"]) {
            self.storage.raw_dir = PathBuf::from(path);
        }

        if let Some(path) = first(&["EASY_RAG_INDEX_DIR", "INDEX_DIR"]) {
            self.storage.index_dir = PathBuf::from(path);
        }

        if let Some(top_k) = first(&["EASY_RAG_TOP_K"])
            && let Ok(k) = top_k.parse()
        {
            self.retrieval.top_k = k;
        }

        if let Some(budget) = first(&["EASY_RAG_CONTEXT_TOKEN_BUDGET"])
            && let Ok(b) = budget.parse()
        {
            self.retrieval.context_token_budget = b;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, RagError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::new`] but reading the given file instead of the default location
    pub fn with_file(path: &Path) -> Result<Self, RagError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
