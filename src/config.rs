//! Process-wide configuration.
//!
//! Configuration is built once (usually from the environment, then overridden by
//! command-line flags) and handed to constructors explicitly. Nothing in the
//! library reads the environment on its own.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_EMBEDDING_BASE_URL, DEFAULT_EMBEDDING_MODEL, DEFAULT_TOP_N};

/// Top-level configuration for the recommender and the offline tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Path to the SQLite database holding recipes and embeddings.
    pub database_path: PathBuf,

    /// Number of recommendations returned when the caller does not ask for a count.
    pub top_n: usize,

    /// Embedding provider settings.
    pub embedding: EmbeddingSettings,
}

impl RecommenderConfig {
    /// Create a configuration with default values for the given database.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            top_n: DEFAULT_TOP_N,
            embedding: EmbeddingSettings::default(),
        }
    }

    /// Build a configuration from environment variables.
    ///
    /// Recognized variables: `RECIPES_DB`, `RECOMMEND_TOP_N`, plus everything
    /// [`EmbeddingSettings::from_env`] reads. Unset or unparsable values fall
    /// back to defaults.
    pub fn from_env() -> Self {
        let database_path = std::env::var("RECIPES_DB").unwrap_or_else(|_| "recipes.db".to_string());
        let top_n = std::env::var("RECOMMEND_TOP_N")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TOP_N);

        Self {
            database_path: PathBuf::from(database_path),
            top_n,
            embedding: EmbeddingSettings::from_env(),
        }
    }

    /// Set the embedding settings.
    pub fn with_embedding(mut self, embedding: EmbeddingSettings) -> Self {
        self.embedding = embedding;
        self
    }

    /// Set the default result count.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self::new("recipes.db")
    }
}

/// Settings for the OpenAI-compatible embedding endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// API credential. `None` means every embedding request fails with an
    /// authentication error.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API (without the `/embeddings` suffix).
    pub base_url: String,

    /// Embedding model identifier.
    pub model: String,

    /// Timeout applied to each embedding request.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl EmbeddingSettings {
    /// Read settings from the environment.
    ///
    /// The API key comes from `GEMINI_API_KEY`, falling back to `OPENAI_API_KEY`.
    /// `EMBEDDING_BASE_URL`, `EMBEDDING_MODEL` and `EMBEDDING_TIMEOUT_SECS`
    /// override the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_key = non_empty_var("GEMINI_API_KEY").or_else(|| non_empty_var("OPENAI_API_KEY"));
        let timeout = non_empty_var("EMBEDDING_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            api_key,
            base_url: non_empty_var("EMBEDDING_BASE_URL").unwrap_or(defaults.base_url),
            model: non_empty_var("EMBEDDING_MODEL").unwrap_or(defaults.model),
            timeout,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

// The key never shows up in logs.
impl std::fmt::Debug for EmbeddingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
