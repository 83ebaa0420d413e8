//! Query processing: embed, rank, join.
//!
//! [`RecipeRecommender`] is the public entry point. It embeds the query text,
//! ranks every stored embedding by cosine similarity, and resolves the winners
//! into full recipes in rank order.
//!
//! # Usage
//!
//! ```rust,no_run
//! use recipe_recommender::config::EmbeddingSettings;
//! use recipe_recommender::embedding::openai::OpenAIEmbedding;
//! use recipe_recommender::query::RecipeRecommender;
//! use recipe_recommender::storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenAIEmbedding::new(EmbeddingSettings::from_env())?;
//! let storage = SqliteStorage::open("recipes.db")?;
//! let recommender = RecipeRecommender::new(provider, storage);
//!
//! // Never fails: any error degrades to an empty list
//! for rec in recommender.find_similar("something warm with lentils", 4).await {
//!     println!("{} - {:.3}", rec.recipe.name, rec.similarity_score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod joiner;
pub mod ranker;

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RecommenderConfig;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::models::RecommendedRecipe;
use crate::storage::{EmbeddingStore, RecipeStore, StorageError};

pub use ranker::{cosine_similarity, SimilarityError};

/// Errors that can occur during query processing.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Empty or whitespace-only query text
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Storage access failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The query vector could not be compared
    #[error("Similarity error: {0}")]
    Similarity(#[from] SimilarityError),

    /// The embedding provider did not answer in time
    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),
}

impl QueryError {
    /// Pipeline stage the error came from, for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            QueryError::InvalidQuery(_) => "validate",
            QueryError::Embedding(_) | QueryError::Timeout(_) => "embed",
            QueryError::Storage(_) => "store",
            QueryError::Similarity(_) => "rank",
        }
    }
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Recommends stored recipes for free-text queries.
///
/// Holds no per-query state; every call is an independent embed, rank and join.
pub struct RecipeRecommender<E, S>
where
    E: EmbeddingProvider,
    S: RecipeStore + EmbeddingStore,
{
    /// Embedding provider for query embedding
    embedding_provider: E,

    /// Storage backend for embeddings and recipe details
    storage: S,

    /// Upper bound on the provider call
    embed_timeout: Duration,

    /// Result count used by [`RecipeRecommender::recommend`]
    default_top_n: usize,
}

impl<E, S> RecipeRecommender<E, S>
where
    E: EmbeddingProvider,
    S: RecipeStore + EmbeddingStore,
{
    /// Create a recommender with a 30 second embedding timeout.
    ///
    /// # Arguments
    /// * `embedding_provider` - Provider for generating query embeddings
    /// * `storage` - Store holding recipes and their embeddings
    pub fn new(embedding_provider: E, storage: S) -> Self {
        Self {
            embedding_provider,
            storage,
            embed_timeout: Duration::from_secs(30),
            default_top_n: crate::DEFAULT_TOP_N,
        }
    }

    /// Create a recommender using the timeout and result count from `config`.
    pub fn from_config(embedding_provider: E, storage: S, config: &RecommenderConfig) -> Self {
        Self::new(embedding_provider, storage)
            .with_embed_timeout(config.embedding.timeout)
            .with_default_top_n(config.top_n)
    }

    /// Set the embedding timeout.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// Set the result count used by [`RecipeRecommender::recommend`].
    pub fn with_default_top_n(mut self, top_n: usize) -> Self {
        self.default_top_n = top_n;
        self
    }

    /// The underlying store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The configured default result count.
    pub fn default_top_n(&self) -> usize {
        self.default_top_n
    }

    /// Find the `top_n` recipes most similar to `query`.
    ///
    /// Never fails. Any error along the way is logged and yields an empty list,
    /// which callers should present as "no matches".
    pub async fn find_similar(&self, query: &str, top_n: usize) -> Vec<RecommendedRecipe> {
        match self.try_find_similar(query, top_n).await {
            Ok(results) => results,
            Err(e) => {
                warn!(stage = e.stage(), error = %e, "recommendation failed, returning no results");
                Vec::new()
            }
        }
    }

    /// [`RecipeRecommender::find_similar`] with the configured default result count.
    pub async fn recommend(&self, query: &str) -> Vec<RecommendedRecipe> {
        self.find_similar(query, self.default_top_n).await
    }

    /// Find similar recipes, reporting failures as typed errors.
    ///
    /// # Returns
    /// Up to `top_n` recipes in descending similarity order
    ///
    /// # Errors
    /// - `InvalidQuery` for blank query text (the provider is not called)
    /// - `Embedding` or `Timeout` if the provider fails
    /// - `Storage` if the embedding scan or the detail lookup fails
    /// - `Similarity` if the provider returns an empty or all-zero vector
    pub async fn try_find_similar(&self, query: &str, top_n: usize) -> QueryResult<Vec<RecommendedRecipe>> {
        if query.trim().is_empty() {
            return Err(QueryError::InvalidQuery("query text is empty".to_string()));
        }
        if top_n == 0 {
            return Ok(Vec::new());
        }

        // 1. Embed the query text
        let query_embedding = tokio::time::timeout(self.embed_timeout, self.embedding_provider.embed(query))
            .await
            .map_err(|_| QueryError::Timeout(self.embed_timeout))??;

        // 2. Rank every stored embedding
        let stored = self.storage.get_all_embeddings().await?;
        let ranked = ranker::rank(&query_embedding, &stored, top_n)?;
        debug!(stored = stored.len(), ranked = ranked.len(), "ranking complete");

        // 3. Resolve details in rank order
        let results = joiner::join(&self.storage, &ranked).await?;

        info!(
            top_n,
            returned = results.len(),
            model = self.embedding_provider.model_name(),
            "query answered"
        );
        Ok(results)
    }
}
