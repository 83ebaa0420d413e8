//! Recipe Recommender - similarity search over a recipe corpus.
//!
//! Given free-text input (typically a user's accumulated chat messages), the
//! library embeds the text, ranks every stored recipe embedding by cosine
//! similarity, and returns the best matches with their full recipe details.
//!
//! # Architecture
//!
//! - **models**: `Recipe`, `RankedRecipe`, `RecommendedRecipe`
//! - **embedding**: Embedding provider trait, OpenAI-compatible and fastembed providers,
//!   LLM recipe overviews
//! - **storage**: Recipe and embedding stores (SQLite-based)
//! - **query**: Cosine ranking, detail join, and the `RecipeRecommender` entry point
//! - **source**: Recipe input files for ingestion
//! - **ingestion**: Offline loading, embedding, and consistency audit
//! - **config**: Explicit process configuration
//!
//! # Workflow
//!
//! ## Offline Ingestion
//!
//! 1. Load recipes from a JSON source into the recipe store
//! 2. Render each recipe as text, optionally with an LLM-written overview, and
//!    embed it (with bounded retries)
//! 3. Store one embedding per recipe, skipping recipes that already have one
//!
//! ## Online Query
//!
//! 1. Embed the query text
//! 2. Score every stored embedding by cosine similarity
//! 3. Keep the top N and resolve them to full recipes in rank order
//! 4. On any failure, log it and return an empty list
//!
//! # Example
//!
//! ```ignore
//! use recipe_recommender::{
//!     config::RecommenderConfig,
//!     embedding::openai::OpenAIEmbedding,
//!     query::RecipeRecommender,
//!     storage::sqlite::SqliteStorage,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RecommenderConfig::from_env();
//!     let embedding = OpenAIEmbedding::new(config.embedding.clone())?;
//!     let storage = SqliteStorage::open(&config.database_path)?;
//!     let recommender = RecipeRecommender::from_config(embedding, storage, &config);
//!
//!     for rec in recommender.recommend("I have chickpeas and spinach").await {
//!         println!("{}: {:.3}", rec.recipe.name, rec.similarity_score);
//!     }
//!     Ok(())
//! }
//! ```

// Public modules
pub mod config;
pub mod embedding;
pub mod ingestion;
pub mod models;
pub mod query;
pub mod source;
pub mod storage;

// Re-export commonly used types at the crate root
pub use config::{EmbeddingSettings, RecommenderConfig};
pub use embedding::{EmbeddingError, EmbeddingProvider};
pub use models::{RankedRecipe, Recipe, RecommendedRecipe};
pub use query::{QueryError, RecipeRecommender};
pub use storage::{EmbeddingStore, RecipeStore, StorageError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of recommendations
pub const DEFAULT_TOP_N: usize = 4;

/// Default embedding model name
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

/// Default embedding dimension for text-embedding-004
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

/// Chat model that writes recipe overviews during ingestion
pub const DEFAULT_OVERVIEW_MODEL: &str = "gemini-2.5-flash";

/// Gemini's OpenAI-compatible API root
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
