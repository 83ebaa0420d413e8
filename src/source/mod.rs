//! Recipe source module.
//!
//! A `RecipeSource` yields recipes that are not yet stored, for the ingestion
//! pipeline to insert. Sources return recipes without identifiers; the store
//! assigns those on insert.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Recipe;

pub mod json;

/// Errors that can occur when reading recipes from a source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse or validate the data
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Other source-specific errors
    #[error("Source error: {0}")]
    Other(String),
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Trait for reading recipes from an external source.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    /// Fetch all recipes from this source.
    ///
    /// # Errors
    /// Returns `SourceError` if the data cannot be read or an entry is invalid
    async fn fetch_recipes(&self) -> SourceResult<Vec<Recipe>>;

    /// Fetch at most `limit` recipes.
    async fn fetch_recipes_limit(&self, limit: usize) -> SourceResult<Vec<Recipe>> {
        let all = self.fetch_recipes().await?;
        Ok(all.into_iter().take(limit).collect())
    }

    /// Number of recipes this source holds.
    async fn count_recipes(&self) -> SourceResult<usize> {
        self.fetch_recipes().await.map(|recipes| recipes.len())
    }

    /// Human-readable name, for logs.
    fn name(&self) -> &str;
}
