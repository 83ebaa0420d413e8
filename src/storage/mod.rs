//! Storage layer abstraction and implementations.
//!
//! This module defines the interfaces for persisting and retrieving recipes and
//! their precomputed embeddings. The two stores are separate traits because they
//! have separate lifecycles: recipes are written by ingestion or user
//! submission, embeddings by an offline batch job that runs afterwards.
//!
//! Both stores are read-only from the query path's point of view.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Recipe;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Data serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Schema or migration error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Other unexpected errors
    #[error("Unexpected storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// One row of the embedding store as read back at query time.
///
/// The vector is decoded per row so a single corrupt row surfaces as a
/// per-record error instead of failing the whole scan.
#[derive(Debug)]
pub struct StoredEmbedding {
    /// Identifier of the recipe the vector belongs to
    pub recipe_id: i64,

    /// The decoded vector, or why it could not be decoded
    pub vector: StorageResult<Vec<f32>>,
}

impl StoredEmbedding {
    /// A successfully decoded row.
    pub fn new(recipe_id: i64, vector: Vec<f32>) -> Self {
        Self {
            recipe_id,
            vector: Ok(vector),
        }
    }

    /// A row whose stored vector could not be decoded.
    pub fn malformed(recipe_id: i64, error: StorageError) -> Self {
        Self {
            recipe_id,
            vector: Err(error),
        }
    }
}

/// Trait for recipe storage backends.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Insert a new recipe.
    ///
    /// Any `id` already set on `recipe` is ignored; the store assigns one.
    ///
    /// # Returns
    /// The assigned recipe ID
    async fn insert_recipe(&mut self, recipe: &Recipe) -> StorageResult<i64>;

    /// Get a recipe by its ID.
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if the recipe doesn't exist
    async fn get_recipe(&self, id: i64) -> StorageResult<Recipe>;

    /// Fetch the recipes for the given IDs.
    ///
    /// IDs without a row are left out. The returned order is unspecified.
    async fn get_recipes(&self, ids: &[i64]) -> StorageResult<Vec<Recipe>> {
        let mut recipes = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.get_recipe(id).await {
                Ok(recipe) => recipes.push(recipe),
                Err(StorageError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(recipes)
    }

    /// List all recipe IDs in ascending order.
    async fn list_recipe_ids(&self) -> StorageResult<Vec<i64>>;

    /// Get the total count of recipes in storage.
    async fn count_recipes(&self) -> StorageResult<usize>;
}

/// Trait for embedding storage backends.
///
/// Holds at most one vector per recipe ID.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Read every stored embedding.
    ///
    /// Rows come back in a stable order (ascending recipe ID for the SQLite
    /// backend), which is what ranking tie-breaks rely on.
    async fn get_all_embeddings(&self) -> StorageResult<Vec<StoredEmbedding>>;

    /// Check whether an embedding exists for the recipe.
    async fn embedding_exists(&self, recipe_id: i64) -> StorageResult<bool>;

    /// Store an embedding unless one already exists for the recipe.
    ///
    /// # Returns
    /// `true` if a row was written, `false` if one was already present
    async fn insert_embedding_if_absent(&mut self, recipe_id: i64, vector: &[f32]) -> StorageResult<bool>;

    /// List recipe IDs that have an embedding, in ascending order.
    async fn list_embedding_ids(&self) -> StorageResult<Vec<i64>>;

    /// Get the total count of stored embeddings.
    async fn count_embeddings(&self) -> StorageResult<usize>;
}
