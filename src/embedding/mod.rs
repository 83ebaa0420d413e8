//! Embedding provider abstraction and implementations.
//!
//! This module defines the interface for text embedding generation and provides
//! implementations for a remote OpenAI-compatible service and a local fastembed
//! model.
//!
//! The rest of the crate treats a provider as a black box mapping text to a
//! fixed-length vector; nothing downstream depends on how the vector is computed.

pub mod fastembed;
pub mod openai;
pub mod overview;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Recipe;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Missing or rejected credential
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Network failure, timeout, rate limit or server-side error
    #[error("Transient provider failure: {0}")]
    Transient(String),

    /// The provider answered with something that is not an embedding
    #[error("Provider error: {0}")]
    Provider(String),

    /// Invalid input text (e.g., empty)
    #[error("Invalid input text: {0}")]
    InvalidInput(String),
}

impl EmbeddingError {
    /// Whether retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, EmbeddingError::Transient(_))
    }
}

/// Result type for embedding operations.
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Trait for text embedding providers.
///
/// The trait is async to support API-based embedding services.
///
/// # Example Usage
/// ```ignore
/// let provider = OpenAIEmbedding::new(settings)?;
/// let embedding = provider.embed("chicken and rice").await?;
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    ///
    /// # Errors
    /// Returns `EmbeddingError` if the embedding generation fails
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Generate embeddings for multiple texts, in input order.
    ///
    /// The default implementation embeds one text at a time.
    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Get the dimension of embeddings produced by this provider.
    fn dimension(&self) -> usize;

    /// Get the model name/identifier for this provider.
    fn model_name(&self) -> &str;
}

/// Render a recipe as the text that gets embedded for it.
///
/// Every field contributes a labelled line so recipes with sparse metadata
/// still produce comparable inputs. Missing numeric fields render as `N/A`.
///
/// # Example
/// ```ignore
/// let text = format_recipe_text(&recipe);
/// assert!(text.starts_with("Recipe: Tomato Soup"));
/// ```
pub fn format_recipe_text(recipe: &Recipe) -> String {
    fn or_na(value: Option<u32>) -> String {
        value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
    }

    let mut lines = vec![
        format!("Recipe: {}", recipe.name),
        format!("Description: {}", recipe.description.as_deref().unwrap_or("")),
        format!("Cuisine Type: {}", recipe.cuisine_type.as_deref().unwrap_or("")),
        "Ingredients:".to_string(),
    ];
    lines.extend(recipe.ingredients.iter().map(|ingredient| format!("- {ingredient}")));
    lines.push("Instructions:".to_string());
    lines.extend(
        recipe
            .instructions
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {step}", i + 1)),
    );
    lines.push(format!("Prep Time: {} minutes", or_na(recipe.prep_time)));
    lines.push(format!("Cook Time: {} minutes", or_na(recipe.cook_time)));
    lines.push(format!("Total Time: {} minutes", or_na(recipe.total_time)));
    lines.push(format!("Servings: {}", or_na(recipe.servings)));

    lines.join("\n")
}

/// [`format_recipe_text`] followed by a generated overview section.
pub fn format_recipe_text_with_overview(recipe: &Recipe, overview: &str) -> String {
    format!("{}\n\nOverview:\n{}", format_recipe_text(recipe), overview)
}

/// Either built-in provider, chosen at runtime (e.g. from a command-line flag).
#[derive(Debug)]
pub enum DynamicEmbeddingProvider {
    FastEmbed(fastembed::FastEmbedProvider),
    OpenAI(openai::OpenAIEmbedding),
}

#[async_trait]
impl EmbeddingProvider for DynamicEmbeddingProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed(text).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed(text).await,
        }
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed_batch(texts).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed_batch(texts).await,
        }
    }

    fn dimension(&self) -> usize {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.dimension(),
            DynamicEmbeddingProvider::OpenAI(p) => p.dimension(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.model_name(),
            DynamicEmbeddingProvider::OpenAI(p) => p.model_name(),
        }
    }
}
