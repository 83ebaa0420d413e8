//! FastEmbed embedding provider implementation.
//!
//! Runs a sentence-embedding model locally through the fastembed library, so
//! the offline tools can build and query a recipe database without an API key.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Local fastembed provider.
#[derive(Clone)]
pub struct FastEmbedProvider {
    /// The embedding model instance (wrapped in Arc<Mutex> for thread-safety)
    model: Arc<Mutex<TextEmbedding>>,

    /// Model identifier
    model_name: String,

    /// Expected dimension of the embedding vectors
    embedding_dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider.
    ///
    /// # Arguments
    /// * `model` - Optional model to use (defaults to AllMiniLML6V2)
    /// * `cache_dir` - Optional cache directory for model files
    ///
    /// # Errors
    /// Returns `EmbeddingError::Provider` if the model cannot be loaded
    pub fn new(model: Option<EmbeddingModel>, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let model_type = model.unwrap_or(EmbeddingModel::AllMiniLML6V2);
        let model_name = format!("{:?}", model_type);
        let embedding_dimension = dimension_of(&model_type);

        let mut init_options = InitOptions::new(model_type);
        if let Some(dir) = cache_dir {
            init_options = init_options.with_cache_dir(dir);
        }

        let text_embedding = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::Provider(format!("Failed to initialize FastEmbed model: {}", e)))?;

        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            model_name,
            embedding_dimension,
        })
    }

    /// Create a provider from a model name as written on the command line.
    ///
    /// # Errors
    /// Returns `EmbeddingError::InvalidInput` for unknown names
    pub fn from_model_name(name: &str, cache_dir: Option<PathBuf>) -> EmbeddingResult<Self> {
        let model = parse_model_name(name)
            .ok_or_else(|| EmbeddingError::InvalidInput(format!("Unknown FastEmbed model: {name}")))?;
        Self::new(Some(model), cache_dir)
    }
}

/// Map a user-facing model name onto a fastembed model.
///
/// Accepts the `Debug` spelling stored as the provider's `model_name` as well as
/// the Hugging Face style names.
pub fn parse_model_name(name: &str) -> Option<EmbeddingModel> {
    let key = name.to_ascii_lowercase().replace(['-', '_', '.', '/'], "");
    let model = match key.as_str() {
        "allminilml6v2" | "sentencetransformersallminilml6v2" => EmbeddingModel::AllMiniLML6V2,
        "bgesmallenv15" | "baaibgesmallenv15" => EmbeddingModel::BGESmallENV15,
        "bgebaseenv15" | "baaibgebaseenv15" => EmbeddingModel::BGEBaseENV15,
        "bgelargeenv15" | "baaibgelargeenv15" => EmbeddingModel::BGELargeENV15,
        "nomicembedtextv1" | "nomicainomicembedtextv1" => EmbeddingModel::NomicEmbedTextV1,
        "nomicembedtextv15" | "nomicainomicembedtextv15" => EmbeddingModel::NomicEmbedTextV15,
        _ => return None,
    };
    Some(model)
}

fn dimension_of(model: &EmbeddingModel) -> usize {
    match model {
        EmbeddingModel::AllMiniLML6V2 => 384,
        EmbeddingModel::BGESmallENV15 => 384,
        EmbeddingModel::BGEBaseENV15 => 768,
        EmbeddingModel::BGELargeENV15 => 1024,
        EmbeddingModel::NomicEmbedTextV1 => 768,
        EmbeddingModel::NomicEmbedTextV15 => 768,
        _ => 384,
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }

        let mut model = self.model.lock().await;
        let embeddings = model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::Provider(format!("Embedding generation failed: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Provider("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput("All texts must be non-empty".to_string()));
        }

        let mut model = self.model.lock().await;
        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        model
            .embed(text_strings, None)
            .map_err(|e| EmbeddingError::Provider(format!("Batch embedding generation failed: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

// TextEmbedding does not implement Debug
impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model_name", &self.model_name)
            .field("embedding_dimension", &self.embedding_dimension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_name() {
        assert!(matches!(parse_model_name("AllMiniLML6V2"), Some(EmbeddingModel::AllMiniLML6V2)));
        assert!(matches!(
            parse_model_name("sentence-transformers/all-MiniLM-L6-v2"),
            Some(EmbeddingModel::AllMiniLML6V2)
        ));
        assert!(matches!(parse_model_name("BAAI/bge-base-en-v1.5"), Some(EmbeddingModel::BGEBaseENV15)));
        assert!(parse_model_name("text-embedding-004").is_none());
    }

    #[test]
    fn test_dimensions() {
        assert_eq!(dimension_of(&EmbeddingModel::AllMiniLML6V2), 384);
        assert_eq!(dimension_of(&EmbeddingModel::BGELargeENV15), 1024);
    }

    // The tests below download model weights on first run.

    #[tokio::test]
    #[ignore]
    async fn test_embed_recipe_text() {
        let provider = FastEmbedProvider::new(None, None).unwrap();
        let embedding = provider.embed("Recipe: Tomato Soup\nIngredients:\n- tomatoes").await.unwrap();

        assert_eq!(embedding.len(), provider.dimension());
        assert!(embedding.iter().all(|x| x.is_finite()));
    }

    #[tokio::test]
    #[ignore]
    async fn test_batch_matches_single() {
        let provider = FastEmbedProvider::new(None, None).unwrap();
        let single = provider.embed("apple pie").await.unwrap();
        let batch = provider.embed_batch(&["apple pie", "pancakes"]).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(single, batch[0]);
    }

    #[tokio::test]
    #[ignore]
    async fn test_empty_text_rejected() {
        let provider = FastEmbedProvider::new(None, None).unwrap();
        assert!(matches!(provider.embed("   ").await, Err(EmbeddingError::InvalidInput(_))));
        assert!(matches!(
            provider.embed_batch(&["ok", ""]).await,
            Err(EmbeddingError::InvalidInput(_))
        ));
    }
}
