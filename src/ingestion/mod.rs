//! Ingestion pipeline module.
//!
//! Offline jobs that fill the stores the query path reads from: loading
//! recipes, embedding every recipe that has no vector yet, and auditing the two
//! stores against each other.
//!
//! ```ignore
//! use recipe_recommender::embedding::overview::ChatOverviewGenerator;
//! use recipe_recommender::ingestion::{IngestionPipeline, RetryPolicy};
//! use recipe_recommender::DEFAULT_OVERVIEW_MODEL;
//! use recipe_recommender::source::json::JsonFileRecipeSource;
//!
//! let mut pipeline = IngestionPipeline::new(provider, storage, RetryPolicy::default())
//!     .with_overview(ChatOverviewGenerator::new(&settings, DEFAULT_OVERVIEW_MODEL)?);
//! pipeline.load_from_source(&JsonFileRecipeSource::new("recipes.json")).await?;
//! let stats = pipeline.embed_missing().await?;
//! println!("Inserted: {}, already embedded: {}", stats.inserted, stats.already_embedded);
//! ```
//!
//! Embedding is idempotent: a recipe that already has a vector is skipped, and
//! the store's insert-if-absent guards against a concurrent writer.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::embedding::overview::OverviewGenerator;
use crate::embedding::{
    format_recipe_text, format_recipe_text_with_overview, EmbeddingError, EmbeddingProvider, EmbeddingResult,
};
use crate::models::Recipe;
use crate::source::{RecipeSource, SourceError};
use crate::storage::{EmbeddingStore, RecipeStore, StorageError};

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Storage operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Source could not be read
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Bounded retry for transient provider failures (embedding and overview calls).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per recipe, including the first
    pub max_attempts: u32,

    /// Fixed pause between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(5))
    }
}

/// Statistics from an embedding run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionStats {
    /// Total number of recipes looked at
    pub total_processed: usize,

    /// Number of embeddings written
    pub inserted: usize,

    /// Number of recipes that already had an embedding
    pub already_embedded: usize,

    /// Number of recipes that could not be embedded or stored
    pub failed: usize,
}

impl IngestionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a written embedding.
    pub fn record_inserted(&mut self) {
        self.total_processed += 1;
        self.inserted += 1;
    }

    /// Record a recipe that was skipped because it already had an embedding.
    pub fn record_already_embedded(&mut self) {
        self.total_processed += 1;
        self.already_embedded += 1;
    }

    /// Record a failed recipe.
    pub fn record_failed(&mut self) {
        self.total_processed += 1;
        self.failed += 1;
    }
}

/// Cross-check between the recipe store and the embedding store.
///
/// Both lists are in ascending id order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Embeddings whose recipe no longer exists
    pub orphaned_embeddings: Vec<i64>,

    /// Recipes that have no embedding yet
    pub missing_embeddings: Vec<i64>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_embeddings.is_empty() && self.missing_embeddings.is_empty()
    }
}

/// Ingestion pipeline coordinator.
pub struct IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: RecipeStore + EmbeddingStore,
{
    /// Embedding provider for generating recipe embeddings
    embedding_provider: E,

    /// Storage backend for recipes and embeddings
    storage: S,

    retry: RetryPolicy,

    /// When set, each recipe's text gets a generated overview before embedding
    overview: Option<Box<dyn OverviewGenerator>>,
}

impl<E, S> IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: RecipeStore + EmbeddingStore,
{
    /// Create a pipeline over an initialized store.
    ///
    /// # Arguments
    /// * `embedding_provider` - Provider for generating embeddings
    /// * `storage` - Store holding recipes and embeddings
    /// * `retry` - Retry policy for transient embedding failures
    pub fn new(embedding_provider: E, storage: S, retry: RetryPolicy) -> Self {
        Self {
            embedding_provider,
            storage,
            retry,
            overview: None,
        }
    }

    /// Append a generated overview to every recipe text before embedding it.
    ///
    /// A recipe whose overview cannot be generated is counted as failed and
    /// left without an embedding, so a later run picks it up again.
    pub fn with_overview(mut self, generator: impl OverviewGenerator + 'static) -> Self {
        self.overview = Some(Box::new(generator));
        self
    }

    /// The underlying store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Consume the pipeline and return the store.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Insert recipes into the recipe store. See [`load_recipes`].
    pub async fn load_recipes(&mut self, recipes: &[Recipe]) -> IngestionResult<Vec<i64>> {
        load_recipes(&mut self.storage, recipes).await
    }

    /// Fetch every recipe from `source` and insert it.
    ///
    /// # Errors
    /// Returns `IngestionError::Source` if the source cannot be read, otherwise
    /// as [`IngestionPipeline::load_recipes`]
    pub async fn load_from_source<P>(&mut self, source: &P) -> IngestionResult<Vec<i64>>
    where
        P: RecipeSource,
    {
        let recipes = source.fetch_recipes().await?;
        debug!(source = source.name(), count = recipes.len(), "fetched recipes");
        self.load_recipes(&recipes).await
    }

    /// Embed every stored recipe that has no embedding yet.
    ///
    /// Failures on individual recipes are logged and counted; the run continues.
    ///
    /// # Errors
    /// Returns `IngestionError::Storage` only if the recipe ids cannot be listed
    pub async fn embed_missing(&mut self) -> IngestionResult<IngestionStats> {
        self.embed_missing_with_progress(|_| {}).await
    }

    /// Like [`IngestionPipeline::embed_missing`], calling `on_progress` after each recipe.
    pub async fn embed_missing_with_progress<F>(&mut self, mut on_progress: F) -> IngestionResult<IngestionStats>
    where
        F: FnMut(&IngestionStats),
    {
        let ids = self.storage.list_recipe_ids().await?;
        let mut stats = IngestionStats::new();

        for recipe_id in ids {
            match self.embed_recipe(recipe_id).await {
                Ok(true) => stats.record_inserted(),
                Ok(false) => stats.record_already_embedded(),
                Err(e) => {
                    warn!(recipe_id, stage = "ingest", error = %e, "failed to embed recipe");
                    stats.record_failed();
                }
            }
            on_progress(&stats);
        }

        info!(
            total = stats.total_processed,
            inserted = stats.inserted,
            already_embedded = stats.already_embedded,
            failed = stats.failed,
            "embedding run finished"
        );
        Ok(stats)
    }

    /// Embed and store one recipe unless it already has an embedding.
    ///
    /// # Returns
    /// `true` if an embedding was written, `false` if one already existed
    ///
    /// # Errors
    /// Returns the storage error for a missing recipe or failed write, or the
    /// embedding error once retries are exhausted
    pub async fn embed_recipe(&mut self, recipe_id: i64) -> IngestionResult<bool> {
        if self.storage.embedding_exists(recipe_id).await? {
            debug!(recipe_id, "embedding already present");
            return Ok(false);
        }

        let recipe = self.storage.get_recipe(recipe_id).await?;
        let text = match &self.overview {
            Some(generator) => {
                let recipe = &recipe;
                let overview = self
                    .with_retry(recipe_id, "overview", move || generator.generate(recipe))
                    .await?;
                format_recipe_text_with_overview(recipe, &overview)
            }
            None => format_recipe_text(&recipe),
        };

        let provider = &self.embedding_provider;
        let text = text.as_str();
        let embedding = self.with_retry(recipe_id, "embed", move || provider.embed(text)).await?;

        let written = self.storage.insert_embedding_if_absent(recipe_id, &embedding).await?;
        if written {
            debug!(recipe_id, dimension = embedding.len(), "stored embedding");
        }
        Ok(written)
    }

    async fn with_retry<T, F, Fut>(&self, recipe_id: i64, stage: &'static str, mut call: F) -> EmbeddingResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EmbeddingResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        recipe_id,
                        stage,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "transient provider failure, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Compare the two stores without changing either. See [`audit`].
    pub async fn audit(&self) -> IngestionResult<ConsistencyReport> {
        audit(&self.storage).await
    }
}

/// Insert recipes into a recipe store.
///
/// The whole slice is validated first, so an invalid entry leaves the store
/// untouched.
///
/// # Returns
/// The assigned ids, in input order
///
/// # Errors
/// Returns `IngestionError::InvalidInput` naming the first recipe without a
/// name or ingredients, or the storage error
pub async fn load_recipes<S>(storage: &mut S, recipes: &[Recipe]) -> IngestionResult<Vec<i64>>
where
    S: RecipeStore + ?Sized,
{
    for (index, recipe) in recipes.iter().enumerate() {
        if recipe.name.trim().is_empty() {
            return Err(IngestionError::InvalidInput(format!("recipe #{index} has no name")));
        }
        if recipe.ingredients.is_empty() {
            return Err(IngestionError::InvalidInput(format!(
                "recipe #{index} '{}' has no ingredients",
                recipe.name
            )));
        }
    }

    let mut ids = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        ids.push(storage.insert_recipe(recipe).await?);
    }

    info!(count = ids.len(), "loaded recipes");
    Ok(ids)
}

/// Cross-check the recipe store against the embedding store.
///
/// Read-only: orphans are reported, never deleted.
pub async fn audit<S>(storage: &S) -> IngestionResult<ConsistencyReport>
where
    S: RecipeStore + EmbeddingStore + ?Sized,
{
    let recipe_ids: BTreeSet<i64> = storage.list_recipe_ids().await?.into_iter().collect();
    let embedding_ids: BTreeSet<i64> = storage.list_embedding_ids().await?.into_iter().collect();

    let report = ConsistencyReport {
        orphaned_embeddings: embedding_ids.difference(&recipe_ids).copied().collect(),
        missing_embeddings: recipe_ids.difference(&embedding_ids).copied().collect(),
    };

    if !report.orphaned_embeddings.is_empty() {
        warn!(count = report.orphaned_embeddings.len(), "embeddings without a recipe");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::SqliteStorage;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    // ===== Mock Implementations =====

    /// Mock embedding provider with scripted failures.
    #[derive(Clone)]
    struct MockEmbeddingProvider {
        dimension: usize,
        state: Arc<Mutex<MockEmbeddingState>>,
    }

    #[derive(Default)]
    struct MockEmbeddingState {
        embed_calls: Vec<String>,
        transient_failures: usize,
        fail_on_text: Option<String>,
        nan_on_text: Option<String>,
    }

    impl MockEmbeddingProvider {
        fn new(dimension: usize) -> Self {
            Self {
                dimension,
                state: Arc::new(Mutex::new(MockEmbeddingState::default())),
            }
        }

        fn with_transient_failures(self, count: usize) -> Self {
            self.state.lock().unwrap().transient_failures = count;
            self
        }

        fn fail_on_text(self, text: &str) -> Self {
            self.state.lock().unwrap().fail_on_text = Some(text.to_string());
            self
        }

        fn nan_on_text(self, text: &str) -> Self {
            self.state.lock().unwrap().nan_on_text = Some(text.to_string());
            self
        }

        fn embed_calls(&self) -> Vec<String> {
            self.state.lock().unwrap().embed_calls.clone()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            let mut state = self.state.lock().unwrap();
            state.embed_calls.push(text.to_string());

            if state.transient_failures > 0 {
                state.transient_failures -= 1;
                return Err(EmbeddingError::Transient("HTTP 429".to_string()));
            }
            if let Some(ref fail_text) = state.fail_on_text {
                if text.contains(fail_text) {
                    return Err(EmbeddingError::Provider(format!("Failed on text containing '{fail_text}'")));
                }
            }
            if let Some(ref nan_text) = state.nan_on_text {
                if text.contains(nan_text) {
                    return Ok(vec![f32::NAN; self.dimension]);
                }
            }

            let mut embedding = vec![0.5; self.dimension];
            embedding[0] = text.len() as f32;
            Ok(embedding)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    /// Mock overview generator with scripted failures.
    #[derive(Clone, Default)]
    struct MockOverviewGenerator {
        state: Arc<Mutex<MockOverviewState>>,
    }

    #[derive(Default)]
    struct MockOverviewState {
        calls: Vec<String>,
        transient_failures: usize,
        fail_on_name: Option<String>,
    }

    impl MockOverviewGenerator {
        fn with_transient_failures(self, count: usize) -> Self {
            self.state.lock().unwrap().transient_failures = count;
            self
        }

        fn fail_on_name(self, name: &str) -> Self {
            self.state.lock().unwrap().fail_on_name = Some(name.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.state.lock().unwrap().calls.clone()
        }
    }

    #[async_trait]
    impl OverviewGenerator for MockOverviewGenerator {
        async fn generate(&self, recipe: &Recipe) -> EmbeddingResult<String> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(recipe.name.clone());

            if state.transient_failures > 0 {
                state.transient_failures -= 1;
                return Err(EmbeddingError::Transient("HTTP 503".to_string()));
            }
            if state.fail_on_name.as_deref() == Some(recipe.name.as_str()) {
                return Err(EmbeddingError::Provider("unparsable reply".to_string()));
            }
            Ok(format!("Overview of {}", recipe.name))
        }

        fn model_name(&self) -> &str {
            "mock-chat"
        }
    }

    // ===== Helpers =====

    fn storage() -> SqliteStorage {
        let mut storage = SqliteStorage::open_in_memory().unwrap();
        storage.initialize().unwrap();
        storage
    }

    fn recipe(name: &str) -> Recipe {
        Recipe::new(name, vec![format!("{name} base")], vec!["Cook it.".to_string()])
    }

    fn no_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    async fn loaded_pipeline(
        provider: MockEmbeddingProvider,
        names: &[&str],
    ) -> IngestionPipeline<MockEmbeddingProvider, SqliteStorage> {
        let mut pipeline = IngestionPipeline::new(provider, storage(), no_delay(3));
        let recipes: Vec<Recipe> = names.iter().map(|n| recipe(n)).collect();
        pipeline.load_recipes(&recipes).await.unwrap();
        pipeline
    }

    // ===== Loading =====

    #[tokio::test]
    async fn test_load_recipes_returns_ids_in_order() {
        let mut pipeline = IngestionPipeline::new(MockEmbeddingProvider::new(4), storage(), no_delay(1));

        let ids = pipeline.load_recipes(&[recipe("A"), recipe("B"), recipe("C")]).await.unwrap();

        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(pipeline.storage().get_recipe(2).await.unwrap().name, "B");
    }

    #[tokio::test]
    async fn test_load_rejects_recipe_without_ingredients() {
        let mut pipeline = IngestionPipeline::new(MockEmbeddingProvider::new(4), storage(), no_delay(1));
        let bad = Recipe::new("Air", vec![], vec![]);

        let result = pipeline.load_recipes(&[recipe("A"), bad, recipe("B")]).await;

        match result {
            Err(IngestionError::InvalidInput(message)) => assert!(message.contains("#1"), "{message}"),
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        assert_eq!(pipeline.storage().count_recipes().await.unwrap(), 0);

        // Fixing the input and loading again does not duplicate anything
        let ids = pipeline.load_recipes(&[recipe("A"), recipe("B")]).await.unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(pipeline.storage().count_recipes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_from_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{"x": {"name": "Soup", "ingredients": ["water"]}, "y": {"name": "Salad", "ingredients": ["leaves"]}}"#,
        )
        .unwrap();
        let source = crate::source::json::JsonFileRecipeSource::new(file.path());

        let mut pipeline = IngestionPipeline::new(MockEmbeddingProvider::new(4), storage(), no_delay(1));
        let ids = pipeline.load_from_source(&source).await.unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(pipeline.storage().count_recipes().await.unwrap(), 2);
    }

    // ===== Embedding =====

    #[tokio::test]
    async fn test_embed_missing_embeds_formatted_text() {
        let provider = MockEmbeddingProvider::new(4);
        let mut pipeline = loaded_pipeline(provider.clone(), &["Pancakes", "Waffles"]).await;

        let stats = pipeline.embed_missing().await.unwrap();

        assert_eq!(
            stats,
            IngestionStats {
                total_processed: 2,
                inserted: 2,
                already_embedded: 0,
                failed: 0
            }
        );
        let calls = provider.embed_calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("Recipe: Pancakes\n"));
        assert!(calls[1].contains("- Waffles base"));
        assert_eq!(pipeline.storage().count_embeddings().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_embed_missing_is_idempotent() {
        let provider = MockEmbeddingProvider::new(4);
        let mut pipeline = loaded_pipeline(provider.clone(), &["A", "B", "C"]).await;

        pipeline.embed_missing().await.unwrap();
        let second = pipeline.embed_missing().await.unwrap();

        assert_eq!(second.already_embedded, 3);
        assert_eq!(second.inserted, 0);
        assert_eq!(provider.embed_calls().len(), 3);
        assert_eq!(pipeline.storage().count_embeddings().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let provider = MockEmbeddingProvider::new(4).with_transient_failures(2);
        let mut pipeline = loaded_pipeline(provider.clone(), &["A"]).await;

        let stats = pipeline.embed_missing().await.unwrap();

        assert_eq!(stats.inserted, 1);
        assert_eq!(provider.embed_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let provider = MockEmbeddingProvider::new(4).with_transient_failures(10);
        let mut pipeline = loaded_pipeline(provider.clone(), &["A"]).await;

        let stats = pipeline.embed_missing().await.unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(provider.embed_calls().len(), 3);
        assert!(!pipeline.storage().embedding_exists(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried_and_batch_continues() {
        let provider = MockEmbeddingProvider::new(4).fail_on_text("Broken");
        let mut pipeline = loaded_pipeline(provider.clone(), &["Good", "Broken", "Fine"]).await;

        let stats = pipeline.embed_missing().await.unwrap();

        assert_eq!(stats.inserted, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(provider.embed_calls().len(), 3);
        assert_eq!(pipeline.storage().list_embedding_ids().await.unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_storage_failure_counts_as_failed() {
        let provider = MockEmbeddingProvider::new(4).nan_on_text("Weird");
        let mut pipeline = loaded_pipeline(provider, &["Weird", "Normal"]).await;

        let stats = pipeline.embed_missing().await.unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.inserted, 1);
    }

    #[tokio::test]
    async fn test_progress_callback_sees_every_recipe() {
        let mut pipeline = loaded_pipeline(MockEmbeddingProvider::new(4), &["A", "B", "C"]).await;
        let mut seen = Vec::new();

        pipeline
            .embed_missing_with_progress(|stats| seen.push(stats.total_processed))
            .await
            .unwrap();

        assert_eq!(seen, vec![1, 2, 3]);
    }

    // ===== Overview =====

    #[tokio::test]
    async fn test_overview_is_appended_before_embedding() {
        let provider = MockEmbeddingProvider::new(4);
        let overview = MockOverviewGenerator::default();
        let mut pipeline = loaded_pipeline(provider.clone(), &["Pancakes"])
            .await
            .with_overview(overview.clone());

        let stats = pipeline.embed_missing().await.unwrap();

        assert_eq!(stats.inserted, 1);
        assert_eq!(overview.calls(), vec!["Pancakes".to_string()]);
        let calls = provider.embed_calls();
        assert!(calls[0].starts_with("Recipe: Pancakes\n"));
        assert!(calls[0].ends_with("\n\nOverview:\nOverview of Pancakes"));
    }

    #[tokio::test]
    async fn test_overview_transient_failures_are_retried() {
        let overview = MockOverviewGenerator::default().with_transient_failures(2);
        let mut pipeline = loaded_pipeline(MockEmbeddingProvider::new(4), &["A"])
            .await
            .with_overview(overview.clone());

        let stats = pipeline.embed_missing().await.unwrap();

        assert_eq!(stats.inserted, 1);
        assert_eq!(overview.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_overview_failure_leaves_recipe_unembedded() {
        let provider = MockEmbeddingProvider::new(4);
        let overview = MockOverviewGenerator::default().fail_on_name("Broken");
        let mut pipeline = loaded_pipeline(provider.clone(), &["Good", "Broken"])
            .await
            .with_overview(overview.clone());

        let stats = pipeline.embed_missing().await.unwrap();

        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(overview.calls().len(), 2);
        assert_eq!(provider.embed_calls().len(), 1);
        assert_eq!(pipeline.audit().await.unwrap().missing_embeddings, vec![2]);
    }

    // ===== Audit =====

    #[tokio::test]
    async fn test_audit_reports_without_repairing() {
        let mut pipeline = loaded_pipeline(MockEmbeddingProvider::new(4), &["A", "B", "C"]).await;
        pipeline.embed_recipe(1).await.unwrap();
        pipeline.embed_recipe(2).await.unwrap();

        let mut storage = pipeline.into_storage();
        storage.insert_embedding_if_absent(9, &[1.0, 0.0]).await.unwrap();
        let pipeline = IngestionPipeline::new(MockEmbeddingProvider::new(4), storage, no_delay(1));

        let report = pipeline.audit().await.unwrap();
        assert_eq!(report.orphaned_embeddings, vec![9]);
        assert_eq!(report.missing_embeddings, vec![3]);
        assert!(!report.is_consistent());

        // Running the audit again sees the same state
        assert_eq!(pipeline.audit().await.unwrap(), report);
        assert_eq!(pipeline.storage().count_embeddings().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_audit_consistent_store() {
        let mut pipeline = loaded_pipeline(MockEmbeddingProvider::new(4), &["A"]).await;
        pipeline.embed_missing().await.unwrap();

        assert!(pipeline.audit().await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_embed_recipe_missing_row_is_storage_error() {
        let mut pipeline = IngestionPipeline::new(MockEmbeddingProvider::new(4), storage(), no_delay(1));
        let result = pipeline.embed_recipe(42).await;
        assert!(matches!(result, Err(IngestionError::Storage(StorageError::NotFound(_)))));
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(5));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_stats_record_methods() {
        let mut stats = IngestionStats::new();
        stats.record_inserted();
        stats.record_already_embedded();
        stats.record_failed();
        stats.record_failed();

        assert_eq!(stats.total_processed, 4);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.already_embedded, 1);
        assert_eq!(stats.failed, 2);
    }
}
