//! Ingestion binary entry point.
//!
//! Builds and maintains the recipe database: loads recipes from JSON, embeds
//! every recipe that has no embedding yet, and audits the two tables against
//! each other.
//!
//! # Examples
//!
//! Load recipes, then embed them:
//! ```bash
//! ingestion load --input recipes.json
//! ingestion embed
//! ```
//!
//! Check consistency:
//! ```bash
//! ingestion --db-path recipes.db audit
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use recipe_recommender::{
    config::RecommenderConfig,
    embedding::{
        fastembed::FastEmbedProvider, openai::OpenAIEmbedding, overview::ChatOverviewGenerator,
        DynamicEmbeddingProvider, EmbeddingProvider,
    },
    ingestion::{self, IngestionPipeline, RetryPolicy},
    source::{json::JsonFileRecipeSource, RecipeSource},
    storage::{sqlite::SqliteStorage, EmbeddingStore, RecipeStore},
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Embedding provider type
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderType {
    /// OpenAI-compatible API (Gemini by default; needs GEMINI_API_KEY or OPENAI_API_KEY)
    #[value(name = "openai")]
    OpenAI,
    /// FastEmbed local embedding provider (no API required)
    FastEmbed,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert recipes from a JSON file
    Load {
        /// Input JSON file: an array of recipes or an object of keyed recipes
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Load at most this many recipes
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Embed every recipe that has no embedding yet
    Embed {
        /// Embedding provider to use
        #[arg(long, value_enum, default_value = "openai")]
        provider: ProviderType,

        /// Embedding model name (provider-dependent)
        #[arg(long, value_name = "MODEL")]
        embedding_model: Option<String>,

        /// Attempts per recipe for transient failures
        #[arg(long, value_name = "N", default_value_t = 5)]
        max_attempts: u32,

        /// Seconds to wait between attempts
        #[arg(long, value_name = "SECS", default_value_t = 5)]
        retry_delay_secs: u64,

        /// FastEmbed model cache directory
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,

        /// Append an LLM-written overview to each recipe before embedding it
        #[arg(long)]
        overview: bool,

        /// Chat model used for overviews
        #[arg(
            long,
            value_name = "MODEL",
            env = "OVERVIEW_MODEL",
            default_value = recipe_recommender::DEFAULT_OVERVIEW_MODEL
        )]
        overview_model: String,
    },

    /// Report embeddings without recipes and recipes without embeddings
    Audit,
}

/// Ingestion CLI for building and checking the recipe database
#[derive(Parser, Debug)]
#[command(
    name = "ingestion",
    version,
    about = "Build and check the recipe database",
    long_about = "Offline tools for the recipe database: load recipes, generate embeddings, audit.

EXAMPLES:
  Load recipes:
    ingestion load --input recipes.json

  Embed with Gemini (reads GEMINI_API_KEY):
    ingestion embed

  Embed locally:
    ingestion embed --provider fast-embed

  Embed with generated overviews:
    ingestion embed --overview

  Audit:
    ingestion audit"
)]
struct IngestionArgs {
    /// Database file path
    #[arg(long, value_name = "PATH", env = "RECIPES_DB", default_value = "recipes.db", global = true)]
    db_path: PathBuf,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Open (creating if needed) the database and its tables
fn open_storage(db_path: &Path) -> Result<SqliteStorage> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
            info!("Created database directory: {:?}", parent);
        }
    }

    let mut storage = SqliteStorage::open(db_path).context("Failed to open database")?;
    storage.initialize().context("Failed to create tables")?;
    debug!(path = storage.path(), "Storage ready");
    Ok(storage)
}

fn create_embedding_provider(
    provider: ProviderType,
    model: Option<&str>,
    cache_dir: Option<PathBuf>,
    config: &RecommenderConfig,
) -> Result<DynamicEmbeddingProvider> {
    match provider {
        ProviderType::OpenAI => {
            let mut settings = config.embedding.clone();
            if let Some(model) = model {
                settings = settings.with_model(model);
            }
            if settings.api_key.is_none() {
                anyhow::bail!("GEMINI_API_KEY or OPENAI_API_KEY must be set when using the openai provider");
            }
            let provider = OpenAIEmbedding::new(settings).context("Failed to create embedding client")?;
            info!(model = provider.model_name(), dimension = provider.dimension(), "OpenAI-compatible provider ready");
            Ok(DynamicEmbeddingProvider::OpenAI(provider))
        }
        ProviderType::FastEmbed => {
            let cache_dir = cache_dir.or_else(|| dirs::cache_dir().map(|p| p.join("fastembed")));
            debug!(?cache_dir, "FastEmbed cache directory");
            let provider = match model {
                Some(name) => FastEmbedProvider::from_model_name(name, cache_dir),
                None => FastEmbedProvider::new(None, cache_dir),
            }
            .context("Failed to initialize FastEmbed provider")?;
            info!(model = provider.model_name(), dimension = provider.dimension(), "FastEmbed provider ready");
            Ok(DynamicEmbeddingProvider::FastEmbed(provider))
        }
    }
}

/// Create a progress bar for tracking embedding
fn create_progress_bar(total: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} recipes | {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    Ok(pb)
}

async fn run_load(db_path: &Path, input: &Path, limit: Option<usize>) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {:?}", input);
    }

    let source = JsonFileRecipeSource::new(input);
    let recipes = match limit {
        Some(n) => source.fetch_recipes_limit(n).await,
        None => source.fetch_recipes().await,
    }
    .with_context(|| format!("Failed to read recipes from {:?}", input))?;
    info!("Read {} recipes from {}", recipes.len(), source.name());

    let mut storage = open_storage(db_path)?;
    let ids = ingestion::load_recipes(&mut storage, &recipes)
        .await
        .context("Failed to load recipes")?;

    let total = storage.count_recipes().await?;
    println!("Loaded {} recipes ({} in database)", ids.len(), total);
    Ok(())
}

fn create_overview_generator(model: &str, config: &RecommenderConfig) -> Result<ChatOverviewGenerator> {
    if config.embedding.api_key.is_none() {
        anyhow::bail!("GEMINI_API_KEY or OPENAI_API_KEY must be set when using --overview");
    }
    let generator =
        ChatOverviewGenerator::new(&config.embedding, model).context("Failed to create overview client")?;
    info!(model, "Overview generation enabled");
    Ok(generator)
}

async fn run_embed(
    db_path: &Path,
    provider: DynamicEmbeddingProvider,
    overview: Option<ChatOverviewGenerator>,
    retry: RetryPolicy,
) -> Result<()> {
    let storage = open_storage(db_path)?;
    let total = storage.count_recipes().await.context("Failed to count recipes")?;
    if total == 0 {
        warn!("No recipes in database; run `ingestion load` first");
        return Ok(());
    }

    let start_time = Instant::now();
    let mut pipeline = IngestionPipeline::new(provider, storage, retry);
    if let Some(generator) = overview {
        pipeline = pipeline.with_overview(generator);
    }

    let progress = create_progress_bar(total)?;
    let stats = pipeline
        .embed_missing_with_progress(|stats| {
            progress.set_position(stats.total_processed as u64);
            progress.set_message(format!("new: {} failed: {}", stats.inserted, stats.failed));
        })
        .await
        .context("Failed to embed recipes")?;
    progress.finish();

    let elapsed = start_time.elapsed();
    println!("\n╔════════════════════════════════════════╗");
    println!("║      Embedding Completed               ║");
    println!("╠════════════════════════════════════════╣");
    println!("║ Total processed:      {:>16} ║", stats.total_processed);
    println!("║ Inserted:             {:>16} ║", stats.inserted);
    println!("║ Already embedded:     {:>16} ║", stats.already_embedded);
    println!("║ Failed:               {:>16} ║", stats.failed);
    println!("║ Elapsed time:         {:>13.2?} ║", elapsed);
    println!("╚════════════════════════════════════════╝");

    if stats.failed > 0 {
        warn!("{} recipes failed to embed - check logs for details", stats.failed);
    }
    Ok(())
}

async fn run_audit(db_path: &Path) -> Result<()> {
    let storage = open_storage(db_path)?;
    let recipes = storage.count_recipes().await?;
    let embeddings = storage.count_embeddings().await?;
    let report = ingestion::audit(&storage).await.context("Failed to audit database")?;

    println!("Recipes:             {}", recipes);
    println!("Embeddings:          {}", embeddings);
    println!("Orphaned embeddings: {:?}", report.orphaned_embeddings);
    println!("Missing embeddings:  {:?}", report.missing_embeddings);
    if report.is_consistent() {
        println!("Database is consistent.");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = IngestionArgs::parse();
    init_logging(&args.log_level);
    debug!("CLI arguments: {:?}", args);

    let mut config = RecommenderConfig::from_env();
    config.database_path = args.db_path.clone();

    match args.command {
        Command::Load { input, limit } => run_load(&config.database_path, &input, limit).await,
        Command::Embed {
            provider,
            embedding_model,
            max_attempts,
            retry_delay_secs,
            cache_dir,
            overview,
            overview_model,
        } => {
            let provider = create_embedding_provider(provider, embedding_model.as_deref(), cache_dir, &config)?;
            let overview = overview
                .then(|| create_overview_generator(&overview_model, &config))
                .transpose()?;
            let retry = RetryPolicy::new(max_attempts, Duration::from_secs(retry_delay_secs));
            run_embed(&config.database_path, provider, overview, retry).await
        }
        Command::Audit => run_audit(&config.database_path).await,
    }
}
