//! Recommendation binary entry point.
//!
//! Queries a pre-built recipe database for the recipes most similar to a piece
//! of free text. Supports single-query and interactive REPL modes, with table or
//! JSON output.
//!
//! # Examples
//!
//! Single query with default settings:
//! ```bash
//! recommend --db-path recipes.db --query "something warm with lentils"
//! ```
//!
//! JSON output, local embeddings:
//! ```bash
//! recommend --query "quick pasta" --format json --provider fast-embed
//! ```
//!
//! Interactive mode:
//! ```bash
//! recommend --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use recipe_recommender::{
    config::RecommenderConfig,
    embedding::{
        fastembed::FastEmbedProvider, openai::OpenAIEmbedding, DynamicEmbeddingProvider, EmbeddingProvider,
    },
    models::RecommendedRecipe,
    query::RecipeRecommender,
    storage::{sqlite::SqliteStorage, EmbeddingStore, RecipeStore},
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Recommender = RecipeRecommender<DynamicEmbeddingProvider, SqliteStorage>;

/// Output format for recommendations
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table
    Table,
    /// JSON array of flat recipe objects
    Json,
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderType {
    /// OpenAI-compatible API (Gemini by default; needs GEMINI_API_KEY or OPENAI_API_KEY)
    #[value(name = "openai")]
    OpenAI,
    /// FastEmbed local model (must match the model used at ingestion)
    FastEmbed,
}

/// Recommend recipes similar to free-text input
#[derive(Parser, Debug)]
#[command(
    name = "recommend",
    version,
    about = "Recommend recipes by semantic similarity",
    long_about = "Embed a free-text query and rank the stored recipes by cosine similarity.

EXAMPLES:
  Single query:
    recommend --db-path recipes.db --query \"something warm with lentils\"

  Top 8 as JSON:
    recommend --query \"quick pasta\" --top-n 8 --format json

  Interactive mode:
    recommend --interactive"
)]
struct Args {
    /// Database file path
    #[arg(long, value_name = "PATH", env = "RECIPES_DB", default_value = "recipes.db")]
    db_path: PathBuf,

    /// Query text (required for single-query mode, omitted in interactive mode)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    query: Option<String>,

    /// Number of recipes to return
    #[arg(long, value_name = "N", env = "RECOMMEND_TOP_N", default_value_t = recipe_recommender::DEFAULT_TOP_N)]
    top_n: usize,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Embedding provider
    #[arg(long, value_enum, default_value = "openai")]
    provider: ProviderType,

    /// Embedding model name (provider-dependent)
    #[arg(long, value_name = "MODEL")]
    embedding_model: Option<String>,

    /// Seconds to wait for the embedding provider
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    /// FastEmbed model cache directory (only used with FastEmbed provider)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();
}

/// Build the configuration: environment first, then command-line overrides.
fn build_config(args: &Args) -> RecommenderConfig {
    let mut config = RecommenderConfig::from_env().with_top_n(args.top_n);
    config.database_path = args.db_path.clone();
    if let Some(model) = &args.embedding_model {
        config.embedding.model = model.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.embedding.timeout = Duration::from_secs(secs);
    }
    config
}

fn create_embedding_provider(args: &Args, config: &RecommenderConfig) -> Result<DynamicEmbeddingProvider> {
    match args.provider {
        ProviderType::OpenAI => {
            let provider =
                OpenAIEmbedding::new(config.embedding.clone()).context("Failed to create embedding client")?;
            if !provider.has_credentials() {
                // Still constructed: every query will come back empty
                warn!("No API key configured; set GEMINI_API_KEY or OPENAI_API_KEY");
            }
            info!(model = provider.model_name(), "Using OpenAI-compatible embeddings");
            Ok(DynamicEmbeddingProvider::OpenAI(provider))
        }
        ProviderType::FastEmbed => {
            let cache_dir = args
                .cache_dir
                .clone()
                .or_else(|| dirs::cache_dir().map(|p| p.join("fastembed")));
            let provider = match &args.embedding_model {
                Some(name) => FastEmbedProvider::from_model_name(name, cache_dir),
                None => FastEmbedProvider::new(None, cache_dir),
            }
            .context("Failed to create FastEmbed provider")?;
            info!(model = provider.model_name(), "Using FastEmbed embeddings");
            Ok(DynamicEmbeddingProvider::FastEmbed(provider))
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn minutes(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |m| format!("{m} min"))
}

/// Format results as a pretty table
fn format_results_table(results: &[RecommendedRecipe]) -> String {
    if results.is_empty() {
        return "No matching recipes found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("Recipe").add_attribute(Attribute::Bold),
        Cell::new("Cuisine").add_attribute(Attribute::Bold),
        Cell::new("Total Time").add_attribute(Attribute::Bold),
        Cell::new("Servings").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
    ]);

    for (idx, result) in results.iter().enumerate() {
        let recipe = &result.recipe;
        let color = match result.similarity_score {
            s if s >= 0.85 => Color::Green,
            s if s >= 0.7 => Color::Cyan,
            s if s >= 0.5 => Color::Yellow,
            _ => Color::White,
        };

        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(truncate(&recipe.name, 50)),
            Cell::new(recipe.cuisine_type.as_deref().unwrap_or("-")),
            Cell::new(minutes(recipe.total_time)),
            Cell::new(recipe.servings.map_or_else(|| "-".to_string(), |s| s.to_string())),
            Cell::new(format!("{:.4}", result.similarity_score)).fg(color),
        ]);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(results: &[RecommendedRecipe]) -> Result<String> {
    serde_json::to_string_pretty(results).context("Failed to serialize results to JSON")
}

fn print_results(results: &[RecommendedRecipe], format: OutputFormat, elapsed: Duration) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", format_results_table(results));
            if !results.is_empty() {
                println!("\nFound {} recipes in {:.2}s", results.len(), elapsed.as_secs_f64());
            }
        }
        OutputFormat::Json => println!("{}", format_results_json(results)?),
    }
    Ok(())
}

/// Display detailed view of a single result
fn display_result_detail(result: &RecommendedRecipe, rank: usize) {
    let recipe = &result.recipe;
    println!("\n{}", "═".repeat(80));
    println!("Rank: {}", rank);
    println!("Recipe: {}", recipe.name);
    if let Some(description) = &recipe.description {
        println!("Description: {}", description);
    }
    println!("Cuisine: {}", recipe.cuisine_type.as_deref().unwrap_or("-"));
    println!(
        "Prep: {} | Cook: {} | Total: {}",
        minutes(recipe.prep_time),
        minutes(recipe.cook_time),
        minutes(recipe.total_time)
    );
    if let Some(servings) = recipe.servings {
        println!("Servings: {}", servings);
    }
    println!("Score: {:.4}", result.similarity_score);

    println!("\nIngredients:");
    for ingredient in &recipe.ingredients {
        println!("  - {}", ingredient);
    }
    println!("\nInstructions:");
    for (i, step) in recipe.instructions.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    if let Some(source) = &recipe.source {
        println!("\nSource: {}", source);
    }
    println!("{}", "═".repeat(80));
}

fn print_help() {
    println!("Commands:");
    println!("  <text>          - Recommend recipes for this text");
    println!("  /top N          - Set number of results to N");
    println!("  /format table   - Use table output format");
    println!("  /format json    - Use JSON output format");
    println!("  /detail N       - Show full recipe for result rank N");
    println!("  /help           - Show this help");
    println!("  Ctrl+D or Ctrl+C - Exit");
}

/// Run interactive REPL mode
async fn run_interactive(recommender: Recommender, mut top_n: usize, mut format: OutputFormat) -> Result<()> {
    println!("Interactive Recipe Recommender");
    print_help();
    println!();

    let mut rl = DefaultEditor::new().context("Failed to create readline editor")?;
    let mut last_results: Vec<RecommendedRecipe> = Vec::new();

    loop {
        match rl.readline("Recipes> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts.as_slice() {
                        ["/help"] => print_help(),
                        ["/top", n] => match n.parse::<usize>() {
                            Ok(n) if n > 0 => {
                                top_n = n;
                                println!("Set top-n to {}", top_n);
                            }
                            _ => eprintln!("Invalid number: must be a positive integer"),
                        },
                        ["/format", "table"] => {
                            format = OutputFormat::Table;
                            println!("Set output format to table");
                        }
                        ["/format", "json"] => {
                            format = OutputFormat::Json;
                            println!("Set output format to JSON");
                        }
                        ["/detail", n] => match n.parse::<usize>() {
                            Ok(rank) if rank > 0 && rank <= last_results.len() => {
                                display_result_detail(&last_results[rank - 1], rank);
                            }
                            Ok(rank) => eprintln!(
                                "Rank {} out of range (last query had {} results)",
                                rank,
                                last_results.len()
                            ),
                            Err(_) => eprintln!("Invalid rank: must be a positive integer"),
                        },
                        [cmd, ..] => eprintln!("Unknown or malformed command: {}. Type /help for usage.", cmd),
                        [] => {}
                    }
                } else {
                    let start = Instant::now();
                    let results = recommender.find_similar(line, top_n).await;
                    if let Err(e) = print_results(&results, format, start.elapsed()) {
                        eprintln!("Error formatting results: {}", e);
                    }
                    last_results = results;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    setup_logging(&args.log_level);
    debug!("CLI arguments: {:?}", args);

    let query = match (&args.query, args.interactive) {
        (_, true) => None,
        (Some(q), false) => Some(q.clone()),
        (None, false) => anyhow::bail!(
            "Either --query or --interactive must be specified.\n\
             Use --help for usage information."
        ),
    };

    if !args.db_path.exists() {
        anyhow::bail!(
            "Database file not found: {}\n\
             Please run the ingestion binary first to create the database.",
            args.db_path.display()
        );
    }

    let config = build_config(&args);
    debug!(?config, "Resolved configuration");

    let mut storage = SqliteStorage::open(&config.database_path).context("Failed to open database")?;
    storage.initialize().context("Failed to initialize storage")?;

    let recipe_count = storage.count_recipes().await.context("Failed to count recipes")?;
    let embedding_count = storage.count_embeddings().await.context("Failed to count embeddings")?;
    info!(recipes = recipe_count, embeddings = embedding_count, "Database loaded");
    if embedding_count == 0 {
        warn!("Database has no embeddings; run `ingestion embed` first");
    }

    let provider = create_embedding_provider(&args, &config)?;
    let recommender = RecipeRecommender::from_config(provider, storage, &config);

    match query {
        None => run_interactive(recommender, config.top_n, args.format).await?,
        Some(query) => {
            let start = Instant::now();
            let results = recommender.find_similar(&query, config.top_n).await;
            print_results(&results, args.format, start.elapsed())?;
        }
    }

    Ok(())
}
