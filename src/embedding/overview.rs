//! LLM-written recipe overviews.
//!
//! Before embedding, ingestion can ask a chat model for a short overview of the
//! recipe (serving suggestions, dietary notes, effort, flavour) and append it to
//! the recipe text. Queries phrased around those qualities then land closer to
//! the right recipes.
//!
//! The default target is `gemini-2.5-flash` on the same OpenAI-compatible
//! endpoint as the embedding model.

use super::openai::{classify_transport_error, error_for_status, missing_key};
use super::{EmbeddingError, EmbeddingResult};
use crate::config::EmbeddingSettings;
use crate::models::Recipe;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Produces a free-text overview for a recipe.
#[async_trait]
pub trait OverviewGenerator: Send + Sync {
    /// Write an overview for `recipe`.
    ///
    /// # Errors
    /// Uses the embedding error taxonomy, so `is_transient` decides retries
    async fn generate(&self, recipe: &Recipe) -> EmbeddingResult<String>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

/// Overview generator backed by an OpenAI-compatible `/chat/completions` API.
#[derive(Debug, Clone)]
pub struct ChatOverviewGenerator {
    api_key: Option<String>,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl ChatOverviewGenerator {
    /// Create a generator sharing credentials, endpoint and timeout with the
    /// embedding settings.
    ///
    /// # Errors
    /// Returns `EmbeddingError::Provider` if the HTTP client cannot be built
    pub fn new(settings: &EmbeddingSettings, model: impl Into<String>) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EmbeddingError::Provider(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        })
    }
}

#[async_trait]
impl OverviewGenerator for ChatOverviewGenerator {
    async fn generate(&self, recipe: &Recipe) -> EmbeddingResult<String> {
        let api_key = self.api_key.as_ref().ok_or_else(missing_key)?;
        let prompt = overview_prompt(recipe);
        let body = ChatRequest {
            model: &self.model,
            temperature: 0.1,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        debug!(model = %self.model, recipe = %recipe.name, "requesting overview");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Provider(format!("Malformed chat response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| EmbeddingError::Provider("Chat response has no content".to_string()))?;

        parse_overview(&content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn overview_prompt(recipe: &Recipe) -> String {
    fn or_unknown(value: Option<u32>) -> String {
        value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
    }

    let ingredients: Vec<String> = recipe.ingredients.iter().map(|i| format!("- {i}")).collect();
    let instructions: Vec<String> = recipe
        .instructions
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {step}", i + 1))
        .collect();

    format!(
        "Write an \"Overview\" section for the recipe below: one short, engaging paragraph \
         (or a few closely related ones) that helps a reader judge whether the dish suits them.\n\
         \n\
         Name: {name}\n\
         Description: {description}\n\
         Cuisine Type: {cuisine}\n\
         Ingredients:\n{ingredients}\n\
         Instructions:\n{instructions}\n\
         Prep Time: {prep} minutes\n\
         Cook Time: {cook} minutes\n\
         Total Time: {total} minutes\n\
         Servings: {servings}\n\
         \n\
         Cover pairings and serving suggestions, dietary information and restrictions, \
         ease of cooking, time commitment, ways to vary the dish, and its flavour and texture.\n\
         \n\
         Reply with a JSON object holding the text in a single \"overview\" field.",
        name = recipe.name,
        description = recipe.description.as_deref().unwrap_or(""),
        cuisine = recipe.cuisine_type.as_deref().unwrap_or(""),
        ingredients = ingredients.join("\n"),
        instructions = instructions.join("\n"),
        prep = or_unknown(recipe.prep_time),
        cook = or_unknown(recipe.cook_time),
        total = or_unknown(recipe.total_time),
        servings = or_unknown(recipe.servings),
    )
}

/// Extract the overview from a model reply, tolerating a Markdown code fence.
pub fn parse_overview(content: &str) -> EmbeddingResult<String> {
    let mut body = content.trim();
    if let Some(rest) = body.strip_prefix("```json").or_else(|| body.strip_prefix("```")) {
        body = rest.strip_suffix("```").unwrap_or(rest).trim();
    }

    let payload: OverviewPayload = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::Provider(format!("Overview reply is not the expected JSON: {e}")))?;

    let overview = payload.overview.trim();
    if overview.is_empty() {
        return Err(EmbeddingError::Provider("Overview reply is empty".to_string()));
    }
    Ok(overview.to_string())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OverviewPayload {
    overview: String,
}
