//! OpenAI-compatible embedding provider implementation.
//!
//! This module provides an implementation of the `EmbeddingProvider` trait for
//! any service exposing the OpenAI `/embeddings` API. By default it targets the
//! Gemini OpenAI-compatible endpoint with `text-embedding-004`.

use super::{EmbeddingError, EmbeddingProvider, EmbeddingResult};
use crate::config::EmbeddingSettings;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// OpenAI-compatible embedding provider.
///
/// A provider built without an API key is still constructible; every request
/// then fails with [`EmbeddingError::Authentication`] before touching the network.
#[derive(Debug, Clone)]
pub struct OpenAIEmbedding {
    /// Bearer credential
    api_key: Option<String>,

    /// API base URL, without trailing slash
    base_url: String,

    /// Model identifier (e.g., "text-embedding-004")
    model: String,

    /// Expected dimension of the embedding vectors
    embedding_dimension: usize,

    /// HTTP client carrying the request timeout
    client: reqwest::Client,
}

impl OpenAIEmbedding {
    /// Create a new provider from settings.
    ///
    /// # Errors
    /// Returns `EmbeddingError::Provider` if the HTTP client cannot be built
    pub fn new(settings: EmbeddingSettings) -> EmbeddingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EmbeddingError::Provider(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: settings.api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            embedding_dimension: known_dimension(&settings.model),
            model: settings.model,
            client,
        })
    }

    /// Whether a credential is configured.
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn request(&self, input: serde_json::Value) -> EmbeddingResult<Vec<EmbeddingData>> {
        let api_key = self.api_key.as_ref().ok_or_else(missing_key)?;

        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
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

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Provider(format!("Malformed embedding response: {e}")))?;

        Ok(parsed.data)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Text cannot be empty".to_string()));
        }

        debug!(model = %self.model, chars = text.len(), "requesting embedding");

        self.request(serde_json::json!(text))
            .await?
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Provider("No embedding in response".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput("All texts must be non-empty".to_string()));
        }

        debug!(model = %self.model, count = texts.len(), "requesting batch embeddings");

        let mut data = self.request(serde_json::json!(texts)).await?;
        if data.len() != texts.len() {
            return Err(EmbeddingError::Provider(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        data.sort_by_key(|d| d.index);

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.embedding_dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn known_dimension(model: &str) -> usize {
    match model {
        "text-embedding-004" | "models/text-embedding-004" => 768,
        "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
        "text-embedding-3-large" => 3072,
        _ => crate::DEFAULT_EMBEDDING_DIMENSION,
    }
}

pub(super) fn missing_key() -> EmbeddingError {
    EmbeddingError::Authentication("no API key configured (set GEMINI_API_KEY or OPENAI_API_KEY)".to_string())
}

/// Map a non-success HTTP status onto the error taxonomy.
pub(super) fn error_for_status(status: reqwest::StatusCode, body: &str) -> EmbeddingError {
    let message = format!("HTTP {status}: {body}");
    match status.as_u16() {
        401 | 403 => EmbeddingError::Authentication(message),
        429 | 500..=599 => EmbeddingError::Transient(message),
        _ => EmbeddingError::Provider(message),
    }
}

pub(super) fn classify_transport_error(e: reqwest::Error) -> EmbeddingError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        EmbeddingError::Transient(format!("Request failed: {e}"))
    } else {
        EmbeddingError::Provider(format!("Request failed: {e}"))
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer, key: Option<&str>) -> OpenAIEmbedding {
        let mut settings = EmbeddingSettings::default()
            .with_base_url(server.uri())
            .with_timeout(Duration::from_secs(5));
        if let Some(key) = key {
            settings = settings.with_api_key(key);
        }
        OpenAIEmbedding::new(settings).unwrap()
    }

    #[tokio::test]
    async fn test_embed_sends_model_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "text-embedding-004", "input": "chicken and rice"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.25, -0.5, 1.0], "index": 0}],
                "model": "text-embedding-004"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("test-key"));
        let embedding = provider.embed("chicken and rice").await.unwrap();

        assert_eq!(embedding, vec![0.25, -0.5, 1.0]);
    }

    #[tokio::test]
    async fn test_missing_key_is_authentication_error_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider_for(&server, None);
        assert!(!provider.has_credentials());

        let result = provider.embed("pasta").await;
        assert!(matches!(result, Err(EmbeddingError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_status_codes_map_to_error_taxonomy() {
        let cases: [(u16, &str); 5] = [
            (401, "auth"),
            (403, "auth"),
            (429, "transient"),
            (503, "transient"),
            (400, "provider"),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/embeddings"))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&server)
                .await;

            let err = provider_for(&server, Some("k")).embed("soup").await.unwrap_err();
            let kind = match err {
                EmbeddingError::Authentication(_) => "auth",
                EmbeddingError::Transient(_) => "transient",
                EmbeddingError::Provider(_) => "provider",
                EmbeddingError::InvalidInput(_) => "invalid",
            };
            assert_eq!(kind, expected, "status {status}");
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
            .mount(&server)
            .await;

        let result = provider_for(&server, Some("k")).embed("soup").await;
        assert!(matches!(result, Err(EmbeddingError::Provider(_))));
    }

    #[tokio::test]
    async fn test_empty_data_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let result = provider_for(&server, Some("k")).embed("soup").await;
        assert!(matches!(result, Err(EmbeddingError::Provider(_))));
    }

    #[tokio::test]
    async fn test_blank_input_rejected() {
        let server = MockServer::start().await;
        let provider = provider_for(&server, Some("k"));

        let result = provider.embed("  \n ").await;
        assert!(matches!(result, Err(EmbeddingError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_embed_batch_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"embedding": [2.0], "index": 1},
                    {"embedding": [1.0], "index": 0}
                ]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server, Some("k"));
        let embeddings = provider.embed_batch(&["first", "second"]).await.unwrap();

        assert_eq!(embeddings, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_known_dimensions() {
        let settings = EmbeddingSettings::default();
        let provider = OpenAIEmbedding::new(settings.clone()).unwrap();
        assert_eq!(provider.dimension(), 768);
        assert_eq!(provider.model_name(), "text-embedding-004");

        let provider = OpenAIEmbedding::new(settings.with_model("text-embedding-3-large")).unwrap();
        assert_eq!(provider.dimension(), 3072);
    }
}
