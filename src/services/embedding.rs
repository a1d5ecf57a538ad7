//! Embedding providers for chunks and queries.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::EmbeddingError;
use crate::models::{EmbeddingApi, EmbeddingConfig};
use crate::utils::{RetryConfig, with_retry};

/// Turns text into fixed-length vectors.
///
/// Implementations must be idempotent: the same text always yields the same
/// vector, so failed calls can be retried safely.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed document text for indexing.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a search query. Providers with query-specific instructions
    /// override this; the default is `embed`.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(text).await
    }

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;

    async fn health_check(&self) -> Result<(), EmbeddingError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Instruction type understood by text-embeddings-inference servers.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum InstructionType {
    Document,
    Query,
}

/// Request body for the TEI `/embed` endpoint.
#[derive(Debug, Serialize)]
struct TeiRequest<'a> {
    inputs: Vec<&'a str>,
    truncate: bool,
    instruction_type: InstructionType,
}

#[derive(Debug, Deserialize)]
struct TeiResponse(Vec<Vec<f32>>);

/// Request body shared by OpenAI and Azure OpenAI.
#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// HTTP embedding provider speaking the TEI, OpenAI or Azure OpenAI API.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: Client,
    api: EmbeddingApi,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_version: String,
    dimension: usize,
    retry: RetryConfig,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api: config.api,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            dimension: config.dimension as usize,
            retry: RetryConfig::from_retries(config.max_retries),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        match self.api {
            EmbeddingApi::Tei => format!("{}/embed", self.base_url),
            EmbeddingApi::OpenAi => format!("{}/embeddings", self.base_url),
            EmbeddingApi::Azure => format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                self.base_url, self.model, self.api_version
            ),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (self.api, &self.api_key) {
            (EmbeddingApi::Azure, Some(key)) => request.header("api-key", key),
            (_, Some(key)) => request.bearer_auth(key),
            (_, None) => request,
        }
    }

    async fn embed_with(
        &self,
        text: &str,
        instruction_type: InstructionType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let vector = with_retry(&self.retry, "embed", || self.request_once(text, instruction_type)).await?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        debug!(provider = %self.api, chars = text.chars().count(), "embedded text");
        Ok(vector)
    }

    async fn request_once(
        &self,
        text: &str,
        instruction_type: InstructionType,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let request = self.client.post(self.endpoint());
        let request = match self.api {
            EmbeddingApi::Tei => request.json(&TeiRequest {
                inputs: vec![text],
                truncate: true,
                instruction_type,
            }),
            EmbeddingApi::OpenAi => request.json(&OpenAiRequest {
                model: Some(&self.model),
                input: text,
            }),
            // the deployment in the URL selects the model
            EmbeddingApi::Azure => request.json(&OpenAiRequest {
                model: None,
                input: text,
            }),
        };

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let vector = match self.api {
            EmbeddingApi::Tei => {
                let TeiResponse(vectors) = response
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
                vectors.into_iter().next()
            }
            EmbeddingApi::OpenAi | EmbeddingApi::Azure => {
                let body: OpenAiResponse = response
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
                body.data
                    .into_iter()
                    .min_by_key(|d| d.index)
                    .map(|d| d.embedding)
            }
        };

        vector.ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }
}

fn map_send_error(e: reqwest::Error) -> EmbeddingError {
    if e.is_timeout() {
        EmbeddingError::Timeout
    } else if e.is_connect() {
        EmbeddingError::ConnectionError(e.to_string())
    } else {
        EmbeddingError::RequestError(e)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_with(text, InstructionType::Document).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_with(text, InstructionType::Query).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn health_check(&self) -> Result<(), EmbeddingError> {
        match self.api {
            EmbeddingApi::Tei => {
                let url = format!("{}/health", self.base_url);
                let response = self.client.get(&url).send().await.map_err(map_send_error)?;
                if !response.status().is_success() {
                    return Err(EmbeddingError::ServerError(format!(
                        "health check failed with status: {}",
                        response.status()
                    )));
                }
                Ok(())
            }
            // no dedicated health endpoint: probe with a one-word embedding
            EmbeddingApi::OpenAi | EmbeddingApi::Azure => {
                self.request_once("ping", InstructionType::Query).await.map(|_| ())
            }
        }
    }

    fn name(&self) -> &str {
        match self.api {
            EmbeddingApi::Tei => "tei",
            EmbeddingApi::OpenAi => "openai",
            EmbeddingApi::Azure => "azure-openai",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(api: EmbeddingApi) -> HttpEmbedder {
        let config = EmbeddingConfig {
            api,
            url: "http://localhost:11411/".to_string(),
            model: "embed-small".to_string(),
            ..Default::default()
        };
        HttpEmbedder::new(&config).unwrap()
    }

    #[test]
    fn test_base_url_trimming() {
        assert_eq!(embedder(EmbeddingApi::Tei).base_url(), "http://localhost:11411");
    }

    #[test]
    fn test_max_retries_come_after_first_attempt() {
        assert_eq!(embedder(EmbeddingApi::Tei).retry.max_attempts, 4);

        let config = EmbeddingConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert_eq!(HttpEmbedder::new(&config).unwrap().retry.max_attempts, 1);
    }

    #[test]
    fn test_endpoints_per_api() {
        assert_eq!(
            embedder(EmbeddingApi::Tei).endpoint(),
            "http://localhost:11411/embed"
        );
        assert_eq!(
            embedder(EmbeddingApi::OpenAi).endpoint(),
            "http://localhost:11411/embeddings"
        );
        assert_eq!(
            embedder(EmbeddingApi::Azure).endpoint(),
            "http://localhost:11411/openai/deployments/embed-small/embeddings?api-version=2023-05-15"
        );
    }

    #[test]
    fn test_dimension_from_config() {
        assert_eq!(
            embedder(EmbeddingApi::Tei).dimension(),
            crate::models::DEFAULT_EMBEDDING_DIMENSION as usize
        );
    }

    #[test]
    fn test_openai_response_picks_first_index() {
        let body: OpenAiResponse = serde_json::from_str(
            r#"{"data": [{"embedding": [0.5, 0.5], "index": 1}, {"embedding": [1.0, 0.0], "index": 0}]}"#,
        )
        .unwrap();
        let first = body.data.into_iter().min_by_key(|d| d.index).unwrap();
        assert_eq!(first.embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_request() {
        let result = embedder(EmbeddingApi::Tei).embed("   ").await;
        assert!(matches!(result, Err(EmbeddingError::EmptyInput)));
    }
}
