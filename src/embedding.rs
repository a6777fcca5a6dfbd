//! Embedding provider selection and HTTP-backed providers.
//!
//! Providers, selected by `[embedding] provider`:
//! - **`simple`**: [`HashEmbedder`], offline and deterministic.
//! - **`openai`**: OpenAI `POST /embeddings`, key from `OPENAI_API_KEY`.
//! - **`qwen`**: DashScope's OpenAI-compatible endpoint, key from `QWEN_API_KEY`.
//!
//! # Retry Strategy
//!
//! HTTP providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Context};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use docsync_core::embedding::{EmbeddingProvider, HashEmbedder};
use docsync_core::{Result, SyncError};

use crate::config::EmbeddingConfig;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const QWEN_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Which OpenAI-compatible service a provider talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    OpenAi,
    Qwen,
}

impl ApiFlavor {
    pub fn label(self) -> &'static str {
        match self {
            ApiFlavor::OpenAi => "OpenAI",
            ApiFlavor::Qwen => "Qwen",
        }
    }

    pub fn api_key_var(self) -> &'static str {
        match self {
            ApiFlavor::OpenAi => "OPENAI_API_KEY",
            ApiFlavor::Qwen => "QWEN_API_KEY",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ApiFlavor::OpenAi => OPENAI_BASE_URL,
            ApiFlavor::Qwen => QWEN_BASE_URL,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ApiFlavor::OpenAi => "text-embedding-3-small",
            ApiFlavor::Qwen => "text-embedding-v3",
        }
    }

    /// Vector size the service returns for `model`.
    pub fn default_dims(self, model: &str) -> usize {
        match self {
            ApiFlavor::OpenAi if model.contains("large") => 3072,
            ApiFlavor::Qwen if model.contains("v3") => 1024,
            _ => 1536,
        }
    }
}

/// Embedding provider for any service speaking the OpenAI embeddings API.
pub struct OpenAICompatibleProvider {
    flavor: ApiFlavor,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAICompatibleProvider {
    pub fn new(flavor: ApiFlavor, config: &EmbeddingConfig, api_key: String) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| flavor.default_model().to_string());
        let dims = config.dims.unwrap_or_else(|| flavor.default_dims(&model));
        let base = config
            .url
            .as_deref()
            .unwrap_or(flavor.default_base_url())
            .trim_end_matches('/');

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            flavor,
            client,
            endpoint: format!("{}/embeddings", base),
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAICompatibleProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let label = self.flavor.label();

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            SyncError::Embedding(format!("{} response was not JSON: {}", label, e))
                        })?;
                        return parse_embedding_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = format!("{} API error {}: {}", label, status, body_text);

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(attempt, %status, "{} embedding request failed; retrying", label);
                        last_err = Some(err);
                        continue;
                    }

                    return Err(SyncError::Embedding(err));
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "{} embedding request failed; retrying", label);
                    last_err = Some(format!("{} request failed: {}", label, e));
                }
            }
        }

        Err(SyncError::Embedding(last_err.unwrap_or_else(|| {
            format!("{} embedding failed after retries", label)
        })))
    }
}

/// Extract `data[0].embedding` from an embeddings API response.
pub fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            SyncError::Embedding("invalid embeddings response: missing data[0].embedding".into())
        })?;

    embedding
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                SyncError::Embedding("invalid embeddings response: non-numeric component".into())
            })
        })
        .collect()
}

/// Build the provider named by `config.provider`.
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let flavor = match config.provider.as_str() {
        "simple" => {
            tracing::info!("using simple hash embedding");
            return Ok(Arc::new(HashEmbedder::new()));
        }
        "openai" => ApiFlavor::OpenAi,
        "qwen" => ApiFlavor::Qwen,
        other => bail!("Unknown embedding provider: {}", other),
    };

    let api_key = std::env::var(flavor.api_key_var()).map_err(|_| {
        anyhow::anyhow!(
            "{} environment variable not set (required for the {} provider)",
            flavor.api_key_var(),
            config.provider
        )
    })?;

    let provider = OpenAICompatibleProvider::new(flavor, config, api_key)?;
    tracing::info!(
        provider = flavor.label(),
        model = provider.model_name(),
        dims = provider.dims(),
        "initialized embedding provider"
    );
    Ok(Arc::new(provider))
}
