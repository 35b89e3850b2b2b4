//! External deck generators.
//!
//! A generator turns a theme into free text naming cards. Its output is
//! untrusted and only ever reaches the store through
//! [`parse_candidate_list`](super::parse_candidate_list) and the validator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use super::prompt::DeckRequest;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Ollama model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";

const GENERATE_TIMEOUT_SECS: u64 = 300;

/// Errors from a deck generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The generator could not be reached.
    #[error(
        "cannot reach generator at {url}: {source}\n  Suggestion: Make sure Ollama is running"
    )]
    Request {
        /// Endpoint URL.
        url: String,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP response.
    #[error("generator returned HTTP {status} from {url}")]
    HttpStatus {
        /// Endpoint URL.
        url: String,
        /// Status code.
        status: u16,
    },

    /// The reply did not have the expected shape.
    #[error("invalid generator response: {reason}")]
    InvalidResponse {
        /// What was wrong.
        reason: String,
    },
}

/// Produces a free-text card list, usually followed by a strategy write-up.
#[async_trait]
pub trait DeckGenerator: Send + Sync {
    /// Short generator name for logs.
    fn name(&self) -> &str;

    /// Generates a deck for `request`.
    async fn generate(&self, request: &DeckRequest) -> Result<String, GeneratorError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Generator backed by a local Ollama server (`POST /api/generate`).
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerator {
    /// Creates a generator for `model` at `base_url`.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(GENERATE_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self::with_client(client, base_url, model)
    }

    /// Creates a generator using an existing client.
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Model name in use.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl DeckGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip_all, fields(model = %self.model, theme = %request.theme))]
    async fn generate(&self, request: &DeckRequest) -> Result<String, GeneratorError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt: request.prompt(),
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|source| GeneratorError::Request {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeneratorError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let reply: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| GeneratorError::InvalidResponse {
                    reason: e.to_string(),
                })?;

        debug!(chars = reply.response.len(), "generator replied");
        Ok(reply.response)
    }
}
