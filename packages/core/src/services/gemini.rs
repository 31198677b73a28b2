//! Generative-AI text completion client.
//!
//! Output is advisory only: nothing in the ledger or pricing path depends
//! on it, and failures fold into a `success: false` response.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default output token budget when a request does not set one.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f64 = 0.7;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AiServiceError {
    #[error("AI service network error: {message}")]
    Network { message: String },

    #[error("AI service error: {message}")]
    Api { message: String },

    #[error("AI service response format error: {message}")]
    Format { message: String },

    #[error("AI service is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub prompt: String,
    pub context: Option<String>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: None,
            max_tokens: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Context and prompt joined the way the model receives them.
    pub fn full_text(&self) -> String {
        match &self.context {
            Some(context) => format!("{}\n\n{}", context, self.prompt),
            None => self.prompt.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub success: bool,
    pub error: Option<String>,
}

impl From<Result<String, AiServiceError>> for CompletionResponse {
    fn from(result: Result<String, AiServiceError>) -> Self {
        match result {
            Ok(text) => Self {
                text,
                success: true,
                error: None,
            },
            Err(err) => Self {
                text: String::new(),
                success: false,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Anything that can turn a prompt into text
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiServiceError>;

    /// [`complete`](Self::complete) with errors folded into the response.
    async fn generate(&self, request: &CompletionRequest) -> CompletionResponse {
        let result = self.complete(request).await;
        if let Err(err) = &result {
            tracing::warn!("Text completion failed: {}", err);
        }
        result.into()
    }
}

/// Client for the Gemini `generateContent` endpoint
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    http: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextCompletion for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AiServiceError> {
        if self.api_key.is_empty() {
            return Err(AiServiceError::NotConfigured);
        }

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.full_text(),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
                temperature: TEMPERATURE,
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| AiServiceError::Network {
                message: err.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|e| e.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("Failed to generate content (HTTP {})", status));
            return Err(AiServiceError::Api { message });
        }

        let parsed = response
            .json::<GenerateResponse>()
            .await
            .map_err(|err| AiServiceError::Format {
                message: err.to_string(),
            })?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        tracing::debug!("Generated {} characters of advisory text", text.len());
        Ok(text)
    }
}
