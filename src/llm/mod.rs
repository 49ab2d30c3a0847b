pub mod prompt;

pub use prompt::{build_prompt, DescriptionFormat, DescriptionMode, PromptSource};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite"];
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Generation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Model API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Model returned no text")]
    EmptyResponse,
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::Status { status: 429, .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }
}

/// A hosted text model that turns a prompt into text.
/// Must be Send + Sync so one client can serve concurrent requests.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str, options: &GenerationOptions) -> Result<String, LlmError>;
}

/// Outcome of walking the model list.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOutcome {
    pub text: Option<String>,
    pub used_model: Option<String>,
    /// Every model was tried and none produced text
    pub exhausted: bool,
}

/// Try each model in order and return the first successful response.
#[instrument(skip(generator, prompt, options), fields(prompt_len = prompt.len()))]
pub async fn generate_with_fallback(
    generator: &dyn TextGenerator,
    models: &[String],
    prompt: &str,
    options: &GenerationOptions,
) -> GenerateOutcome {
    for model in models {
        debug!(model = %model, "trying model");
        match generator.generate(model, prompt, options).await {
            Ok(text) => {
                info!(model = %model, output_len = text.len(), "generation succeeded");
                return GenerateOutcome {
                    text: Some(text),
                    used_model: Some(model.clone()),
                    exhausted: false,
                };
            }
            Err(e) => {
                warn!(model = %model, error = %e, rate_limited = e.is_rate_limited(), "model failed, trying next");
            }
        }
    }

    warn!("all models exhausted, generation failed");
    GenerateOutcome {
        text: None,
        used_model: None,
        exhausted: true,
    }
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    api_url: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(api_key: SecretString, api_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str, options: &GenerationOptions) -> Result<String, LlmError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_url, model);
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            },
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }

        let body = response.json::<GenerateResponse>().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}
