//! Gemini (Google) image generation provider.

use crate::error::{is_entity_not_found, sanitize_error_message, Result, WarrickError};
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerationRequest, ImageFormat, ImagePayload};
use crate::keys::{key_from_env, Credentials, DEFAULT_KEY_ENV_VARS};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Builder for GeminiProvider.
#[derive(Debug, Clone)]
pub struct GeminiProviderBuilder {
    api_key: Option<String>,
    credentials: Credentials,
    env_vars: Vec<String>,
    base_url: String,
    timeout: Duration,
}

impl Default for GeminiProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            credentials: Credentials::default(),
            env_vars: DEFAULT_KEY_ENV_VARS.iter().map(|s| s.to_string()).collect(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `API_KEY`, `GEMINI_API_KEY`, then
    /// `GOOGLE_API_KEY`, looked up on every request.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Shares a credentials handle that key selection writes into. A selected
    /// key wins over the explicit key and the environment.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Overrides which environment variables are consulted for the key.
    pub fn env_vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_vars = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the API base URL (useful for proxies).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the HTTP request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider. The API key is resolved later, per request.
    pub fn build(self) -> Result<GeminiProvider> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(GeminiProvider {
            client,
            api_key: self.api_key,
            credentials: self.credentials,
            env_vars: self.env_vars,
            base_url: self.base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Gemini image generation provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    credentials: Credentials,
    env_vars: Vec<String>,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    fn resolve_api_key(&self) -> Result<String> {
        self.credentials
            .selected()
            .or_else(|| self.api_key.clone().filter(|k| !k.trim().is_empty()))
            .or_else(|| key_from_env(&self.env_vars))
            .ok_or_else(|| {
                WarrickError::Config(format!(
                    "API key is missing; set one of {}",
                    self.env_vars.join(", ")
                ))
            })
    }

    async fn generate_impl(&self, request: &GenerationRequest) -> Result<ImagePayload> {
        if request.prompt.trim().is_empty() {
            return Err(WarrickError::InvalidRequest("prompt must not be empty".into()));
        }
        let api_key = self.resolve_api_key()?;
        let start = Instant::now();

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model,
        );
        let body = GeminiRequest::from_generation_request(request);

        tracing::debug!(
            model = %request.model,
            aspect_ratio = %request.aspect_ratio,
            "sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let payload = extract_payload(gemini_response)?;

        tracing::debug!(
            bytes = payload.size(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Gemini image generation complete"
        );
        Ok(payload)
    }
}

/// Maps a non-2xx response to an error.
fn parse_error(status: u16, text: &str) -> WarrickError {
    let message = sanitize_error_message(text);
    if status == 401 || status == 403 {
        return WarrickError::Auth(message);
    }
    if status == 404 && is_entity_not_found(text) {
        return WarrickError::Auth(message);
    }
    let lower = message.to_lowercase();
    if lower.contains("api key not valid") || lower.contains("api_key_invalid") {
        return WarrickError::Auth(message);
    }
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return WarrickError::ContentBlocked(message);
    }
    WarrickError::Api { status, message }
}

/// Pulls the first inline image out of a successful response.
fn extract_payload(response: GeminiResponse) -> Result<ImagePayload> {
    // Blocks are reported with HTTP 200.
    if let Some(feedback) = response.prompt_feedback {
        if let Some(reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(WarrickError::ContentBlocked(msg));
        }
    }

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        WarrickError::EmptyResponse(
            "The model did not return any image data. Please try a different prompt.".into(),
        )
    })?;

    if let Some(ref finish_reason) = candidate.finish_reason {
        if matches!(
            finish_reason.as_str(),
            "SAFETY"
                | "IMAGE_SAFETY"
                | "IMAGE_PROHIBITED_CONTENT"
                | "PROHIBITED_CONTENT"
                | "RECITATION"
                | "IMAGE_RECITATION"
                | "BLOCKLIST"
        ) {
            return Err(WarrickError::ContentBlocked(format!(
                "Content blocked by Gemini safety filter: {}",
                finish_reason
            )));
        }
    }

    let parts = candidate
        .content
        .map(|c| c.parts)
        .filter(|parts| !parts.is_empty())
        .ok_or_else(|| {
            WarrickError::EmptyResponse(
                "The model did not return any image data. Please try a different prompt.".into(),
            )
        })?;

    let mut text_reply = None;
    let mut inline = None;
    for part in parts {
        if let Some(data) = part.inline_data {
            inline = Some(data);
            break;
        }
        if text_reply.is_none() {
            text_reply = part.text;
        }
    }

    let Some(inline) = inline else {
        if let Some(text) = text_reply {
            tracing::debug!(reply = %text, "Gemini answered with text only");
        }
        return Err(WarrickError::NoImageData);
    };

    let data = base64::engine::general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|e| WarrickError::Decode(e.to_string()))?;

    let format = ImageFormat::from_mime_type(&inline.mime_type)
        .or_else(|| ImageFormat::from_magic_bytes(&data))
        .unwrap_or_default();

    Ok(ImagePayload::new(data, format))
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<ImagePayload> {
        self.generate_impl(request).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self, model: &str) -> Result<()> {
        let api_key = self.resolve_api_key()?;
        let url = format!("{}/v1beta/models/{}", self.base_url, model);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(WarrickError::Auth("Invalid API key".into())),
            s if !(200..300).contains(&s) => {
                let text = response.text().await.unwrap_or_default();
                Err(parse_error(s, &text))
            }
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiTextPart>,
}

#[derive(Debug, Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    image_config: GeminiImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: String,
}

impl GeminiRequest {
    fn from_generation_request(req: &GenerationRequest) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiTextPart {
                    text: req.prompt.clone(),
                }],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: GeminiImageConfig {
                    aspect_ratio: req.aspect_ratio.as_str().to_string(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}
