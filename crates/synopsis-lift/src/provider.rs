//! Generation service clients.
//!
//! Supports Gemini (`generateContent`) and OpenAI-compatible chat completion
//! APIs over async `reqwest`. A client performs exactly one HTTP call per
//! `generate`; retry policy belongs to the controller.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use synopsis_core::schema::RawResponse;

/// Errors from generation calls.
///
/// Everything except [`ProviderError::Config`] is transient: the controller
/// retries it as a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP request failed: {0}")]
    Network(String),
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("response contained no usable candidates")]
    EmptyCandidates,
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("request cancelled: deadline reached")]
    Cancelled,
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = error_message(body);
        match status {
            429 => Self::RateLimited(message),
            400 | 401 | 403 | 404 => Self::Config(format!("HTTP {}: {}", status, message)),
            _ => Self::Server { status, message },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_status(status.as_u16(), "")
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Best-effort extraction of `error.message` from an API error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|err| err.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// One generation call's inputs.
#[derive(Debug, Clone)]
pub struct GenerationParams<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Upper bound for this call, already clipped to any caller deadline.
    pub timeout: Duration,
}

/// Abstraction over text-generation services.
pub trait GenerationClient: Send + Sync {
    /// Send one request. No retries.
    fn generate(
        &self,
        params: &GenerationParams<'_>,
    ) -> impl Future<Output = Result<RawResponse, ProviderError>> + Send;

    /// The model name (for logging).
    fn model_name(&self) -> &str;
}

async fn post_json(
    request: reqwest::RequestBuilder,
    body: &Value,
    timeout: Duration,
) -> Result<Value, ProviderError> {
    let response = request.timeout(timeout).json(body).send().await?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ProviderError::from_status(status.as_u16(), &text));
    }
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))
}

/// A 200 response can still carry an error envelope.
fn check_error_envelope(json: &Value) -> Result<(), ProviderError> {
    let Some(err) = json.get("error") else {
        return Ok(());
    };
    let status = err
        .get("code")
        .and_then(|c| c.as_u64())
        .and_then(|c| u16::try_from(c).ok())
        .unwrap_or(500);
    Err(ProviderError::from_status(status, &json.to_string()))
}

// ---------------------------------------------------------------------------
// Gemini generateContent API
// ---------------------------------------------------------------------------

/// Gemini provider using the `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
    const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            http: reqwest::Client::new(),
        }
    }
}

impl GenerationClient for GeminiClient {
    async fn generate(&self, params: &GenerationParams<'_>) -> Result<RawResponse, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let body = serde_json::json!({
            "systemInstruction": {"parts": [{"text": params.system}]},
            "contents": [
                {"role": "user", "parts": [{"text": params.prompt}]}
            ],
            "generationConfig": {
                "maxOutputTokens": params.max_output_tokens,
                "temperature": params.temperature
            }
        });

        let request = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key);
        let json = post_json(request, &body, params.timeout).await?;
        parse_gemini_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Extract text and usage from a `generateContent` response body.
pub fn parse_gemini_response(json: &Value) -> Result<RawResponse, ProviderError> {
    check_error_envelope(json)?;

    // First candidate whose parts carry any non-blank text.
    let text = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|candidates| {
            candidates.iter().find_map(|candidate| {
                let text: String = candidate
                    .get("content")
                    .and_then(|c| c.get("parts"))
                    .and_then(|p| p.as_array())?
                    .iter()
                    .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                    .collect();
                (!text.trim().is_empty()).then_some(text)
            })
        })
        .ok_or(ProviderError::EmptyCandidates)?;

    let usage = json.get("usageMetadata");
    let input_tokens = usage
        .and_then(|u| u.get("promptTokenCount"))
        .and_then(|t| t.as_u64());
    let output_tokens = usage
        .and_then(|u| u.get("candidatesTokenCount"))
        .and_then(|t| t.as_u64());

    Ok(RawResponse {
        text,
        input_tokens,
        output_tokens,
    })
}

// ---------------------------------------------------------------------------
// OpenAI Chat Completions API
// ---------------------------------------------------------------------------

/// OpenAI-compatible provider (works with OpenAI, Azure, local proxies).
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    const DEFAULT_BASE_URL: &str = "https://api.openai.com";

    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            http: reqwest::Client::new(),
        }
    }
}

impl GenerationClient for OpenAiClient {
    async fn generate(&self, params: &GenerationParams<'_>) -> Result<RawResponse, ProviderError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": params.max_output_tokens,
            "temperature": params.temperature,
            "messages": [
                {"role": "system", "content": params.system},
                {"role": "user", "content": params.prompt}
            ]
        });

        let request = self.http.post(&url).bearer_auth(&self.api_key);
        let json = post_json(request, &body, params.timeout).await?;
        parse_openai_response(&json)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Extract text and usage from a chat-completions response body.
pub fn parse_openai_response(json: &Value) -> Result<RawResponse, ProviderError> {
    check_error_envelope(json)?;

    let text = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| {
            choices.iter().find_map(|choice| {
                choice
                    .get("message")
                    .and_then(|msg| msg.get("content"))
                    .and_then(|c| c.as_str())
                    .filter(|t| !t.trim().is_empty())
            })
        })
        .ok_or(ProviderError::EmptyCandidates)?
        .to_string();

    let usage = json.get("usage");
    let input_tokens = usage
        .and_then(|u| u.get("prompt_tokens"))
        .and_then(|t| t.as_u64());
    let output_tokens = usage
        .and_then(|u| u.get("completion_tokens"))
        .and_then(|t| t.as_u64());

    Ok(RawResponse {
        text,
        input_tokens,
        output_tokens,
    })
}

// ---------------------------------------------------------------------------
// Environment selection
// ---------------------------------------------------------------------------

/// A client chosen at runtime.
#[derive(Debug, Clone)]
pub enum AnyClient {
    Gemini(GeminiClient),
    OpenAi(OpenAiClient),
}

impl GenerationClient for AnyClient {
    async fn generate(&self, params: &GenerationParams<'_>) -> Result<RawResponse, ProviderError> {
        match self {
            Self::Gemini(client) => client.generate(params).await,
            Self::OpenAi(client) => client.generate(params).await,
        }
    }

    fn model_name(&self) -> &str {
        match self {
            Self::Gemini(client) => client.model_name(),
            Self::OpenAi(client) => client.model_name(),
        }
    }
}

/// Build a client from the process environment.
///
/// `GEMINI_API_KEY` wins over `OPENAI_API_KEY`. `SYNOPSIS_MODEL` and
/// `SYNOPSIS_BASE_URL` optionally override the model and endpoint.
pub fn client_from_env() -> Result<AnyClient, ProviderError> {
    client_from_lookup(|key| std::env::var(key).ok())
}

/// [`client_from_env`] over an arbitrary variable lookup.
pub fn client_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<AnyClient, ProviderError> {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let model = var("SYNOPSIS_MODEL");
    let base_url = var("SYNOPSIS_BASE_URL");

    if let Some(key) = var("GEMINI_API_KEY") {
        return Ok(AnyClient::Gemini(GeminiClient::new(key, model, base_url)));
    }
    if let Some(key) = var("OPENAI_API_KEY") {
        return Ok(AnyClient::OpenAi(OpenAiClient::new(key, model, base_url)));
    }
    Err(ProviderError::Config(
        "no API key found; set GEMINI_API_KEY or OPENAI_API_KEY".to_string(),
    ))
}
