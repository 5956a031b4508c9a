//! Language-model clients.
//!
//! The heal loop and the guideline improver only need `generate(prompt) -> text`.
//! [`ModelClient`] is that seam; each provider shapes its own HTTP payload and
//! knows where the generated text lives in its response. Provider, model and
//! credential are fixed at construction via [`ModelSettings`], which `main`
//! resolves once at startup.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::io::config::ModelConfig;

/// Env var that overrides `model.provider` from the config file.
pub const PROVIDER_ENV: &str = "AI_MODEL_PROVIDER";

// Generations for whole files can be slow; reqwest's blocking default (30s) is too short.
const REQUEST_TIMEOUT_SECS: u64 = 300;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const CLAUDE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Openai,
    Claude,
    Openrouter,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Openai => "openai",
            Provider::Claude => "claude",
            Provider::Openrouter => "openrouter",
        }
    }

    /// Env var holding this provider's API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Openai => "OPENAI_API_KEY",
            Provider::Claude => "CLAUDE_API_KEY",
            Provider::Openrouter => "OPENROUTER_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-pro",
            Provider::Openai => "gpt-3.5-turbo",
            Provider::Claude => "claude-3-opus-20240229",
            Provider::Openrouter => "mistralai/mistral-7b-instruct",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::Openai),
            "claude" => Ok(Provider::Claude),
            "openrouter" => Ok(Provider::Openrouter),
            other => Err(anyhow!(
                "unsupported AI model provider '{other}' (expected gemini, openai, claude or openrouter)"
            )),
        }
    }
}

/// Failure talking to a model provider.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("API key for {provider} not found; set {env_var}")]
    MissingCredential {
        provider: Provider,
        env_var: &'static str,
    },
    #[error("request to {provider} failed: {error}")]
    Http {
        provider: Provider,
        error: reqwest::Error,
    },
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: Provider,
        status: u16,
        body: String,
    },
    #[error("could not decode {provider} response as JSON: {error}")]
    Decode {
        provider: Provider,
        error: reqwest::Error,
    },
    #[error("{provider} response has no text at {pointer}: {body}")]
    MissingText {
        provider: Provider,
        pointer: &'static str,
        body: String,
    },
}

/// Capability to turn a prompt into generated text.
pub trait ModelClient {
    fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

impl<T: ModelClient + ?Sized> ModelClient for Box<T> {
    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        (**self).generate(prompt)
    }
}

/// Fully resolved model selection, passed to clients at construction.
#[derive(Clone, PartialEq)]
pub struct ModelSettings {
    pub provider: Provider,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Absent keys are reported by the first `generate` call, not at startup.
    pub api_key: Option<String>,
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ModelSettings {
    pub fn new(cfg: &ModelConfig, provider: Provider, api_key: Option<String>) -> Self {
        Self {
            provider,
            model: cfg
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    /// Resolve provider and credential from the process environment.
    ///
    /// `AI_MODEL_PROVIDER` overrides the configured provider; the key comes from
    /// the provider's own env var. Call once at startup.
    pub fn from_env(cfg: &ModelConfig) -> Result<Self> {
        let provider = match std::env::var(PROVIDER_ENV) {
            Ok(raw) if !raw.trim().is_empty() => {
                raw.parse().with_context(|| format!("parse {PROVIDER_ENV}"))?
            }
            _ => cfg.provider,
        };
        let api_key = std::env::var(provider.api_key_env()).ok();
        Ok(Self::new(cfg, provider, api_key))
    }

    fn require_key(&self) -> Result<&str, ModelError> {
        self.api_key
            .as_deref()
            .ok_or(ModelError::MissingCredential {
                provider: self.provider,
                env_var: self.provider.api_key_env(),
            })
    }
}

/// Create the client for the configured provider.
pub fn build_client(settings: &ModelSettings) -> Result<Box<dyn ModelClient>> {
    let http = Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .context("Failed to create HTTP client")?;
    let client: Box<dyn ModelClient> = match settings.provider {
        Provider::Gemini => Box::new(GeminiClient::new(http, settings.clone())),
        Provider::Openai => Box::new(ChatCompletionsClient::openai(http, settings.clone())),
        Provider::Openrouter => {
            Box::new(ChatCompletionsClient::openrouter(http, settings.clone()))
        }
        Provider::Claude => Box::new(ClaudeClient::new(http, settings.clone())),
    };
    debug!(provider = %settings.provider, model = %settings.model, "model client ready");
    Ok(client)
}

/// Google Gemini `generateContent`.
pub struct GeminiClient {
    http: Client,
    settings: ModelSettings,
}

impl GeminiClient {
    const TEXT_POINTER: &'static str = "/candidates/0/content/parts/0/text";

    pub fn new(http: Client, settings: ModelSettings) -> Self {
        Self { http, settings }
    }

    fn payload(&self, prompt: &str) -> Value {
        json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.settings.temperature },
        })
    }
}

impl ModelClient for GeminiClient {
    #[instrument(skip_all, fields(provider = "gemini", model = %self.settings.model))]
    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let key = self.settings.require_key()?;
        let url = format!(
            "{GEMINI_BASE_URL}/models/{}:generateContent",
            self.settings.model
        );
        let request = self
            .http
            .post(url)
            .query(&[("key", key)])
            .json(&self.payload(prompt));
        let body = send_json(self.settings.provider, request)?;
        extract_text(self.settings.provider, &body, Self::TEXT_POINTER)
    }
}

/// OpenAI-compatible `chat/completions` (OpenAI and OpenRouter).
pub struct ChatCompletionsClient {
    http: Client,
    settings: ModelSettings,
    url: &'static str,
    extra_headers: Vec<(&'static str, &'static str)>,
}

impl ChatCompletionsClient {
    const TEXT_POINTER: &'static str = "/choices/0/message/content";

    pub fn openai(http: Client, settings: ModelSettings) -> Self {
        Self {
            http,
            settings,
            url: OPENAI_URL,
            extra_headers: Vec::new(),
        }
    }

    pub fn openrouter(http: Client, settings: ModelSettings) -> Self {
        Self {
            http,
            settings,
            url: OPENROUTER_URL,
            extra_headers: vec![("X-Title", "reflex")],
        }
    }

    fn payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.settings.temperature,
        })
    }
}

impl ModelClient for ChatCompletionsClient {
    #[instrument(skip_all, fields(provider = %self.settings.provider, model = %self.settings.model))]
    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let key = self.settings.require_key()?;
        let mut request = self
            .http
            .post(self.url)
            .bearer_auth(key)
            .json(&self.payload(prompt));
        for (name, value) in &self.extra_headers {
            request = request.header(*name, *value);
        }
        let body = send_json(self.settings.provider, request)?;
        extract_text(self.settings.provider, &body, Self::TEXT_POINTER)
    }
}

/// Anthropic Messages API.
pub struct ClaudeClient {
    http: Client,
    settings: ModelSettings,
}

impl ClaudeClient {
    const TEXT_POINTER: &'static str = "/content/0/text";

    pub fn new(http: Client, settings: ModelSettings) -> Self {
        Self { http, settings }
    }

    fn payload(&self, prompt: &str) -> Value {
        json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.settings.temperature,
        })
    }
}

impl ModelClient for ClaudeClient {
    #[instrument(skip_all, fields(provider = "claude", model = %self.settings.model))]
    fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let key = self.settings.require_key()?;
        let request = self
            .http
            .post(CLAUDE_URL)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.payload(prompt));
        let body = send_json(self.settings.provider, request)?;
        extract_text(self.settings.provider, &body, Self::TEXT_POINTER)
    }
}

fn send_json(provider: Provider, request: RequestBuilder) -> Result<Value, ModelError> {
    let response = request
        .send()
        .map_err(|error| ModelError::Http { provider, error })?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        warn!(%provider, status = status.as_u16(), "model API error");
        return Err(ModelError::Status {
            provider,
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<Value>()
        .map_err(|error| ModelError::Decode { provider, error })
}

fn extract_text(provider: Provider, body: &Value, pointer: &'static str) -> Result<String, ModelError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ModelError::MissingText {
            provider,
            pointer,
            body: body.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: Provider, api_key: Option<&str>) -> ModelSettings {
        ModelSettings::new(
            &ModelConfig::default(),
            provider,
            api_key.map(str::to_string),
        )
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("Claude".parse::<Provider>().expect("parse"), Provider::Claude);
        assert_eq!(
            " openrouter ".parse::<Provider>().expect("parse"),
            Provider::Openrouter
        );
        let err = "llama".parse::<Provider>().unwrap_err();
        assert!(err.to_string().contains("unsupported AI model provider"));
    }

    #[test]
    fn settings_fall_back_to_provider_default_model() {
        let s = settings(Provider::Openai, Some("k"));
        assert_eq!(s.model, "gpt-3.5-turbo");

        let cfg = ModelConfig {
            model: Some("gpt-4o".to_string()),
            ..ModelConfig::default()
        };
        let s = ModelSettings::new(&cfg, Provider::Openai, None);
        assert_eq!(s.model, "gpt-4o");
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let s = settings(Provider::Gemini, Some("   "));
        assert_eq!(s.api_key, None);
    }

    #[test]
    fn debug_output_redacts_key() {
        let s = settings(Provider::Claude, Some("sk-secret"));
        let shown = format!("{s:?}");
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn missing_credential_fails_before_any_request() {
        for provider in [
            Provider::Gemini,
            Provider::Openai,
            Provider::Claude,
            Provider::Openrouter,
        ] {
            let client = build_client(&settings(provider, None)).expect("client");
            let err = client.generate("prompt").unwrap_err();
            assert!(
                matches!(err, ModelError::MissingCredential { provider: p, .. } if p == provider)
            );
            assert!(err.to_string().contains(provider.api_key_env()));
        }
    }

    #[test]
    fn payloads_carry_prompt_model_and_temperature() {
        let http = Client::new();

        let gemini = GeminiClient::new(http.clone(), settings(Provider::Gemini, None));
        let body = gemini.payload("hello");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert!(body["generationConfig"]["temperature"].is_number());

        let openai = ChatCompletionsClient::openai(http.clone(), settings(Provider::Openai, None));
        let body = openai.payload("hello");
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");

        let claude = ClaudeClient::new(http, settings(Provider::Claude, None));
        let body = claude.payload("hello");
        assert_eq!(body["max_tokens"], 4000);
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn extracts_text_from_provider_paths() {
        let gemini = json!({"candidates": [{"content": {"parts": [{"text": "G"}]}}]});
        let chat = json!({"choices": [{"message": {"role": "assistant", "content": "C"}}]});
        let claude = json!({"content": [{"type": "text", "text": "A"}]});

        assert_eq!(
            extract_text(Provider::Gemini, &gemini, GeminiClient::TEXT_POINTER).expect("gemini"),
            "G"
        );
        assert_eq!(
            extract_text(Provider::Openai, &chat, ChatCompletionsClient::TEXT_POINTER)
                .expect("chat"),
            "C"
        );
        assert_eq!(
            extract_text(Provider::Claude, &claude, ClaudeClient::TEXT_POINTER).expect("claude"),
            "A"
        );
    }

    #[test]
    fn malformed_response_is_missing_text() {
        let body = json!({"error": {"message": "quota"}});
        let err = extract_text(Provider::Openai, &body, ChatCompletionsClient::TEXT_POINTER)
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingText { .. }));
        assert!(err.to_string().contains("quota"));
    }
}
