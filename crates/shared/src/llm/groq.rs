use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use super::gateway::{
    ClientConfigError, Completion, ModelClient, ModelClientError, ModelClientFactory,
    ModelClientFuture, TokenUsage,
};
use crate::config::ConfigError;
use crate::config_env::{optional_trimmed_env, parse_f32_env, parse_u32_env, parse_u64_env};
use crate::credentials::Credential;
use crate::models::ChatMessage;

const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama3-8b-8192";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 1;
const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 250;
const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone)]
pub struct GroqClientConfig {
    pub chat_completions_url: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_backoff_ms: u64,
    pub temperature: f32,
}

impl GroqClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let chat_completions_url = optional_trimmed_env("GROQ_CHAT_COMPLETIONS_URL")
            .unwrap_or_else(|| DEFAULT_CHAT_COMPLETIONS_URL.to_string());
        validate_http_url(&chat_completions_url)?;

        Ok(Self {
            chat_completions_url,
            model: optional_trimmed_env("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_ms: parse_u64_env("GROQ_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            max_retries: parse_u32_env("GROQ_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_base_backoff_ms: parse_u64_env(
                "GROQ_RETRY_BASE_BACKOFF_MS",
                DEFAULT_RETRY_BASE_BACKOFF_MS,
            )?,
            temperature: parse_f32_env("GROQ_TEMPERATURE", DEFAULT_TEMPERATURE)?,
        })
    }
}

impl Default for GroqClientConfig {
    fn default() -> Self {
        Self {
            chat_completions_url: DEFAULT_CHAT_COMPLETIONS_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_backoff_ms: DEFAULT_RETRY_BASE_BACKOFF_MS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

fn validate_http_url(raw: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(raw).map_err(|err| {
        ConfigError::InvalidConfiguration(format!("GROQ_CHAT_COMPLETIONS_URL is invalid: {err}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidConfiguration(
            "GROQ_CHAT_COMPLETIONS_URL must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

/// Shared across sessions; every `connect` yields a client bound to one credential.
#[derive(Clone)]
pub struct GroqClientFactory {
    client: reqwest::Client,
    config: GroqClientConfig,
}

impl GroqClientFactory {
    pub fn new(config: GroqClientConfig) -> Result<Self, ClientConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ClientConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }
}

impl ModelClientFactory for GroqClientFactory {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn ModelClient>, ClientConfigError> {
        if HeaderValue::from_str(&format!("Bearer {}", credential.expose())).is_err() {
            return Err(ClientConfigError::InvalidCredential(
                "credential contains characters not allowed in an http header".to_string(),
            ));
        }

        Ok(Arc::new(GroqClient {
            client: self.client.clone(),
            config: self.config.clone(),
            credential: credential.clone(),
        }))
    }
}

pub struct GroqClient {
    client: reqwest::Client,
    config: GroqClientConfig,
    credential: Credential,
}

impl GroqClient {
    async fn complete_with_retries(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Completion, ModelClientError> {
        let mut attempt = 0_u32;

        loop {
            match self.send_once(messages).await {
                Ok(completion) => return Ok(completion),
                Err(err) => {
                    if err.retryable && attempt < self.config.max_retries {
                        let backoff_multiplier = 2_u64.saturating_pow(attempt);
                        let backoff_ms = self
                            .config
                            .retry_base_backoff_ms
                            .saturating_mul(backoff_multiplier);
                        debug!(
                            attempt,
                            backoff_ms,
                            error = %err.error,
                            "retrying groq completion request"
                        );
                        sleep(Duration::from_millis(backoff_ms)).await;
                        attempt = attempt.saturating_add(1);
                        continue;
                    }

                    return Err(err.error);
                }
            }
        }
    }

    async fn send_once(&self, messages: &[ChatMessage]) -> Result<Completion, SendAttemptError> {
        let request_body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(&self.config.chat_completions_url)
            .bearer_auth(self.credential.expose())
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SendAttemptError::retryable(ModelClientError::Timeout)
                } else {
                    SendAttemptError::retryable(ModelClientError::ProviderFailure(
                        "request_unavailable".to_string(),
                    ))
                }
            })?;

        let status = response.status();
        let header_request_id = header_request_id(response.headers());
        let body = response.text().await.map_err(|_| {
            SendAttemptError::non_retryable(ModelClientError::InvalidProviderPayload(
                "response_body_read_failed".to_string(),
            ))
        })?;

        if !status.is_success() {
            let provider_code = parse_provider_error_code(&body);
            return Err(SendAttemptError {
                error: ModelClientError::ProviderFailure(format!(
                    "status={} code={provider_code}",
                    status.as_u16()
                )),
                retryable: is_retryable_status(status),
            });
        }

        let parsed: GroqSuccessResponse = serde_json::from_str(&body).map_err(|_| {
            SendAttemptError::non_retryable(ModelClientError::InvalidProviderPayload(
                "response_json_parse_failed".to_string(),
            ))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                SendAttemptError::non_retryable(ModelClientError::InvalidProviderPayload(
                    "missing_choice".to_string(),
                ))
            })?
            .message
            .content
            .ok_or_else(|| {
                SendAttemptError::non_retryable(ModelClientError::InvalidProviderPayload(
                    "missing_content".to_string(),
                ))
            })?;

        Ok(Completion {
            content,
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            request_id: header_request_id.or(parsed.id),
            usage: parsed.usage.map(|usage| TokenUsage {
                prompt_tokens: clamp_u64_to_u32(usage.prompt_tokens.unwrap_or(0)),
                completion_tokens: clamp_u64_to_u32(usage.completion_tokens.unwrap_or(0)),
                total_tokens: clamp_u64_to_u32(usage.total_tokens.unwrap_or(0)),
            }),
        })
    }
}

impl ModelClient for GroqClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    fn complete<'a>(&'a self, messages: Vec<ChatMessage>) -> ModelClientFuture<'a> {
        Box::pin(async move { self.complete_with_retries(&messages).await })
    }
}

#[derive(Debug)]
struct SendAttemptError {
    error: ModelClientError,
    retryable: bool,
}

impl SendAttemptError {
    fn retryable(error: ModelClientError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn non_retryable(error: ModelClientError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GroqSuccessResponse {
    id: Option<String>,
    model: Option<String>,
    choices: Vec<GroqChoice>,
    usage: Option<GroqUsage>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqMessage,
}

#[derive(Debug, Deserialize)]
struct GroqMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn header_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        code: Option<Value>,
        #[serde(rename = "type")]
        kind: Option<String>,
    }

    let parsed = serde_json::from_str::<ProviderErrorEnvelope>(body).ok();
    let Some(details) = parsed.and_then(|envelope| envelope.error) else {
        return "unknown".to_string();
    };

    match details.code {
        Some(Value::String(code)) => code,
        Some(Value::Number(code)) => code.to_string(),
        _ => details.kind.unwrap_or_else(|| "unknown".to_string()),
    }
}

fn clamp_u64_to_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
