use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::Credential;
use crate::models::ChatMessage;

pub type ModelClientFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Completion, ModelClientError>> + Send + 'a>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub request_id: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            request_id: None,
            usage: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelClientError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider request failed: {0}")]
    ProviderFailure(String),
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

/// Raised while building a client from a credential.
#[derive(Debug, Error)]
pub enum ClientConfigError {
    #[error("credential was rejected: {0}")]
    InvalidCredential(String),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

pub trait ModelClient: Send + Sync {
    fn model(&self) -> &str;

    fn complete<'a>(&'a self, messages: Vec<ChatMessage>) -> ModelClientFuture<'a>;
}

/// Builds a [`ModelClient`] bound to one credential.
pub trait ModelClientFactory: Send + Sync {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn ModelClient>, ClientConfigError>;
}
