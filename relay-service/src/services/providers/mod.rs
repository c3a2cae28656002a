//! Collaborator seams: the downstream generation service and the mail transport.

pub mod email;
pub mod ollama;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{GenerationRequest, GenerationResult};

pub use email::{MockEmailProvider, SmtpProvider};
pub use ollama::{OllamaProvider, HEALTH_CHECK_TIMEOUT};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Send error: {0}")]
    SendFailed(String),
}

#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Requests a single complete (non-streamed) generation.
    async fn generate(&self, request: &GenerationRequest)
        -> Result<GenerationResult, ProviderError>;

    /// Cheap reachability probe bounded by [`HEALTH_CHECK_TIMEOUT`].
    async fn health_check(&self) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: &EmailMessage) -> Result<ProviderResponse, ProviderError>;
}
