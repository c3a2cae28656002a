//! Ollama-compatible generation provider.

use super::{GenerationProvider, ProviderError};
use crate::config::OllamaConfig;
use crate::models::{GenerationRequest, GenerationResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::time::Duration;

/// Fixed ceiling for the startup and `/health` probes.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaProvider {
    config: OllamaConfig,
    client: Client,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.base_url, path)
    }

    fn map_send_error(&self, err: reqwest::Error, timeout: Duration) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(timeout)
        } else {
            ProviderError::Connection(err.to_string())
        }
    }

    async fn send_generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ProviderError> {
        let timeout = self.config.request_timeout();
        let response = self
            .client
            .traced_post(&self.api_url("generate"))
            .json(&GenerateRequest {
                model: &request.model,
                prompt: &request.prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(e, timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!(
                "Ollama API error {}: {}",
                status, error_text
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(timeout)
            } else {
                ProviderError::ApiError(format!("Failed to parse response: {}", e))
            }
        })?;

        Ok(GenerationResult {
            text: body.response,
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ProviderError> {
        tracing::info!(
            model = %request.model,
            prompt_len = request.prompt.len(),
            "Sending request to Ollama"
        );
        tracing::debug!(prompt = %request.prompt, "Prompt text");

        let result = self.send_generate(request).await;

        match &result {
            Ok(generated) => {
                tracing::info!(
                    model = %request.model,
                    response_len = generated.text.len(),
                    "Received response from Ollama"
                );
                tracing::debug!(response = %generated.text, "Response text");
            }
            Err(e) => tracing::error!(
                model = %request.model,
                error = %e,
                "Error communicating with Ollama"
            ),
        }

        result
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .traced_get(&self.api_url("tags"))
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.map_send_error(e, HEALTH_CHECK_TIMEOUT))?;

        if !response.status().is_success() {
            return Err(ProviderError::ApiError(format!(
                "Ollama health check returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
