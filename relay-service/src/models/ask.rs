use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Field, RelayError};

/// Inbound `POST /ask` body as sent by the client.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(required, length(min = 1))]
    pub model: Option<String>,
    #[validate(required, length(min = 1))]
    pub prompt: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

impl AskRequest {
    /// Validates the body, reporting the first failing field in
    /// model, prompt, email order.
    pub fn into_generation_request(self) -> Result<GenerationRequest, RelayError> {
        let request = AskRequest {
            email: self.email.filter(|e| !e.is_empty()),
            ..self
        };

        if let Err(errors) = request.validate() {
            let fields = errors.field_errors();
            if fields.contains_key("model") {
                return Err(RelayError::MissingField(Field::Model));
            }
            if fields.contains_key("prompt") {
                return Err(RelayError::MissingField(Field::Prompt));
            }
            return Err(RelayError::invalid_email());
        }

        Ok(GenerationRequest {
            model: request.model.unwrap_or_default(),
            prompt: request.prompt.unwrap_or_default(),
            email: request.email,
        })
    }
}

/// A request that passed intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
