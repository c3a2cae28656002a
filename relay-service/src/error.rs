//! Request-level error taxonomy and its JSON rendering.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Required request fields, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Model,
    Prompt,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Model => write!(f, "Model"),
            Field::Prompt => write!(f, "Prompt"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0} is required")]
    MissingField(Field),

    #[error("{message}")]
    InvalidFormat {
        message: &'static str,
        details: Option<String>,
    },

    #[error("Failed to communicate with generation service: {0}")]
    UpstreamUnavailable(String),

    #[error("Failed to send email: {details}")]
    DeliveryFailed { details: String, response: String },

    #[error("Startup failure: {0}")]
    StartupFailure(String),
}

impl RelayError {
    pub fn invalid_email() -> Self {
        RelayError::InvalidFormat {
            message: "Invalid email format",
            details: None,
        }
    }

    pub fn invalid_body(details: impl Into<String>) -> Self {
        RelayError::InvalidFormat {
            message: "Invalid request body",
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            response: Option<String>,
        }

        let (status, error, details, response) = match self {
            RelayError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                format!("{} is required", field),
                None,
                None,
            ),
            RelayError::InvalidFormat { message, details } => {
                (StatusCode::BAD_REQUEST, message.to_string(), details, None)
            }
            RelayError::UpstreamUnavailable(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to communicate with generation service".to_string(),
                Some(details),
                None,
            ),
            RelayError::DeliveryFailed { details, response } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send email".to_string(),
                Some(details),
                Some(response),
            ),
            RelayError::StartupFailure(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                Some(details),
                None,
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                details,
                response,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: RelayError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_field_names_the_field() {
        let (status, body) = body_json(RelayError::MissingField(Field::Prompt)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Prompt is required");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_generated_text() {
        let (status, body) = body_json(RelayError::DeliveryFailed {
            details: "550 mailbox unavailable".to_string(),
            response: "hello".to_string(),
        })
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to send email");
        assert_eq!(body["details"], "550 mailbox unavailable");
        assert_eq!(body["response"], "hello");
    }
}
