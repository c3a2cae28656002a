use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::error::RelayError;
use crate::models::{AskRequest, AskResponse, NotificationMessage};
use crate::startup::AppState;

/// `POST /ask`: validate, relay to the generation service, optionally email the result.
#[tracing::instrument(skip(state, payload))]
pub async fn ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, RelayError> {
    let Json(body) = payload.map_err(|rejection| RelayError::invalid_body(rejection.body_text()))?;
    let request = body.into_generation_request()?;

    let generated = state
        .generator
        .generate(&request)
        .await
        .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;

    let message = match (request.email.as_deref(), state.email_provider.as_ref()) {
        (Some(to), Some(provider)) => {
            let email = NotificationMessage::new(&request.prompt, &generated.text).to_email(to);

            match provider.send(&email).await {
                Ok(receipt) => {
                    tracing::info!(
                        to = %to,
                        provider_id = ?receipt.provider_id,
                        "Response emailed"
                    );
                    Some(format!("Response emailed to {}", to))
                }
                Err(e) => {
                    tracing::error!(to = %to, error = %e, "Error sending email");
                    return Err(RelayError::DeliveryFailed {
                        details: e.to_string(),
                        response: generated.text,
                    });
                }
            }
        }
        (Some(_), None) => {
            tracing::debug!("Email requested but no mail transport is configured");
            None
        }
        (None, _) => None,
    };

    Ok(Json(AskResponse {
        response: generated.text,
        message,
    }))
}
