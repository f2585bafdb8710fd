//! Newsletter subscription endpoint.

use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;
use tracing::instrument;
use vdubs_core::Email;

use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
}

/// `POST /api/newsletter` with `{"email": "..."}`.
#[instrument(skip(state, body))]
pub async fn subscribe(State(state): State<AppState>, body: Bytes) -> Result<Json<SubscribeResponse>> {
    let client = state.newsletter().ok_or_else(|| {
        AppError::ServiceUnavailable("Newsletter service not configured".to_string())
    })?;

    let email = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|body| body.get("email")?.as_str().map(str::to_owned))
        .and_then(|raw| Email::parse(&raw).ok())
        .ok_or_else(|| AppError::BadRequest("Valid email required".to_string()))?;

    client.subscribe(&email).await?;
    tracing::info!(domain = %email.domain(), "Newsletter subscription successful");

    Ok(Json(SubscribeResponse { success: true }))
}
