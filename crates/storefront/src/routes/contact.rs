//! Contact form handler.

use axum::{Json, extract::State, http::StatusCode};
use bazaar_core::api::ApiResponse;
use bazaar_core::db::ContactRepository;
use bazaar_core::db::contact::{ContactMessage, NewContactMessage};
use tracing::instrument;

use crate::error::Result;
use crate::extract::ValidatedJson;
use crate::state::AppState;

/// `POST /api/contact`
#[instrument(skip(state, body), fields(subject = %body.subject))]
pub async fn submit(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<NewContactMessage>,
) -> Result<(StatusCode, Json<ApiResponse<ContactMessage>>)> {
    let message = ContactRepository::new(state.pool()).create(&body).await?;
    tracing::info!(contact_id = %message.id, "contact message received");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(message).with_message("Thank you for your message")),
    ))
}
