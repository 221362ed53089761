//! Account route handlers.
//!
//! These routes require authentication.

use axum::{Json, extract::State, http::StatusCode};
use bazaar_core::api::ApiResponse;
use bazaar_core::db::AddressRepository;
use bazaar_core::db::addresses::{Address, NewAddress};
use tracing::instrument;

use crate::error::Result;
use crate::extract::ValidatedJson;
use crate::middleware::RequireUser;
use crate::state::AppState;

/// `GET /api/account/addresses`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn addresses(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<ApiResponse<Vec<Address>>>> {
    let addresses = AddressRepository::new(state.pool()).list(user.id).await?;
    Ok(Json(ApiResponse::ok(addresses)))
}

/// `POST /api/account/addresses`
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ValidatedJson(body): ValidatedJson<NewAddress>,
) -> Result<(StatusCode, Json<ApiResponse<Address>>)> {
    let address = AddressRepository::new(state.pool())
        .create(user.id, &body)
        .await?;
    tracing::info!(address_id = %address.id, "Address saved");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(address).with_message("Address saved")),
    ))
}
