//! Authentication route handlers.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use bazaar_core::api::ApiResponse;
use bazaar_core::db::users::{User, UserRepository};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

use crate::error::{AppError, Result, set_sentry_user};
use crate::extract::ValidatedJson;
use crate::middleware::auth::{
    AUTH_COOKIE, REFRESH_COOKIE, RequireUser, cookie_value, expired_cookie, token_cookie,
};
use crate::services::auth::{AuthService, Registration, TokenPair, issue_tokens};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub full_name: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Body returned by register, login and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

type CookieHeaders = AppendHeaders<[(axum::http::HeaderName, String); 2]>;

fn session_cookies(state: &AppState, tokens: &TokenPair) -> CookieHeaders {
    let auth = &state.config().auth;
    AppendHeaders([
        (
            SET_COOKIE,
            token_cookie(
                AUTH_COOKIE,
                tokens.access_token.clone(),
                auth.access_ttl_secs,
                auth.secure_cookies,
            ),
        ),
        (
            SET_COOKIE,
            token_cookie(
                REFRESH_COOKIE,
                tokens.refresh_token.clone(),
                auth.refresh_ttl_secs,
                auth.secure_cookies,
            ),
        ),
    ])
}

/// `POST /api/auth/register`
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool())
        .register(Registration {
            email: &body.email,
            password: &body.password,
            full_name: &body.full_name,
            phone: body.phone.as_deref(),
        })
        .await?;

    let tokens = issue_tokens(
        state.access_tokens(),
        state.refresh_tokens(),
        &user,
        Utc::now(),
    )?;
    let cookies = session_cookies(&state, &tokens);

    Ok((
        StatusCode::CREATED,
        cookies,
        Json(ApiResponse::ok(AuthResponse { user, tokens })),
    ))
}

/// `POST /api/auth/login`
#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;

    let tokens = issue_tokens(
        state.access_tokens(),
        state.refresh_tokens(),
        &user,
        Utc::now(),
    )?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    tracing::info!(user_id = %user.id, "user logged in");

    let cookies = session_cookies(&state, &tokens);
    Ok((cookies, Json(ApiResponse::ok(AuthResponse { user, tokens }))))
}

/// `POST /api/auth/refresh`
///
/// Exchanges the refresh cookie for a new token pair. A missing cookie is
/// 401; a cookie that does not verify is 403.
#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse> {
    let token = cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| AppError::Unauthorized("Refresh token required".to_string()))?;

    let now = Utc::now();
    let claims = state
        .refresh_tokens()
        .verify(&token, now)
        .map_err(|_| AppError::Forbidden("Invalid refresh token".to_string()))?;

    let user = AuthService::new(state.pool())
        .active_user(claims.sub)
        .await
        .map_err(|_| AppError::Forbidden("Invalid refresh token".to_string()))?;

    let tokens = issue_tokens(state.access_tokens(), state.refresh_tokens(), &user, now)?;
    let cookies = session_cookies(&state, &tokens);
    Ok((cookies, Json(ApiResponse::ok(AuthResponse { user, tokens }))))
}

/// `POST /api/auth/logout`
pub async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([
            (SET_COOKIE, expired_cookie(AUTH_COOKIE)),
            (SET_COOKIE, expired_cookie(REFRESH_COOKIE)),
        ]),
        Json(ApiResponse::message("Logged out successfully")),
    )
}

/// `GET /api/auth/me`
#[instrument(skip(state, current))]
pub async fn me(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<ApiResponse<User>>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(ApiResponse::ok(user)))
}
