use crate::api::error::AppError;
use crate::services::accounts::{AccountService, AuthResponse, LoginRequest, RegisterRequest};
use crate::utils::auth::Claims;
use axum::{Extension, Json, extract::State, http::StatusCode};

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid or already taken username, weak password")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<crate::AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = AccountService::register(
        &state.db,
        payload,
        &state.config.jwt_secret,
        state.config.token_ttl_hours,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<crate::AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = AccountService::login(
        &state.db,
        payload,
        &state.config.jwt_secret,
        state.config.token_ttl_hours,
    )
    .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, AppError> {
    AccountService::logout(&state.db, &claims.jti).await?;
    Ok(StatusCode::NO_CONTENT)
}
