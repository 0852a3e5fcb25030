use crate::api::error::{AppError, body_limit_exceeded};
use crate::services::accounts::{AccountService, ProfileUpdate, ProfileView};
use crate::utils::auth::CurrentUser;
use crate::utils::validation::{FileKind, content_type_for, file_extension};
use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio_util::io::{ReaderStream, StreamReader};
use utoipa::ToSchema;

/// Avatars are small; anything above this is rejected.
pub const AVATAR_MAX_BYTES: u64 = 2 * 1024 * 1024;

fn avatar_too_large() -> AppError {
    AppError::PayloadTooLarge("Avatar must be at most 2 MB".to_string())
}

#[derive(Serialize, ToSchema)]
pub struct AvatarResponse {
    pub url: String,
}

#[utoipa::path(
    get,
    path = "/users/{username}/profile",
    params(
        ("username" = String, Path, description = "Username")
    ),
    responses(
        (status = 200, description = "Public profile", body = ProfileView),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn get_profile(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(AccountService::profile(&state.db, &user, &username).await?))
}

#[utoipa::path(
    get,
    path = "/users/me/profile",
    responses(
        (status = 200, description = "The caller's own profile", body = ProfileView),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn my_profile(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(
        AccountService::profile(&state.db, &user, &user.username).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/users/me/profile",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile updated successfully", body = ProfileView),
        (status = 400, description = "A field is too long"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn update_profile(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(
        AccountService::update_profile(&state.db, &user, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/users/me/avatar",
    request_body(content = Object, description = "Avatar image file (jpg or png)", content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Avatar uploaded successfully", body = AvatarResponse),
        (status = 400, description = "Missing or unsupported image"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Image too large")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn upload_avatar(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<AvatarResponse>, AppError> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                avatar_too_large()
            } else {
                AppError::BadRequest(e.body_text())
            }
        })?
        .ok_or_else(|| AppError::field("avatar", "No file was submitted."))?;

    let filename = field.file_name().unwrap_or_default().to_string();
    if FileKind::from_filename(&filename) != FileKind::Image {
        return Err(AppError::field("avatar", "Upload a valid image (jpg or png)."));
    }
    let extension = file_extension(&filename).unwrap_or_default();
    let key = format!("avatars/{}_{}.{}", user.id, uuid::Uuid::new_v4().simple(), extension);

    let reader = StreamReader::new(field.map_err(std::io::Error::other));
    let stored = match state
        .storage
        .put_stream_with_hash(&key, Box::pin(reader.take(AVATAR_MAX_BYTES + 1)))
        .await
    {
        Ok(stored) => stored,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete_file(&key).await {
                tracing::warn!("Failed to remove partial avatar {}: {}", key, cleanup);
            }
            return Err(if body_limit_exceeded(&e) {
                avatar_too_large()
            } else {
                e.into()
            });
        }
    };

    if stored.size as u64 > AVATAR_MAX_BYTES || stored.size == 0 {
        state.storage.delete_file(&key).await?;
        return Err(if stored.size == 0 {
            AppError::field("avatar", "The submitted file is empty.")
        } else {
            avatar_too_large()
        });
    }

    if let Some(previous) = AccountService::set_avatar(&state.db, &user.id, &key).await? {
        if let Err(e) = state.storage.delete_file(&previous).await {
            tracing::warn!("Failed to remove old avatar {}: {}", previous, e);
        }
    }

    Ok(Json(AvatarResponse {
        url: format!("/users/{}/avatar", user.username),
    }))
}

#[utoipa::path(
    get,
    path = "/users/{username}/avatar",
    params(
        ("username" = String, Path, description = "Username")
    ),
    responses(
        (status = 200, description = "Avatar image"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Avatar not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "users"
)]
pub async fn get_avatar(
    State(state): State<crate::AppState>,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let key = AccountService::avatar_key(&state.db, &username).await?;
    if !state.storage.file_exists(&key).await? {
        return Err(AppError::NotFound("Avatar not found".to_string()));
    }
    let reader = state.storage.open_read(&key).await?;

    Ok((
        [(header::CONTENT_TYPE, content_type_for(&key))],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response())
}
