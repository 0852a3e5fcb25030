use crate::api::error::AppError;
use crate::api::extract::FormOrJson;
use crate::services::comments::{CommentDeleted, CommentPosted, CommentService, CommentThread};
use crate::utils::auth::CurrentUser;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use serde::Deserialize;
use utoipa::ToSchema;

/// Text fields arrive untyped so that a bad `parent_id` is reported as a
/// field error rather than a rejected body.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CommentForm {
    pub body: Option<String>,
    pub parent_id: Option<ParentId>,
}

/// Forms send the parent as text, JSON clients usually as a number.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ParentId {
    Number(i64),
    Text(String),
}

fn parse_parent_id(raw: Option<&ParentId>) -> Result<i32, AppError> {
    let invalid = || AppError::field("parent_id", "Enter a whole number.");
    match raw {
        Some(ParentId::Number(n)) => i32::try_from(*n).map_err(|_| invalid()),
        Some(ParentId::Text(text)) if !text.trim().is_empty() => {
            text.trim().parse::<i32>().map_err(|_| invalid())
        }
        _ => Err(AppError::field("parent_id", "Missing parent_id.")),
    }
}

#[utoipa::path(
    post,
    path = "/materials/{id}/comment",
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    request_body(content = CommentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Comment posted", body = CommentPosted),
        (status = 400, description = "Empty or too long body"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Material not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "comments"
)]
pub async fn add_comment(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(material_id): Path<i32>,
    FormOrJson(form): FormOrJson<CommentForm>,
) -> Result<Json<CommentPosted>, AppError> {
    let body = form.body.unwrap_or_default();
    let posted = CommentService::add_comment(
        &state.db,
        &user,
        material_id,
        &body,
        state.config.comment_max_chars,
    )
    .await?;
    Ok(Json(posted))
}

#[utoipa::path(
    post,
    path = "/materials/{id}/reply",
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    request_body(content = CommentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Reply posted", body = CommentPosted),
        (status = 400, description = "Invalid body or parent_id"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Material or parent comment not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "comments"
)]
pub async fn add_reply(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(material_id): Path<i32>,
    FormOrJson(form): FormOrJson<CommentForm>,
) -> Result<Json<CommentPosted>, AppError> {
    let parent_id = parse_parent_id(form.parent_id.as_ref())?;
    let body = form.body.unwrap_or_default();
    let posted = CommentService::add_reply(
        &state.db,
        &user,
        material_id,
        &body,
        parent_id,
        state.config.comment_max_chars,
    )
    .await?;
    Ok(Json(posted))
}

#[utoipa::path(
    post,
    path = "/comment/{id}/delete",
    params(
        ("id" = i32, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Comment deleted", body = CommentDeleted),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Neither the author nor staff"),
        (status = 404, description = "Comment not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(comment_id): Path<i32>,
) -> Result<Json<CommentDeleted>, AppError> {
    let deleted = CommentService::delete_comment(&state.db, &user, comment_id).await?;
    Ok(Json(deleted))
}

#[utoipa::path(
    get,
    path = "/materials/{id}/comments",
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Threaded comments, newest first", body = CommentThread),
        (status = 404, description = "Material not found")
    ),
    tag = "comments"
)]
pub async fn list_comments(
    State(state): State<crate::AppState>,
    Path(material_id): Path<i32>,
) -> Result<Json<CommentThread>, AppError> {
    Ok(Json(CommentService::list_thread(&state.db, material_id).await?))
}
