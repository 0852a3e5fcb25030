use crate::api::error::AppError;
use crate::services::votes::{VoteService, VoteState, VoteTally};
use crate::utils::auth::CurrentUser;
use axum::{
    Extension, Json,
    extract::{Path, State},
};

#[utoipa::path(
    post,
    path = "/materials/{id}/upvote",
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Vote toggled", body = VoteTally),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Material not found"),
        (status = 405, description = "Only POST is allowed")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "votes"
)]
pub async fn upvote(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(material_id): Path<i32>,
) -> Result<Json<VoteTally>, AppError> {
    let tally = VoteService::set_vote(&state.db, &user.id, material_id, VoteState::Up).await?;
    Ok(Json(tally))
}

#[utoipa::path(
    post,
    path = "/materials/{id}/downvote",
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Vote toggled", body = VoteTally),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Material not found"),
        (status = 405, description = "Only POST is allowed")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "votes"
)]
pub async fn downvote(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(material_id): Path<i32>,
) -> Result<Json<VoteTally>, AppError> {
    let tally = VoteService::set_vote(&state.db, &user.id, material_id, VoteState::Down).await?;
    Ok(Json(tally))
}
