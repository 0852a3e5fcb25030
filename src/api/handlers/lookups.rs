use crate::api::error::AppError;
use crate::services::lookups::{LookupKind, LookupService, LookupView, UniversityStat};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::ToSchema;

/// Number of universities shown by the ranking endpoint.
pub const TOP_UNIVERSITIES: u64 = 12;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateLookupRequest {
    pub name: String,
    /// Derived from the name when omitted
    pub slug: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RenameLookupRequest {
    pub name: String,
}

#[utoipa::path(
    get,
    path = "/lookups/{kind}",
    params(
        ("kind" = String, Path, description = "categories, departments, semesters or universities")
    ),
    responses(
        (status = 200, description = "All values ordered by name", body = [LookupView]),
        (status = 404, description = "Unknown kind")
    ),
    tag = "lookups"
)]
pub async fn list_lookups(
    State(state): State<crate::AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<LookupView>>, AppError> {
    let kind: LookupKind = kind.parse()?;
    Ok(Json(LookupService::list(&state.db, kind).await?))
}

#[utoipa::path(
    post,
    path = "/lookups/{kind}",
    params(
        ("kind" = String, Path, description = "categories, departments, semesters or universities")
    ),
    request_body = CreateLookupRequest,
    responses(
        (status = 201, description = "Created", body = LookupView),
        (status = 400, description = "Invalid name or slug"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff only"),
        (status = 409, description = "Name or slug already used")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "lookups"
)]
pub async fn create_lookup(
    State(state): State<crate::AppState>,
    Path(kind): Path<String>,
    Json(req): Json<CreateLookupRequest>,
) -> Result<(StatusCode, Json<LookupView>), AppError> {
    let kind: LookupKind = kind.parse()?;
    let created = LookupService::create(&state.db, kind, &req.name, req.slug.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/lookups/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "categories, departments, semesters or universities"),
        ("id" = i32, Path, description = "Value ID")
    ),
    request_body = RenameLookupRequest,
    responses(
        (status = 200, description = "Renamed; the slug is unchanged", body = LookupView),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Name already used")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "lookups"
)]
pub async fn rename_lookup(
    State(state): State<crate::AppState>,
    Path((kind, id)): Path<(String, i32)>,
    Json(req): Json<RenameLookupRequest>,
) -> Result<Json<LookupView>, AppError> {
    let kind: LookupKind = kind.parse()?;
    Ok(Json(LookupService::rename(&state.db, kind, id, &req.name).await?))
}

#[utoipa::path(
    delete,
    path = "/lookups/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "categories, departments, semesters or universities"),
        ("id" = i32, Path, description = "Value ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Still referenced by materials")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "lookups"
)]
pub async fn delete_lookup(
    State(state): State<crate::AppState>,
    Path((kind, id)): Path<(String, i32)>,
) -> Result<StatusCode, AppError> {
    let kind: LookupKind = kind.parse()?;
    LookupService::delete(&state.db, kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/universities",
    responses(
        (status = 200, description = "All universities ordered by name", body = [LookupView])
    ),
    tag = "lookups"
)]
pub async fn list_universities(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<LookupView>>, AppError> {
    Ok(Json(
        LookupService::list(&state.db, LookupKind::University).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/universities/top",
    responses(
        (status = 200, description = "Universities with the most materials", body = [UniversityStat])
    ),
    tag = "lookups"
)]
pub async fn top_universities(
    State(state): State<crate::AppState>,
) -> Result<Json<Vec<UniversityStat>>, AppError> {
    Ok(Json(
        LookupService::top_universities(&state.db, TOP_UNIVERSITIES).await?,
    ))
}
