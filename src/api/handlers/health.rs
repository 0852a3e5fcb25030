use crate::AppState;
use crate::config::StorageBackend;
use crate::entities::prelude::Materials;
use axum::{Json, extract::State, http::StatusCode};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok", or "degraded" when a dependency is unreachable
    pub status: String,
    pub database: String,
    pub storage: String,
    pub storage_backend: String,
    /// Number of materials in the catalog; absent when the database is down
    pub materials: Option<u64>,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database and storage reachable", body = HealthResponse),
        (status = 503, description = "A dependency is unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let materials = Materials::find().count(&state.db).await.ok();

    // A missing key is a successful round trip; only transport errors count
    let storage_ok = state.storage.file_exists("health-check").await.is_ok();

    let healthy = materials.is_some() && storage_ok;
    let label = |ok: bool| if ok { "connected" } else { "disconnected" }.to_string();

    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        database: label(materials.is_some()),
        storage: label(storage_ok),
        storage_backend: match state.config.storage_backend {
            StorageBackend::Local => "local",
            StorageBackend::S3 => "s3",
        }
        .to_string(),
        materials,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    if !healthy {
        tracing::warn!("🩺 Health check degraded: db={} storage={}", body.database, body.storage);
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
