use crate::api::error::{AppError, body_limit_exceeded};
use crate::services::catalog::{
    BrowseFilters, CatalogService, MaterialDetail, MaterialPage, parse_page,
};
use crate::services::material_service::{MaterialForm, MaterialService, StoredUpload};
use crate::utils::auth::CurrentUser;
use crate::utils::validation::{FieldErrors, content_type_for};
use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tokio_util::io::{ReaderStream, StreamReader};
use utoipa::IntoParams;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct BrowseQuery {
    /// Case-insensitive text searched in title and description
    pub q: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub semester: Option<String>,
    pub university: Option<String>,
    /// 1-indexed; out of range values are clamped
    pub page: Option<String>,
}

#[utoipa::path(
    get,
    path = "/materials/browse",
    params(BrowseQuery),
    responses(
        (status = 200, description = "One page of matching materials, newest first", body = MaterialPage),
        (status = 400, description = "A filter id is not a number")
    ),
    tag = "materials"
)]
pub async fn browse(
    State(state): State<crate::AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<MaterialPage>, AppError> {
    let filters = BrowseFilters::parse(
        query.q.as_deref(),
        query.category.as_deref(),
        query.department.as_deref(),
        query.semester.as_deref(),
        query.university.as_deref(),
    )?;
    let page = parse_page(query.page.as_deref());

    let result = CatalogService::browse(&state.db, &filters, page, state.config.page_size).await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/materials/{id}",
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Material details", body = MaterialDetail),
        (status = 404, description = "Material not found")
    ),
    tag = "materials"
)]
pub async fn material_detail(
    State(state): State<crate::AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(material_id): Path<i32>,
) -> Result<Json<MaterialDetail>, AppError> {
    let viewer = user.as_ref().map(|Extension(u)| u.id.as_str());
    let detail = CatalogService::detail(&state.db, material_id, viewer).await?;
    Ok(Json(detail))
}

fn material_service(state: &crate::AppState) -> MaterialService {
    MaterialService::new(state.db.clone(), state.storage.clone(), state.config.clone())
}

/// `attachment` disposition with an ASCII fallback name and, when the real
/// name is not plain ASCII, its UTF-8 form.
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && *c != '"' && *c != '\\' && *c != ';')
        .collect();
    let fallback = if ascii.trim().is_empty() { "download" } else { ascii.trim() };

    if ascii == file_name {
        format!("attachment; filename=\"{}\"", fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            utf8_percent_encode(file_name, NON_ALPHANUMERIC)
        )
    }
}

#[utoipa::path(
    get,
    path = "/materials/{id}/download",
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "File stream; the download is counted"),
        (status = 404, description = "Material or its file not found")
    ),
    tag = "materials"
)]
pub async fn download(
    State(state): State<crate::AppState>,
    Path(material_id): Path<i32>,
) -> Result<Response, AppError> {
    let (material, reader) = material_service(&state).download(material_id).await?;

    let response = (
        [
            (
                header::CONTENT_TYPE,
                content_type_for(&material.file_name),
            ),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&material.file_name),
            ),
        ],
        Body::from_stream(ReaderStream::new(reader)),
    )
        .into_response();

    Ok(response)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(e.body_text())
    }
}

/// Reads the multipart body, streaming `file` straight into storage.
/// On failure nothing is left behind in storage.
async fn read_upload(
    service: &MaterialService,
    multipart: &mut Multipart,
) -> Result<(MaterialForm, Option<StoredUpload>, FieldErrors), AppError> {
    let mut form = MaterialForm::default();
    let mut upload: Option<StoredUpload> = None;
    let mut errors = FieldErrors::new();

    let result: Result<(), AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let reader = StreamReader::new(field.map_err(std::io::Error::other));

                match service.store_upload(&original_name, reader).await {
                    Ok(stored) => {
                        if let Some(previous) = upload.replace(stored) {
                            service.discard(&previous.key).await;
                        }
                    }
                    Err(AppError::Validation(e)) => errors.merge(e),
                    Err(AppError::Anyhow(e)) if body_limit_exceeded(&e) => {
                        return Err(AppError::PayloadTooLarge(
                            "Request body exceeds the maximum allowed limit".to_string(),
                        ));
                    }
                    Err(e) => return Err(e),
                }
                continue;
            }

            let slot = match name.as_str() {
                "title" => &mut form.title,
                "description" => &mut form.description,
                "category" => &mut form.category,
                "department" => &mut form.department,
                "semester" => &mut form.semester,
                "university" => &mut form.university,
                _ => continue,
            };
            *slot = Some(field.text().await.map_err(multipart_error)?);
        }
        Ok(())
    }
    .await;

    match result {
        Ok(()) => Ok((form, upload, errors)),
        Err(e) => {
            if let Some(stored) = &upload {
                service.discard(&stored.key).await;
            }
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/materials/upload",
    request_body(content = Object, description = "title, description, category, department, semester, university (optional), file", content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Material created", body = MaterialDetail),
        (status = 400, description = "Invalid form fields"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "File too large")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "materials"
)]
pub async fn upload(
    State(state): State<crate::AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MaterialDetail>), AppError> {
    let service = material_service(&state);
    let (form, stored, errors) = read_upload(&service, &mut multipart).await?;
    let detail = service.create(&user, form, stored, errors).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}
