use crate::api::error::AppError;
use crate::config::AppConfig;
use crate::entities::{materials, prelude::*};
use crate::services::catalog::{CatalogService, MaterialDetail};
use crate::services::lookups::{LookupKind, LookupService};
use crate::services::storage::{FileReader, StorageService};
use crate::utils::auth::CurrentUser;
use crate::utils::validation::{
    FieldErrors, REQUIRED, bounded_text, sanitize_filename, validate_extension, validate_file_size,
};
use chrono::{Datelike, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

pub const TITLE_MAX_CHARS: usize = 200;
const INVALID_CHOICE: &str = "Select a valid choice.";

/// Raw text fields of the upload form, as received.
#[derive(Debug, Clone, Default)]
pub struct MaterialForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub semester: Option<String>,
    pub university: Option<String>,
}

/// A file already written to storage, waiting for its material row.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub key: String,
    pub file_name: String,
    pub size: i64,
    pub hash: String,
}

pub struct MaterialService {
    db: DatabaseConnection,
    storage: Arc<dyn StorageService>,
    config: AppConfig,
}

impl MaterialService {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn StorageService>, config: AppConfig) -> Self {
        Self {
            db,
            storage,
            config,
        }
    }

    /// Streams an uploaded file into storage. Rejects disallowed extensions
    /// before reading, and anything over the size limit after.
    pub async fn store_upload<'a>(
        &self,
        original_name: &str,
        reader: impl AsyncRead + Unpin + Send + 'a,
    ) -> Result<StoredUpload, AppError> {
        let file_name = sanitize_filename(original_name).map_err(|e| AppError::field("file", e.message))?;
        validate_extension(&file_name, &self.config.allowed_extensions)
            .map_err(|e| AppError::field("file", e.message))?;

        let now = Utc::now();
        let key = format!(
            "materials/{:04}/{:02}/{}_{}",
            now.year(),
            now.month(),
            Uuid::new_v4().simple(),
            file_name
        );

        // One byte past the limit is enough to know it is too big
        let limit = self.config.max_file_size as u64 + 1;
        let stored = match self
            .storage
            .put_stream_with_hash(&key, Box::pin(reader.take(limit)))
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                self.discard(&key).await;
                return Err(e.into());
            }
        };

        if let Err(e) = validate_file_size(stored.size as usize, self.config.max_file_size) {
            self.discard(&key).await;
            return Err(AppError::PayloadTooLarge(e.message));
        }
        if stored.size == 0 {
            self.discard(&key).await;
            return Err(AppError::field("file", "The submitted file is empty."));
        }

        tracing::debug!("📥 Stored upload {} ({} bytes)", key, stored.size);

        Ok(StoredUpload {
            key: stored.key,
            file_name,
            size: stored.size,
            hash: stored.hash,
        })
    }

    /// Validates the form and records the material. On any failure the
    /// stored file is removed again.
    pub async fn create(
        &self,
        uploader: &CurrentUser,
        form: MaterialForm,
        upload: Option<StoredUpload>,
        mut errors: FieldErrors,
    ) -> Result<MaterialDetail, AppError> {
        let result = self.insert(uploader, form, upload.as_ref(), &mut errors).await;
        if result.is_err() {
            if let Some(upload) = &upload {
                self.discard(&upload.key).await;
            }
        }
        result
    }

    async fn insert(
        &self,
        uploader: &CurrentUser,
        form: MaterialForm,
        upload: Option<&StoredUpload>,
        errors: &mut FieldErrors,
    ) -> Result<MaterialDetail, AppError> {
        let title = match bounded_text(form.title.as_deref().unwrap_or(""), TITLE_MAX_CHARS) {
            Ok(title) => title,
            Err(e) => {
                errors.add("title", e.message);
                String::new()
            }
        };
        let description = form.description.unwrap_or_default().trim().to_string();

        let category = self
            .choice(errors, "category", form.category.as_deref(), LookupKind::Category, true)
            .await?;
        let department = self
            .choice(errors, "department", form.department.as_deref(), LookupKind::Department, true)
            .await?;
        let semester = self
            .choice(errors, "semester", form.semester.as_deref(), LookupKind::Semester, true)
            .await?;
        let university = self
            .choice(errors, "university", form.university.as_deref(), LookupKind::University, false)
            .await?;

        if upload.is_none() && !errors.contains("file") {
            errors.add("file", REQUIRED);
        }

        std::mem::take(errors).into_result()?;

        let (Some(upload), Some(category_id), Some(department_id), Some(semester_id)) =
            (upload, category, department, semester)
        else {
            return Err(AppError::Internal("validated upload is incomplete".to_string()));
        };

        let now = Utc::now();
        let material = materials::ActiveModel {
            uploader_id: Set(uploader.id.clone()),
            title: Set(title),
            description: Set(description),
            category_id: Set(category_id),
            department_id: Set(department_id),
            semester_id: Set(semester_id),
            university_id: Set(university),
            file_key: Set(upload.key.clone()),
            file_name: Set(upload.file_name.clone()),
            file_size: Set(upload.size),
            file_hash: Set(upload.hash.clone()),
            download_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        tracing::info!(
            "📚 Material #{} '{}' uploaded by {}",
            material.id,
            material.title,
            uploader.username
        );

        CatalogService::detail(&self.db, material.id, Some(&uploader.id)).await
    }

    /// Resolves a lookup id field. Blank optional fields resolve to `None`.
    async fn choice(
        &self,
        errors: &mut FieldErrors,
        field: &str,
        raw: Option<&str>,
        kind: LookupKind,
        required: bool,
    ) -> Result<Option<i32>, AppError> {
        let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            if required {
                errors.add(field, REQUIRED);
            }
            return Ok(None);
        };

        if let Ok(id) = raw.parse::<i32>() {
            if LookupService::exists(&self.db, kind, id).await? {
                return Ok(Some(id));
            }
        }
        errors.add(field, INVALID_CHOICE);
        Ok(None)
    }

    /// Opens a material's file for download and counts the download.
    ///
    /// Nothing is counted when the record or its stored file is missing.
    pub async fn download(&self, material_id: i32) -> Result<(materials::Model, FileReader), AppError> {
        let material = Materials::find_by_id(material_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Material not found".to_string()))?;

        if !self.storage.file_exists(&material.file_key).await? {
            tracing::warn!(
                "⚠️  File for material {} missing from storage: {}",
                material.id,
                material.file_key
            );
            return Err(AppError::NotFound("File not found".to_string()));
        }

        let reader = self.storage.open_read(&material.file_key).await?;
        record_download(&self.db, material.id).await?;

        Ok((material, reader))
    }

    /// Best-effort removal of a stored file that will not be kept.
    pub async fn discard(&self, key: &str) {
        if let Err(e) = self.storage.delete_file(key).await {
            tracing::warn!("Failed to remove rejected upload {}: {}", key, e);
        }
    }
}

/// `download_count = download_count + 1` as a single statement.
pub async fn record_download(db: &DatabaseConnection, material_id: i32) -> Result<(), AppError> {
    Materials::update_many()
        .col_expr(
            materials::Column::DownloadCount,
            Expr::col(materials::Column::DownloadCount).add(1),
        )
        .filter(materials::Column::Id.eq(material_id))
        .exec(db)
        .await?;
    Ok(())
}
