use crate::api::error::AppError;
use crate::entities::{comments, downvotes, materials, prelude::*, upvotes, users};
use crate::services::lookups::{LookupKind, LookupService};
use crate::services::votes::{VoteService, VoteState};
use crate::utils::validation::{FieldErrors, FileKind, escape_like};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    sea_query::{Expr, Func, LikeExpr},
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

/// Parsed catalog filters. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowseFilters {
    pub q: Option<String>,
    pub category: Option<i32>,
    pub department: Option<i32>,
    pub semester: Option<i32>,
    pub university: Option<i32>,
}

impl BrowseFilters {
    /// Parses raw query values. Blank values are ignored; ids that are not
    /// integers are reported per field.
    pub fn parse(
        q: Option<&str>,
        category: Option<&str>,
        department: Option<&str>,
        semester: Option<&str>,
        university: Option<&str>,
    ) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut id = |field: &str, raw: Option<&str>| -> Option<i32> {
            let raw = raw.map(str::trim).filter(|v| !v.is_empty())?;
            match raw.parse::<i32>() {
                Ok(v) => Some(v),
                Err(_) => {
                    errors.add(field, "Select a valid choice.");
                    None
                }
            }
        };

        let filters = Self {
            q: q.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
            category: id("category", category),
            department: id("department", department),
            semester: id("semester", semester),
            university: id("university", university),
        };

        errors.into_result()?;
        Ok(filters)
    }

    fn condition(&self) -> Condition {
        let mut cond = Condition::all();

        if let Some(q) = &self.q {
            let pattern = format!("%{}%", escape_like(&q.to_lowercase()));
            let contains = |col: materials::Column| {
                Expr::expr(Func::lower(Expr::col((materials::Entity, col))))
                    .like(LikeExpr::new(pattern.clone()).escape('\\'))
            };
            cond = cond.add(
                Condition::any()
                    .add(contains(materials::Column::Title))
                    .add(contains(materials::Column::Description)),
            );
        }
        if let Some(id) = self.category {
            cond = cond.add(materials::Column::CategoryId.eq(id));
        }
        if let Some(id) = self.department {
            cond = cond.add(materials::Column::DepartmentId.eq(id));
        }
        if let Some(id) = self.semester {
            cond = cond.add(materials::Column::SemesterId.eq(id));
        }
        if let Some(id) = self.university {
            cond = cond.add(materials::Column::UniversityId.eq(id));
        }

        cond
    }
}

/// Parses a raw `page` value: anything that is not a positive integer is page 1.
pub fn parse_page(raw: Option<&str>) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

/// Clamps a 1-indexed page into `1..=num_pages`.
pub fn clamp_page(requested: u64, num_pages: u64) -> u64 {
    requested.clamp(1, num_pages.max(1))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LookupRef {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaterialSummary {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub uploader: String,
    pub category: Option<LookupRef>,
    pub department: Option<LookupRef>,
    pub semester: Option<LookupRef>,
    pub university: Option<LookupRef>,
    pub file_name: String,
    pub file_size: i64,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaterialPage {
    pub items: Vec<MaterialSummary>,
    pub page: u64,
    pub num_pages: u64,
    pub total: u64,
    pub page_size: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaterialDetail {
    #[serde(flatten)]
    pub material: MaterialSummary,
    pub file_type: FileKind,
    pub file_hash: String,
    pub total_upvotes: u64,
    pub total_downvotes: u64,
    pub comment_count: u64,
    /// Present when the caller is authenticated.
    pub your_vote: Option<VoteState>,
}

pub struct CatalogService;

impl CatalogService {
    /// Filtered, newest-first, paginated view of all materials.
    pub async fn browse<C: ConnectionTrait>(
        db: &C,
        filters: &BrowseFilters,
        page: u64,
        page_size: u64,
    ) -> Result<MaterialPage, AppError> {
        let page_size = page_size.max(1);
        let paginator = Materials::find()
            .filter(filters.condition())
            .order_by_desc(materials::Column::CreatedAt)
            .order_by_desc(materials::Column::Id)
            .paginate(db, page_size);

        let totals = paginator.num_items_and_pages().await?;
        let num_pages = totals.number_of_pages.max(1);
        let page = clamp_page(page, num_pages);

        let models = paginator.fetch_page(page - 1).await?;
        let items = Self::summarize(db, models).await?;

        Ok(MaterialPage {
            items,
            page,
            num_pages,
            total: totals.number_of_items,
            page_size,
            has_next: page < num_pages,
            has_previous: page > 1,
        })
    }

    pub async fn detail<C: ConnectionTrait>(
        db: &C,
        material_id: i32,
        viewer_id: Option<&str>,
    ) -> Result<MaterialDetail, AppError> {
        let material = Materials::find_by_id(material_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Material not found".to_string()))?;

        let file_type = FileKind::from_filename(&material.file_name);
        let file_hash = material.file_hash.clone();

        let total_upvotes = Upvotes::find()
            .filter(upvotes::Column::MaterialId.eq(material_id))
            .count(db)
            .await?;
        let total_downvotes = Downvotes::find()
            .filter(downvotes::Column::MaterialId.eq(material_id))
            .count(db)
            .await?;
        let comment_count = Comments::find()
            .filter(comments::Column::MaterialId.eq(material_id))
            .count(db)
            .await?;

        let your_vote = match viewer_id {
            Some(user_id) => Some(VoteService::vote_state(db, user_id, material_id).await?),
            None => None,
        };

        let summary = Self::summarize(db, vec![material])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("summary missing".to_string()))?;

        Ok(MaterialDetail {
            material: summary,
            file_type,
            file_hash,
            total_upvotes,
            total_downvotes,
            comment_count,
            your_vote,
        })
    }

    /// Attaches lookup names and uploader usernames, loading each table once.
    pub async fn summarize<C: ConnectionTrait>(
        db: &C,
        models: Vec<materials::Model>,
    ) -> Result<Vec<MaterialSummary>, AppError> {
        let categories =
            LookupService::names(db, LookupKind::Category, models.iter().map(|m| m.category_id)).await?;
        let departments =
            LookupService::names(db, LookupKind::Department, models.iter().map(|m| m.department_id))
                .await?;
        let semesters =
            LookupService::names(db, LookupKind::Semester, models.iter().map(|m| m.semester_id)).await?;
        let universities = LookupService::names(
            db,
            LookupKind::University,
            models.iter().filter_map(|m| m.university_id),
        )
        .await?;

        let uploader_ids: Vec<String> = models
            .iter()
            .map(|m| m.uploader_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let uploaders: HashMap<String, String> = if uploader_ids.is_empty() {
            HashMap::new()
        } else {
            Users::find()
                .filter(users::Column::Id.is_in(uploader_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|u| (u.id, u.username))
                .collect()
        };

        let lookup_ref = |map: &HashMap<i32, String>, id: i32| {
            map.get(&id).map(|name| LookupRef {
                id,
                name: name.clone(),
            })
        };

        Ok(models
            .into_iter()
            .map(|m| MaterialSummary {
                category: lookup_ref(&categories, m.category_id),
                department: lookup_ref(&departments, m.department_id),
                semester: lookup_ref(&semesters, m.semester_id),
                university: m.university_id.and_then(|id| lookup_ref(&universities, id)),
                uploader: uploaders.get(&m.uploader_id).cloned().unwrap_or_default(),
                id: m.id,
                title: m.title,
                description: m.description,
                file_name: m.file_name,
                file_size: m.file_size,
                download_count: m.download_count,
                created_at: m.created_at,
                updated_at: m.updated_at,
            })
            .collect())
    }
}
