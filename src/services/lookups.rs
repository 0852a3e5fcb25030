//! Classification values attached to materials: categories, departments,
//! semesters/years and universities. All four share one shape (`name`, `slug`,
//! timestamps), so every operation here is written once and dispatched to the
//! concrete entity by [`LookupKind`].

use crate::api::error::AppError;
use crate::entities::{materials, prelude::*, universities};
use crate::utils::validation::{FieldErrors, bounded_text, slugify};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    Category,
    Department,
    Semester,
    University,
}

impl LookupKind {
    pub const ALL: [LookupKind; 4] = [
        LookupKind::Category,
        LookupKind::Department,
        LookupKind::Semester,
        LookupKind::University,
    ];

    pub fn max_name_len(self) -> usize {
        match self {
            LookupKind::Category => 80,
            LookupKind::Department => 120,
            LookupKind::Semester => 80,
            LookupKind::University => 150,
        }
    }

    pub fn max_slug_len(self) -> usize {
        match self {
            LookupKind::Category => 100,
            LookupKind::Department => 140,
            LookupKind::Semester => 100,
            LookupKind::University => 180,
        }
    }

    /// URL segment used by the lookup routes.
    pub fn segment(self) -> &'static str {
        match self {
            LookupKind::Category => "categories",
            LookupKind::Department => "departments",
            LookupKind::Semester => "semesters",
            LookupKind::University => "universities",
        }
    }

    fn label(self) -> &'static str {
        match self {
            LookupKind::Category => "Category",
            LookupKind::Department => "Department",
            LookupKind::Semester => "Semester / Year",
            LookupKind::University => "University",
        }
    }

    fn material_column(self) -> materials::Column {
        match self {
            LookupKind::Category => materials::Column::CategoryId,
            LookupKind::Department => materials::Column::DepartmentId,
            LookupKind::Semester => materials::Column::SemesterId,
            LookupKind::University => materials::Column::UniversityId,
        }
    }
}

impl FromStr for LookupKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LookupKind::ALL
            .into_iter()
            .find(|k| k.segment() == s)
            .ok_or_else(|| AppError::NotFound(format!("Unknown lookup kind '{}'", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LookupView {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromQueryResult, ToSchema)]
pub struct UniversityStat {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub num_materials: i64,
}

/// Runs `$body` with `$m` bound to the entity module for `$kind`.
macro_rules! with_lookup {
    ($kind:expr, $m:ident => $body:expr) => {
        match $kind {
            LookupKind::Category => {
                use crate::entities::categories as $m;
                $body
            }
            LookupKind::Department => {
                use crate::entities::departments as $m;
                $body
            }
            LookupKind::Semester => {
                use crate::entities::semester_years as $m;
                $body
            }
            LookupKind::University => {
                use crate::entities::universities as $m;
                $body
            }
        }
    };
}

macro_rules! view {
    ($model:expr) => {{
        let m = $model;
        LookupView {
            id: m.id,
            name: m.name,
            slug: m.slug,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }};
}

/// Write-path normalization: trims the name and derives the slug from it when
/// none was given. A provided slug is kept as is.
pub fn normalize_lookup(
    kind: LookupKind,
    name: &str,
    slug: Option<&str>,
) -> Result<(String, String), FieldErrors> {
    let mut errors = FieldErrors::new();

    let name = match bounded_text(name, kind.max_name_len()) {
        Ok(name) => name,
        Err(e) => {
            errors.add("name", e.message);
            String::new()
        }
    };

    let slug = match slug.map(str::trim).filter(|s| !s.is_empty()) {
        Some(given) => given.to_string(),
        None => slugify(&name),
    };

    if !name.is_empty() {
        if slug.is_empty() {
            errors.add(
                "slug",
                "Could not derive a slug from this name; provide one explicitly.",
            );
        } else if slug.chars().count() > kind.max_slug_len() {
            errors.add(
                "slug",
                format!(
                    "Ensure this value has at most {} characters.",
                    kind.max_slug_len()
                ),
            );
        } else if slug != slugify(&slug) {
            errors.add(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        }
    }

    errors.into_result()?;
    Ok((name, slug))
}

pub struct LookupService;

impl LookupService {
    pub async fn list<C: ConnectionTrait>(
        db: &C,
        kind: LookupKind,
    ) -> Result<Vec<LookupView>, AppError> {
        let items: Vec<LookupView> = with_lookup!(kind, m => {
            m::Entity::find()
                .order_by_asc(m::Column::Name)
                .all(db)
                .await?
                .into_iter()
                .map(|model| view!(model))
                .collect()
        });
        Ok(items)
    }

    pub async fn get<C: ConnectionTrait>(
        db: &C,
        kind: LookupKind,
        id: i32,
    ) -> Result<Option<LookupView>, AppError> {
        let item = with_lookup!(kind, m => {
            m::Entity::find_by_id(id).one(db).await?.map(|model| view!(model))
        });
        Ok(item)
    }

    /// Names of the given ids in one query. Unknown ids are left out.
    pub async fn names<C: ConnectionTrait>(
        db: &C,
        kind: LookupKind,
        ids: impl IntoIterator<Item = i32>,
    ) -> Result<HashMap<i32, String>, AppError> {
        let ids: Vec<i32> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let names: HashMap<i32, String> = with_lookup!(kind, m => {
            m::Entity::find()
                .filter(m::Column::Id.is_in(ids))
                .all(db)
                .await?
                .into_iter()
                .map(|model| (model.id, model.name))
                .collect()
        });
        Ok(names)
    }

    pub async fn exists<C: ConnectionTrait>(
        db: &C,
        kind: LookupKind,
        id: i32,
    ) -> Result<bool, AppError> {
        Ok(Self::get(db, kind, id).await?.is_some())
    }

    /// Creates a lookup value; name and slug must both be unused.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        kind: LookupKind,
        name: &str,
        slug: Option<&str>,
    ) -> Result<LookupView, AppError> {
        let (name, slug) = normalize_lookup(kind, name, slug)?;
        let now = Utc::now();

        let created = with_lookup!(kind, m => {
            let taken = m::Entity::find()
                .filter(
                    sea_orm::Condition::any()
                        .add(m::Column::Name.eq(&name))
                        .add(m::Column::Slug.eq(&slug)),
                )
                .one(db)
                .await?;
            if let Some(existing) = taken {
                return Err(AppError::Conflict(if existing.name == name {
                    format!("{} with this name already exists.", kind.label())
                } else {
                    format!("{} with this slug already exists.", kind.label())
                }));
            }

            let model = m::ActiveModel {
                name: Set(name),
                slug: Set(slug),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
            view!(model)
        });

        tracing::info!("🏷️  Created {} '{}' ({})", kind.segment(), created.name, created.slug);
        Ok(created)
    }

    /// Looks a value up by name, creating it when missing. An existing row
    /// with an empty slug gets one derived from its name.
    pub async fn get_or_create<C: ConnectionTrait>(
        db: &C,
        kind: LookupKind,
        name: &str,
    ) -> Result<(LookupView, bool), AppError> {
        let found = with_lookup!(kind, m => {
            match m::Entity::find()
                .filter(m::Column::Name.eq(name.trim()))
                .one(db)
                .await?
            {
                Some(model) if model.slug.is_empty() => {
                    let slug = slugify(&model.name);
                    let mut active: m::ActiveModel = model.into();
                    active.slug = Set(slug);
                    active.updated_at = Set(Utc::now());
                    Some(view!(active.update(db).await?))
                }
                Some(model) => Some(view!(model)),
                None => None,
            }
        });

        match found {
            Some(view) => Ok((view, false)),
            None => Ok((Self::create(db, kind, name, None).await?, true)),
        }
    }

    /// Renames a value. The slug stays what it was.
    pub async fn rename<C: ConnectionTrait>(
        db: &C,
        kind: LookupKind,
        id: i32,
        name: &str,
    ) -> Result<LookupView, AppError> {
        let name = bounded_text(name, kind.max_name_len())
            .map_err(|e| AppError::field("name", e.message))?;

        let updated = with_lookup!(kind, m => {
            let model = m::Entity::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("{} not found", kind.label())))?;

            let clash = m::Entity::find()
                .filter(m::Column::Name.eq(&name))
                .filter(m::Column::Id.ne(id))
                .one(db)
                .await?;
            if clash.is_some() {
                return Err(AppError::Conflict(format!(
                    "{} with this name already exists.",
                    kind.label()
                )));
            }

            let mut active: m::ActiveModel = model.into();
            active.name = Set(name);
            active.updated_at = Set(Utc::now());
            view!(active.update(db).await?)
        });

        Ok(updated)
    }

    /// Deletes a value that no material references.
    pub async fn delete<C: ConnectionTrait>(
        db: &C,
        kind: LookupKind,
        id: i32,
    ) -> Result<(), AppError> {
        if !Self::exists(db, kind, id).await? {
            return Err(AppError::NotFound(format!("{} not found", kind.label())));
        }

        let in_use = Materials::find()
            .filter(kind.material_column().eq(id))
            .count(db)
            .await?;
        if in_use > 0 {
            return Err(AppError::Conflict(format!(
                "Cannot delete this {} because {} material(s) still reference it.",
                kind.label().to_lowercase(),
                in_use
            )));
        }

        with_lookup!(kind, m => {
            m::Entity::delete_by_id(id).exec(db).await?;
        });

        tracing::info!("🗑️  Deleted {} #{}", kind.segment(), id);
        Ok(())
    }

    /// Universities ranked by how many materials they have, ties by name.
    pub async fn top_universities<C: ConnectionTrait>(
        db: &C,
        limit: u64,
    ) -> Result<Vec<UniversityStat>, AppError> {
        let count = Expr::col((materials::Entity, materials::Column::Id)).count();

        let stats = Universities::find()
            .select_only()
            .column(universities::Column::Id)
            .column(universities::Column::Name)
            .column(universities::Column::Slug)
            .column_as(count.clone(), "num_materials")
            .join(JoinType::LeftJoin, universities::Relation::Materials.def())
            .group_by(universities::Column::Id)
            .group_by(universities::Column::Name)
            .group_by(universities::Column::Slug)
            .order_by_desc(count)
            .order_by_asc(universities::Column::Name)
            .limit(limit)
            .into_model::<UniversityStat>()
            .all(db)
            .await?;

        Ok(stats)
    }
}
