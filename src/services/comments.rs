use crate::api::error::AppError;
use crate::entities::{comments, prelude::*};
use crate::utils::auth::CurrentUser;
use crate::utils::validation::bounded_text;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait, sea_query::Expr,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CommentView {
    pub id: i32,
    pub material_id: i32,
    pub user: String,
    pub body: String,
    pub parent_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A comment together with its replies, newest first at every level.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: CommentView,
    pub replies: Vec<CommentNode>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentPosted {
    pub ok: bool,
    pub comment: CommentView,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentDeleted {
    pub ok: bool,
    pub deleted_id: i32,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommentThread {
    pub count: u64,
    pub comments: Vec<CommentNode>,
}

/// Assembles a flat newest-first list into a forest. Comments whose parent is
/// not in the list become roots. Input order is kept among siblings.
pub fn build_thread(comments: Vec<CommentView>) -> Vec<CommentNode> {
    let mut children: HashMap<i32, Vec<CommentView>> = HashMap::new();
    let mut roots = Vec::new();
    let known: HashSet<i32> = comments.iter().map(|c| c.id).collect();

    for comment in comments {
        match comment.parent_id {
            Some(parent) if known.contains(&parent) => {
                children.entry(parent).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }

    fn attach(comment: CommentView, children: &mut HashMap<i32, Vec<CommentView>>) -> CommentNode {
        let replies = children
            .remove(&comment.id)
            .unwrap_or_default()
            .into_iter()
            .map(|child| attach(child, children))
            .collect();
        CommentNode { comment, replies }
    }

    roots
        .into_iter()
        .map(|root| attach(root, &mut children))
        .collect()
}

pub struct CommentService;

impl CommentService {
    pub async fn count<C: ConnectionTrait>(db: &C, material_id: i32) -> Result<u64, AppError> {
        Ok(Comments::find()
            .filter(comments::Column::MaterialId.eq(material_id))
            .count(db)
            .await?)
    }

    /// Top-level comment on a material.
    pub async fn add_comment(
        db: &DatabaseConnection,
        user: &CurrentUser,
        material_id: i32,
        body: &str,
        max_chars: usize,
    ) -> Result<CommentPosted, AppError> {
        let body = bounded_text(body, max_chars).map_err(|e| AppError::field("body", e.message))?;
        Self::ensure_material(db, material_id).await?;
        Self::insert(db, user, material_id, body, None).await
    }

    /// Reply to `parent_id`, which must be a comment on the same material.
    pub async fn add_reply(
        db: &DatabaseConnection,
        user: &CurrentUser,
        material_id: i32,
        body: &str,
        parent_id: i32,
        max_chars: usize,
    ) -> Result<CommentPosted, AppError> {
        let body = bounded_text(body, max_chars).map_err(|e| AppError::field("body", e.message))?;
        Self::ensure_material(db, material_id).await?;

        Comments::find_by_id(parent_id)
            .filter(comments::Column::MaterialId.eq(material_id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

        Self::insert(db, user, material_id, body, Some(parent_id)).await
    }

    /// Removes a comment. Only its author or staff may do this. Direct
    /// replies lose their parent and stay as top-level comments.
    pub async fn delete_comment(
        db: &DatabaseConnection,
        user: &CurrentUser,
        comment_id: i32,
    ) -> Result<CommentDeleted, AppError> {
        let comment = Comments::find_by_id(comment_id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

        if comment.user_id != user.id && !user.is_staff {
            return Err(AppError::Forbidden(
                "Only the author or staff can delete this comment".to_string(),
            ));
        }

        let material_id = comment.material_id;
        let txn = db.begin().await?;

        Comments::update_many()
            .col_expr(comments::Column::ParentId, Expr::value(Option::<i32>::None))
            .filter(comments::Column::ParentId.eq(comment_id))
            .exec(&txn)
            .await?;
        Comments::delete_by_id(comment_id).exec(&txn).await?;

        let count = Self::count(&txn, material_id).await?;
        txn.commit().await?;

        tracing::info!("🗑️  Comment {} deleted by {}", comment_id, user.username);

        Ok(CommentDeleted {
            ok: true,
            deleted_id: comment_id,
            count,
        })
    }

    /// Every comment of a material as a newest-first forest.
    pub async fn list_thread<C: ConnectionTrait>(
        db: &C,
        material_id: i32,
    ) -> Result<CommentThread, AppError> {
        Self::ensure_material(db, material_id).await?;

        let rows = Comments::find()
            .filter(comments::Column::MaterialId.eq(material_id))
            .order_by_desc(comments::Column::CreatedAt)
            .order_by_desc(comments::Column::Id)
            .find_also_related(Users)
            .all(db)
            .await?;

        let count = rows.len() as u64;
        let flat = rows
            .into_iter()
            .map(|(c, u)| view(c, u.map(|u| u.username).unwrap_or_default()))
            .collect();

        Ok(CommentThread {
            count,
            comments: build_thread(flat),
        })
    }

    async fn ensure_material<C: ConnectionTrait>(db: &C, material_id: i32) -> Result<(), AppError> {
        Materials::find_by_id(material_id)
            .one(db)
            .await?
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Material not found".to_string()))
    }

    async fn insert(
        db: &DatabaseConnection,
        user: &CurrentUser,
        material_id: i32,
        body: String,
        parent_id: Option<i32>,
    ) -> Result<CommentPosted, AppError> {
        let model = comments::ActiveModel {
            material_id: Set(material_id),
            user_id: Set(user.id.clone()),
            body: Set(body),
            parent_id: Set(parent_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let count = Self::count(db, material_id).await?;
        Ok(CommentPosted {
            ok: true,
            comment: view(model, user.username.clone()),
            count,
        })
    }
}

fn view(model: comments::Model, username: String) -> CommentView {
    CommentView {
        id: model.id,
        material_id: model.material_id,
        user: username,
        body: model.body,
        parent_id: model.parent_id,
        created_at: model.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: i32, parent_id: Option<i32>) -> CommentView {
        CommentView {
            id,
            material_id: 1,
            user: "alice".to_string(),
            body: format!("comment {}", id),
            parent_id,
            created_at: Utc::now(),
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<i32> {
        nodes.iter().map(|n| n.comment.id).collect()
    }

    #[test]
    fn test_build_thread_nests_replies() {
        // newest first, as loaded
        let flat = vec![
            comment(5, Some(1)),
            comment(4, Some(2)),
            comment(3, None),
            comment(2, Some(1)),
            comment(1, None),
        ];

        let forest = build_thread(flat);
        assert_eq!(ids(&forest), vec![3, 1]);

        let first = &forest[1];
        assert_eq!(ids(&first.replies), vec![5, 2]);
        assert_eq!(ids(&first.replies[1].replies), vec![4]);
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn test_build_thread_unknown_parent_is_root() {
        let forest = build_thread(vec![comment(7, Some(99)), comment(6, None)]);
        assert_eq!(ids(&forest), vec![7, 6]);
    }

    #[test]
    fn test_build_thread_empty() {
        assert!(build_thread(Vec::new()).is_empty());
    }
}
