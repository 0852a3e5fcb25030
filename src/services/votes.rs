use crate::api::error::AppError;
use crate::entities::{downvotes, materials, prelude::*, upvotes};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A user's vote on one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    None,
    Up,
    Down,
}

impl VoteState {
    /// Result of requesting `pressed` while in `self`: the same direction
    /// again clears the vote, the other one switches it, `None` clears.
    pub fn toggle(self, pressed: VoteState) -> VoteState {
        if self == pressed { VoteState::None } else { pressed }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VoteTally {
    #[schema(example = "ok")]
    pub status: String,
    pub your_vote: VoteState,
    pub total_upvotes: u64,
    pub total_downvotes: u64,
}

pub struct VoteService;

impl VoteService {
    /// Current vote of `user_id` on `material_id`.
    pub async fn vote_state<C: ConnectionTrait>(
        db: &C,
        user_id: &str,
        material_id: i32,
    ) -> Result<VoteState, AppError> {
        let up = Upvotes::find()
            .filter(upvotes::Column::UserId.eq(user_id))
            .filter(upvotes::Column::MaterialId.eq(material_id))
            .count(db)
            .await?;
        if up > 0 {
            return Ok(VoteState::Up);
        }

        let down = Downvotes::find()
            .filter(downvotes::Column::UserId.eq(user_id))
            .filter(downvotes::Column::MaterialId.eq(material_id))
            .count(db)
            .await?;
        Ok(if down > 0 {
            VoteState::Down
        } else {
            VoteState::None
        })
    }

    pub async fn totals<C: ConnectionTrait>(
        db: &C,
        material_id: i32,
    ) -> Result<(u64, u64), AppError> {
        let up = Upvotes::find()
            .filter(upvotes::Column::MaterialId.eq(material_id))
            .count(db)
            .await?;
        let down = Downvotes::find()
            .filter(downvotes::Column::MaterialId.eq(material_id))
            .count(db)
            .await?;
        Ok((up, down))
    }

    /// Applies a vote request and returns the new tally.
    ///
    /// Everything happens in one transaction holding a write lock on the
    /// material row, so concurrent requests on a material serialize and a
    /// user never ends up with both an upvote and a downvote.
    pub async fn set_vote(
        db: &DatabaseConnection,
        user_id: &str,
        material_id: i32,
        pressed: VoteState,
    ) -> Result<VoteTally, AppError> {
        let txn = db.begin().await?;

        // The first statement must write: a SQLite transaction that reads
        // first cannot wait for the write lock and fails with SQLITE_BUSY.
        // On PostgreSQL the UPDATE holds the row lock until commit.
        let touched = Materials::update_many()
            .col_expr(
                materials::Column::UpdatedAt,
                Expr::col(materials::Column::UpdatedAt).into(),
            )
            .filter(materials::Column::Id.eq(material_id))
            .exec(&txn)
            .await?;
        if touched.rows_affected == 0 {
            return Err(AppError::NotFound("Material not found".to_string()));
        }

        let current = Self::vote_state(&txn, user_id, material_id).await?;
        let next = current.toggle(pressed);

        Upvotes::delete_many()
            .filter(upvotes::Column::UserId.eq(user_id))
            .filter(upvotes::Column::MaterialId.eq(material_id))
            .exec(&txn)
            .await?;
        Downvotes::delete_many()
            .filter(downvotes::Column::UserId.eq(user_id))
            .filter(downvotes::Column::MaterialId.eq(material_id))
            .exec(&txn)
            .await?;

        let now = Utc::now();
        match next {
            VoteState::Up => {
                upvotes::ActiveModel {
                    user_id: Set(user_id.to_string()),
                    material_id: Set(material_id),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
            VoteState::Down => {
                downvotes::ActiveModel {
                    user_id: Set(user_id.to_string()),
                    material_id: Set(material_id),
                    created_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
            VoteState::None => {}
        }

        let (total_upvotes, total_downvotes) = Self::totals(&txn, material_id).await?;
        txn.commit().await?;

        tracing::debug!(
            "👍 Vote on material {} by {}: {:?} -> {:?}",
            material_id,
            user_id,
            current,
            next
        );

        Ok(VoteTally {
            status: "ok".to_string(),
            your_vote: next,
            total_upvotes,
            total_downvotes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_table() {
        use VoteState::*;
        assert_eq!(None.toggle(Up), Up);
        assert_eq!(None.toggle(Down), Down);
        assert_eq!(Up.toggle(Up), None);
        assert_eq!(Up.toggle(Down), Down);
        assert_eq!(Down.toggle(Down), None);
        assert_eq!(Down.toggle(Up), Up);
        assert_eq!(Up.toggle(None), None);
        assert_eq!(None.toggle(None), None);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_value(VoteState::Up).unwrap(), "up");
        assert_eq!(serde_json::to_value(VoteState::None).unwrap(), "none");
    }
}
