//! Poll vote repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use polling_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::json;

use super::VoteLedger;
use crate::entities::{PollVote, poll_vote};
use crate::models::Vote;

/// Vote ledger on sea-orm.
#[derive(Clone)]
pub struct SqlVoteLedger {
    db: Arc<DatabaseConnection>,
}

impl SqlVoteLedger {
    /// Create a new poll vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn from_model(model: poll_vote::Model) -> AppResult<Vote> {
    let option_ids: Vec<String> = serde_json::from_value(model.option_ids)
        .map_err(|e| AppError::Internal(format!("Invalid vote option ids: {e}")))?;
    Ok(Vote {
        id: model.id,
        poll_id: model.poll_id,
        option_ids,
        user_id: model.user_id,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

#[async_trait]
impl VoteLedger for SqlVoteLedger {
    async fn append(&self, vote: Vote) -> AppResult<Vote> {
        let model = poll_vote::ActiveModel {
            id: Set(vote.id.clone()),
            poll_id: Set(vote.poll_id.clone()),
            user_id: Set(vote.user_id.clone()),
            option_ids: Set(json!(vote.option_ids)),
            created_at: Set(vote.created_at.into()),
        };
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(vote)
    }

    async fn remove(&self, vote_id: &str) -> AppResult<()> {
        PollVote::delete_by_id(vote_id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn has_voted(&self, poll_id: &str, user_id: &str) -> AppResult<bool> {
        let existing = PollVote::find()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(existing.is_some())
    }

    async fn find_by_poll_and_user(&self, poll_id: &str, user_id: &str) -> AppResult<Vec<Vote>> {
        PollVote::find()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .order_by_asc(poll_vote::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(from_model)
            .collect()
    }

    async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<Vote>> {
        PollVote::find()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .order_by_asc(poll_vote::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(from_model)
            .collect()
    }

    async fn delete_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        let result = PollVote::delete_many()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}
