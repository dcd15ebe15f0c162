//! Poll repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polling_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
    sea_query::{Expr, Func, NullOrdering, Order},
};

use super::PollStore;
use crate::entities::{Poll as PollEntity, PollOption as PollOptionEntity, poll, poll_option};
use crate::models::{Poll, PollFilter, PollOption, PollPage, PollSort, PollStatusFilter};

fn db_err(e: sea_orm::DbErr) -> AppError {
    AppError::Database(e.to_string())
}

/// Poll store on sea-orm.
#[derive(Clone)]
pub struct SqlPollStore {
    db: Arc<DatabaseConnection>,
}

impl SqlPollStore {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Load the options of the given polls, grouped by poll ID in display order.
    async fn load_options(
        &self,
        poll_ids: Vec<String>,
    ) -> AppResult<HashMap<String, Vec<PollOption>>> {
        if poll_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = PollOptionEntity::find()
            .filter(poll_option::Column::PollId.is_in(poll_ids))
            .order_by_asc(poll_option::Column::PollId)
            .order_by_asc(poll_option::Column::Position)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)?;

        let mut grouped: HashMap<String, Vec<PollOption>> = HashMap::new();
        for row in rows {
            grouped.entry(row.poll_id).or_default().push(PollOption {
                id: row.id,
                text: row.text,
                votes: row.votes,
            });
        }
        Ok(grouped)
    }

    fn filtered_query(filter: &PollFilter, now: DateTime<Utc>) -> Select<PollEntity> {
        let mut condition = Condition::all();

        if let Some(ref owner) = filter.created_by {
            condition = condition.add(poll::Column::CreatedBy.eq(owner.as_str()));
        }
        if let Some(active) = filter.is_active {
            condition = condition.add(poll::Column::IsActive.eq(active));
        }

        condition = match filter.status {
            PollStatusFilter::All => condition,
            PollStatusFilter::Active => condition.add(poll::Column::IsActive.eq(true)).add(
                Condition::any()
                    .add(poll::Column::ExpiresAt.is_null())
                    .add(poll::Column::ExpiresAt.gte(now)),
            ),
            PollStatusFilter::Expired => condition.add(poll::Column::ExpiresAt.lt(now)),
            PollStatusFilter::Anonymous => condition.add(poll::Column::IsAnonymous.eq(true)),
        };

        if let Some(needle) = filter.search_pattern() {
            let pattern = format!("%{needle}%");
            condition = condition.add(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(poll::Column::Title))).like(&pattern))
                    .add(
                        Expr::expr(Func::lower(Expr::col(poll::Column::Description)))
                            .like(&pattern),
                    ),
            );
        }

        PollEntity::find().filter(condition)
    }

    fn ordered(query: Select<PollEntity>, sort: PollSort) -> Select<PollEntity> {
        let query = match sort {
            PollSort::Newest => query.order_by_desc(poll::Column::CreatedAt),
            PollSort::Oldest => query.order_by_asc(poll::Column::CreatedAt),
            PollSort::MostVotes => query.order_by_desc(poll::Column::TotalVotes),
            PollSort::SoonestExpiry => query.order_by_with_nulls(
                poll::Column::ExpiresAt,
                Order::Asc,
                NullOrdering::Last,
            ),
        };
        query
            .order_by_desc(poll::Column::CreatedAt)
            .order_by_asc(poll::Column::Id)
    }
}

fn to_active(poll: &Poll) -> poll::ActiveModel {
    poll::ActiveModel {
        id: Set(poll.id.clone()),
        title: Set(poll.title.clone()),
        description: Set(poll.description.clone()),
        created_by: Set(poll.created_by.clone()),
        created_at: Set(poll.created_at.into()),
        updated_at: Set(poll.updated_at.into()),
        expires_at: Set(poll.expires_at.map(Into::into)),
        is_active: Set(poll.is_active),
        allow_multiple_votes: Set(poll.allow_multiple_votes),
        is_anonymous: Set(poll.is_anonymous),
        total_votes: Set(poll.total_votes),
    }
}

fn option_rows(poll: &Poll) -> Vec<poll_option::ActiveModel> {
    poll.options
        .iter()
        .enumerate()
        .map(|(position, option)| poll_option::ActiveModel {
            id: Set(option.id.clone()),
            poll_id: Set(poll.id.clone()),
            position: Set(position as i32),
            text: Set(option.text.clone()),
            votes: Set(option.votes),
        })
        .collect()
}

fn from_model(model: poll::Model, options: Vec<PollOption>) -> Poll {
    Poll {
        id: model.id,
        title: model.title,
        description: model.description,
        options,
        created_by: model.created_by,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        expires_at: model.expires_at.map(|e| e.with_timezone(&Utc)),
        is_active: model.is_active,
        allow_multiple_votes: model.allow_multiple_votes,
        is_anonymous: model.is_anonymous,
        total_votes: model.total_votes,
    }
}

#[async_trait]
impl PollStore for SqlPollStore {
    async fn create(&self, poll: Poll) -> AppResult<Poll> {
        let txn = self.db.begin().await.map_err(db_err)?;

        to_active(&poll).insert(&txn).await.map_err(db_err)?;
        PollOptionEntity::insert_many(option_rows(&poll))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(poll)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Poll>> {
        let Some(model) = PollEntity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let mut options = self.load_options(vec![model.id.clone()]).await?;
        let options = options.remove(&model.id).unwrap_or_default();
        Ok(Some(from_model(model, options)))
    }

    async fn update(&self, poll: Poll) -> AppResult<Poll> {
        let txn = self.db.begin().await.map_err(db_err)?;

        to_active(&poll).update(&txn).await.map_err(db_err)?;

        // Options are rewritten wholesale; counts travel with the poll
        PollOptionEntity::delete_many()
            .filter(poll_option::Column::PollId.eq(poll.id.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        PollOptionEntity::insert_many(option_rows(&poll))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        Ok(poll)
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = PollEntity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected > 0)
    }

    async fn list(&self, filter: &PollFilter) -> AppResult<PollPage> {
        let query = Self::filtered_query(filter, Utc::now());

        let total = query
            .clone()
            .count(self.db.as_ref())
            .await
            .map_err(db_err)?;

        let mut query = Self::ordered(query, filter.sort).offset(filter.offset);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        let models = query.all(self.db.as_ref()).await.map_err(db_err)?;

        let mut options = self
            .load_options(models.iter().map(|m| m.id.clone()).collect())
            .await?;
        let polls = models
            .into_iter()
            .map(|m| {
                let opts = options.remove(&m.id).unwrap_or_default();
                from_model(m, opts)
            })
            .collect();

        Ok(PollPage { polls, total })
    }

    async fn apply_vote(
        &self,
        poll_id: &str,
        option_ids: &[String],
        at: DateTime<Utc>,
    ) -> AppResult<Poll> {
        let txn = self.db.begin().await.map_err(db_err)?;

        for option_id in option_ids {
            let result = PollOptionEntity::update_many()
                .col_expr(
                    poll_option::Column::Votes,
                    Expr::col(poll_option::Column::Votes).add(1),
                )
                .filter(poll_option::Column::Id.eq(option_id.as_str()))
                .filter(poll_option::Column::PollId.eq(poll_id))
                .exec(&txn)
                .await
                .map_err(db_err)?;

            if result.rows_affected == 0 {
                // Dropping the transaction rolls back earlier increments
                return Err(AppError::OptionNotFound);
            }
        }

        let result = PollEntity::update_many()
            .col_expr(
                poll::Column::TotalVotes,
                Expr::col(poll::Column::TotalVotes).add(option_ids.len() as i64),
            )
            .col_expr(poll::Column::UpdatedAt, Expr::value(at))
            .filter(poll::Column::Id.eq(poll_id))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Poll not found: {poll_id}")));
        }

        txn.commit().await.map_err(db_err)?;

        self.get_by_id(poll_id).await
    }
}
