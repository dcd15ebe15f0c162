//! Poll store and vote ledger.
//!
//! Both are injected into the core as trait objects. The in-memory
//! implementations back tests and single-process deployments; the sea-orm
//! implementations back `PostgreSQL`.

mod memory;
mod poll;
mod poll_vote;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polling_common::{AppError, AppResult};

use crate::models::{Poll, PollFilter, PollPage, Vote};

pub use memory::{MemoryPollStore, MemoryVoteLedger};
pub use poll::SqlPollStore;
pub use poll_vote::SqlVoteLedger;

/// Authoritative storage for polls, their options and vote counts.
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Insert a new poll with its options.
    async fn create(&self, poll: Poll) -> AppResult<Poll>;

    /// Find a poll by ID.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Poll>>;

    /// Get a poll by ID, returning error if not found.
    async fn get_by_id(&self, id: &str) -> AppResult<Poll> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found: {id}")))
    }

    /// Overwrite a poll, including its option set and counts.
    async fn update(&self, poll: Poll) -> AppResult<Poll>;

    /// Delete a poll. Returns whether a poll was removed.
    async fn delete(&self, id: &str) -> AppResult<bool>;

    /// List polls matching `filter`, paginated after filtering.
    async fn list(&self, filter: &PollFilter) -> AppResult<PollPage>;

    /// Add one vote to each listed option, add `option_ids.len()` to the
    /// poll total and set `updated_at`, as a single unit.
    ///
    /// Fails with [`AppError::OptionNotFound`] without changing anything if
    /// an option does not belong to the poll.
    async fn apply_vote(
        &self,
        poll_id: &str,
        option_ids: &[String],
        at: DateTime<Utc>,
    ) -> AppResult<Poll>;
}

/// Record of accepted votes.
#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Append a vote.
    async fn append(&self, vote: Vote) -> AppResult<Vote>;

    /// Remove a single vote by ID.
    async fn remove(&self, vote_id: &str) -> AppResult<()>;

    /// Whether `user_id` has any vote recorded on `poll_id`.
    async fn has_voted(&self, poll_id: &str, user_id: &str) -> AppResult<bool>;

    /// Votes cast by `user_id` on `poll_id`, oldest first.
    async fn find_by_poll_and_user(&self, poll_id: &str, user_id: &str) -> AppResult<Vec<Vote>>;

    /// All votes on `poll_id`, oldest first.
    async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<Vote>>;

    /// Delete every vote on `poll_id`. Returns the number removed.
    async fn delete_by_poll(&self, poll_id: &str) -> AppResult<u64>;
}
