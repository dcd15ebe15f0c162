//! Poll lifecycle service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use polling_common::{AppError, AppResult, IdGenerator};
use polling_db::{
    PollStore, VoteLedger,
    models::{Poll, PollFilter, PollOption, PollPage, Vote},
};
use serde::{Deserialize, Deserializer};
use tokio::sync::OwnedMutexGuard;

use super::locks::PollLocks;
use super::validation::{
    FieldErrors, check_description, check_expires_at, check_options, check_title,
    normalize_description,
};

/// Input for creating a poll.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allow_multiple_votes: bool,
    #[serde(default)]
    pub is_anonymous: bool,
}

/// Input for updating a poll. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePollInput {
    pub title: Option<String>,
    /// `Some(None)` clears the description.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    /// Replaces the whole option set and resets every count.
    pub options: Option<Vec<String>>,
    /// `Some(None)` removes the expiry.
    #[serde(default, deserialize_with = "present")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub allow_multiple_votes: Option<bool>,
    pub is_anonymous: Option<bool>,
}

/// Maps an explicit `null` to `Some(None)` so it can be told apart from a
/// missing field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Poll service for creation, lookup, update, deletion and listing.
#[derive(Clone)]
pub struct PollService {
    store: Arc<dyn PollStore>,
    ledger: Arc<dyn VoteLedger>,
    locks: PollLocks,
    id_gen: IdGenerator,
}

impl PollService {
    /// Create a new poll service.
    ///
    /// `locks` must be shared with the vote service so updates and votes on
    /// the same poll are serialized.
    #[must_use]
    pub fn new(store: Arc<dyn PollStore>, ledger: Arc<dyn VoteLedger>, locks: PollLocks) -> Self {
        Self {
            store,
            ledger,
            locks,
            id_gen: IdGenerator::new(),
        }
    }

    fn new_options(&self, texts: &[String]) -> Vec<PollOption> {
        texts
            .iter()
            .map(|text| PollOption {
                id: self.id_gen.generate(),
                text: text.trim().to_string(),
                votes: 0,
            })
            .collect()
    }

    /// Create a poll owned by `author_id`.
    pub async fn create(&self, author_id: &str, input: CreatePollInput) -> AppResult<Poll> {
        let now = Utc::now();

        let mut errors = FieldErrors::new();
        check_title(&input.title, &mut errors);
        check_description(input.description.as_deref(), &mut errors);
        check_options(&input.options, &mut errors);
        if let Some(expires_at) = input.expires_at {
            check_expires_at(expires_at, now, &mut errors);
        }
        errors.into_result()?;

        let poll = Poll {
            id: self.id_gen.generate(),
            title: input.title.trim().to_string(),
            description: normalize_description(input.description),
            options: self.new_options(&input.options),
            created_by: author_id.to_string(),
            created_at: now,
            updated_at: now,
            expires_at: input.expires_at,
            is_active: true,
            allow_multiple_votes: input.allow_multiple_votes,
            is_anonymous: input.is_anonymous,
            total_votes: 0,
        };

        let poll = self.store.create(poll).await?;
        tracing::info!(poll_id = %poll.id, created_by = %poll.created_by, "Poll created");
        Ok(poll)
    }

    /// Get a poll by ID.
    pub async fn get(&self, id: &str) -> AppResult<Poll> {
        if id.trim().is_empty() {
            return Err(AppError::field("id", "Poll ID is required"));
        }
        self.store.get_by_id(id).await
    }

    /// Lock `id` and load it for its owner. A poll that cannot be loaded
    /// leaves no lock entry behind.
    async fn lock_owned(
        &self,
        id: &str,
        author_id: &str,
    ) -> AppResult<(OwnedMutexGuard<()>, Poll)> {
        let guard = self.locks.acquire(id).await;
        let poll = match self.get(id).await {
            Ok(poll) => poll,
            Err(e) => {
                self.locks.forget(id).await;
                return Err(e);
            }
        };
        if poll.created_by != author_id {
            return Err(AppError::Forbidden(
                "You can only modify your own polls".to_string(),
            ));
        }
        Ok((guard, poll))
    }

    /// Put back votes taken out of the ledger before a failed store write.
    async fn restore_votes(&self, poll_id: &str, votes: Vec<Vote>) {
        for vote in votes {
            if let Err(e) = self.ledger.append(vote).await {
                tracing::error!(poll_id = poll_id, error = %e, "Failed to restore vote");
            }
        }
    }

    /// Update a poll owned by `author_id`.
    ///
    /// Supplying `options` replaces the option set: all counts restart at
    /// zero and the poll's recorded votes are discarded.
    pub async fn update(
        &self,
        id: &str,
        author_id: &str,
        input: UpdatePollInput,
    ) -> AppResult<Poll> {
        let (_guard, mut poll) = self.lock_owned(id, author_id).await?;
        let now = Utc::now();

        let mut errors = FieldErrors::new();
        if let Some(ref title) = input.title {
            check_title(title, &mut errors);
        }
        if let Some(Some(ref description)) = input.description {
            check_description(Some(description), &mut errors);
        }
        if let Some(ref options) = input.options {
            check_options(options, &mut errors);
        }
        if let Some(Some(expires_at)) = input.expires_at {
            check_expires_at(expires_at, now, &mut errors);
        }
        errors.into_result()?;

        if let Some(title) = input.title {
            poll.title = title.trim().to_string();
        }
        if let Some(description) = input.description {
            poll.description = normalize_description(description);
        }
        if let Some(expires_at) = input.expires_at {
            poll.expires_at = expires_at;
        }
        if let Some(is_active) = input.is_active {
            poll.is_active = is_active;
        }
        if let Some(allow_multiple_votes) = input.allow_multiple_votes {
            poll.allow_multiple_votes = allow_multiple_votes;
        }
        if let Some(is_anonymous) = input.is_anonymous {
            poll.is_anonymous = is_anonymous;
        }

        // Votes referencing the old option set leave the ledger before the
        // new set is stored
        let mut discarded = Vec::new();
        if let Some(ref options) = input.options {
            discarded = self.ledger.find_by_poll(&poll.id).await?;
            self.ledger.delete_by_poll(&poll.id).await?;
            poll.options = self.new_options(options);
            poll.total_votes = 0;
        }
        poll.updated_at = now;

        let poll = match self.store.update(poll).await {
            Ok(poll) => poll,
            Err(e) => {
                tracing::warn!(poll_id = id, error = %e, "Poll update failed");
                self.restore_votes(id, discarded).await;
                return Err(e);
            }
        };

        if input.options.is_some() {
            tracing::warn!(
                poll_id = %poll.id,
                discarded_votes = discarded.len(),
                "Poll options replaced, vote counts reset"
            );
        }

        tracing::info!(poll_id = %poll.id, "Poll updated");
        Ok(poll)
    }

    /// Delete a poll owned by `author_id`, together with its votes.
    pub async fn delete(&self, id: &str, author_id: &str) -> AppResult<()> {
        let (guard, poll) = self.lock_owned(id, author_id).await?;

        let votes = self.ledger.find_by_poll(&poll.id).await?;
        self.ledger.delete_by_poll(&poll.id).await?;

        let deleted = match self.store.delete(&poll.id).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(poll_id = %poll.id, error = %e, "Poll delete failed");
                self.restore_votes(&poll.id, votes).await;
                return Err(e);
            }
        };

        self.locks.forget(&poll.id).await;
        drop(guard);

        if !deleted {
            return Err(AppError::NotFound(format!("Poll not found: {id}")));
        }

        tracing::info!(poll_id = %poll.id, removed_votes = votes.len(), "Poll deleted");
        Ok(())
    }

    /// List polls matching `filter`.
    pub async fn list(&self, filter: &PollFilter) -> AppResult<PollPage> {
        self.store.list(filter).await
    }
}
