//! In-memory poll store and vote ledger.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use polling_common::{AppError, AppResult};
use tokio::sync::RwLock;

use super::{PollStore, VoteLedger};
use crate::models::{Poll, PollFilter, PollPage, Vote};

/// Poll store backed by a map.
#[derive(Clone, Default)]
pub struct MemoryPollStore {
    polls: Arc<RwLock<HashMap<String, Poll>>>,
}

impl MemoryPollStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryPollStore {
    async fn create(&self, poll: Poll) -> AppResult<Poll> {
        let mut polls = self.polls.write().await;
        if polls.contains_key(&poll.id) {
            return Err(AppError::Database(format!("Duplicate poll id: {}", poll.id)));
        }
        polls.insert(poll.id.clone(), poll.clone());
        Ok(poll)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Poll>> {
        Ok(self.polls.read().await.get(id).cloned())
    }

    async fn update(&self, poll: Poll) -> AppResult<Poll> {
        let mut polls = self.polls.write().await;
        let slot = polls
            .get_mut(&poll.id)
            .ok_or_else(|| AppError::NotFound(format!("Poll not found: {}", poll.id)))?;
        *slot = poll.clone();
        Ok(poll)
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        Ok(self.polls.write().await.remove(id).is_some())
    }

    async fn list(&self, filter: &PollFilter) -> AppResult<PollPage> {
        let now = Utc::now();
        let polls = self.polls.read().await;

        let mut matching: Vec<Poll> = polls
            .values()
            .filter(|p| filter.matches(p, now))
            .cloned()
            .collect();
        drop(polls);

        matching.sort_by(|a, b| filter.sort.compare(a, b));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(usize::MAX))
            .take(
                filter
                    .limit
                    .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX)),
            )
            .collect();

        Ok(PollPage { polls: page, total })
    }

    async fn apply_vote(
        &self,
        poll_id: &str,
        option_ids: &[String],
        at: DateTime<Utc>,
    ) -> AppResult<Poll> {
        let mut polls = self.polls.write().await;
        let poll = polls
            .get_mut(poll_id)
            .ok_or_else(|| AppError::NotFound(format!("Poll not found: {poll_id}")))?;

        // Check everything before touching any counter
        if !option_ids.iter().all(|id| poll.has_option(id)) {
            return Err(AppError::OptionNotFound);
        }

        for option_id in option_ids {
            if let Some(option) = poll.options.iter_mut().find(|o| o.id == *option_id) {
                option.votes += 1;
            }
        }
        poll.total_votes += option_ids.len() as i64;
        poll.updated_at = at;

        Ok(poll.clone())
    }
}

/// Vote ledger backed by a per-poll map.
#[derive(Clone, Default)]
pub struct MemoryVoteLedger {
    votes: Arc<RwLock<HashMap<String, Vec<Vote>>>>,
}

impl MemoryVoteLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteLedger for MemoryVoteLedger {
    async fn append(&self, vote: Vote) -> AppResult<Vote> {
        self.votes
            .write()
            .await
            .entry(vote.poll_id.clone())
            .or_default()
            .push(vote.clone());
        Ok(vote)
    }

    async fn remove(&self, vote_id: &str) -> AppResult<()> {
        let mut votes = self.votes.write().await;
        for entries in votes.values_mut() {
            entries.retain(|v| v.id != vote_id);
        }
        votes.retain(|_, entries| !entries.is_empty());
        Ok(())
    }

    async fn has_voted(&self, poll_id: &str, user_id: &str) -> AppResult<bool> {
        Ok(self.votes.read().await.get(poll_id).is_some_and(|entries| {
            entries
                .iter()
                .any(|v| v.user_id.as_deref() == Some(user_id))
        }))
    }

    async fn find_by_poll_and_user(&self, poll_id: &str, user_id: &str) -> AppResult<Vec<Vote>> {
        Ok(self
            .votes
            .read()
            .await
            .get(poll_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|v| v.user_id.as_deref() == Some(user_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<Vote>> {
        Ok(self
            .votes
            .read()
            .await
            .get(poll_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_by_poll(&self, poll_id: &str) -> AppResult<u64> {
        Ok(self
            .votes
            .write()
            .await
            .remove(poll_id)
            .map_or(0, |entries| entries.len() as u64))
    }
}
