//! Vote service.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use polling_common::{AppError, AppResult, IdGenerator};
use polling_db::{
    PollStore, VoteLedger,
    models::{Poll, Vote},
};
use serde::Serialize;

use super::eligibility::EligibilityEvaluator;
use super::locks::PollLocks;
use super::results::{PollResults, aggregate};

/// Outcome of an accepted vote.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub vote: Vote,
    pub poll: Poll,
    pub results: PollResults,
}

/// What a given voter has done on a poll and whether they may vote again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterStatus {
    /// Option IDs across all of the voter's recorded votes, in cast order.
    pub option_ids: Vec<String>,
    pub has_voted: bool,
    pub can_vote: bool,
}

/// Vote service: evaluates and commits votes under the poll's lock.
#[derive(Clone)]
pub struct VoteService {
    store: Arc<dyn PollStore>,
    ledger: Arc<dyn VoteLedger>,
    evaluator: EligibilityEvaluator,
    locks: PollLocks,
    id_gen: IdGenerator,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub fn new(store: Arc<dyn PollStore>, ledger: Arc<dyn VoteLedger>, locks: PollLocks) -> Self {
        Self {
            evaluator: EligibilityEvaluator::new(ledger.clone()),
            store,
            ledger,
            locks,
            id_gen: IdGenerator::new(),
        }
    }

    /// Cast a vote for `option_ids` on `poll_id`.
    ///
    /// `voter` is the authenticated user, if any. Anonymous polls never
    /// record it.
    pub async fn vote(
        &self,
        poll_id: &str,
        option_ids: Vec<String>,
        voter: Option<&str>,
    ) -> AppResult<VoteOutcome> {
        check_request(&option_ids)?;

        let _guard = self.locks.acquire(poll_id).await;

        let now = Utc::now();
        let found = self.store.find_by_id(poll_id).await;
        if !matches!(found, Ok(Some(_))) {
            self.locks.forget(poll_id).await;
        }
        let poll = found?;
        let poll = match self
            .evaluator
            .evaluate(poll.as_ref(), poll_id, &option_ids, voter, now)
            .await
        {
            Ok(poll) => poll,
            Err(e) => {
                tracing::debug!(poll_id = poll_id, code = e.error_code(), "Vote rejected");
                return Err(e);
            }
        };

        let vote = Vote {
            id: self.id_gen.generate(),
            poll_id: poll.id.clone(),
            option_ids,
            user_id: if poll.is_anonymous {
                None
            } else {
                voter.map(ToString::to_string)
            },
            created_at: now,
        };

        let vote = self.ledger.append(vote).await?;
        let poll = match self.store.apply_vote(&vote.poll_id, &vote.option_ids, now).await {
            Ok(poll) => poll,
            Err(e) => {
                tracing::warn!(vote_id = %vote.id, error = %e, "Tally update failed, removing vote");
                if let Err(undo) = self.ledger.remove(&vote.id).await {
                    tracing::error!(
                        vote_id = %vote.id,
                        error = %undo,
                        "Failed to remove vote after tally update failed"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            poll_id = %poll.id,
            vote_id = %vote.id,
            options = vote.option_ids.len(),
            "Vote recorded"
        );

        let results = aggregate(&poll);
        Ok(VoteOutcome {
            vote,
            poll,
            results,
        })
    }

    /// Current results of a poll.
    pub async fn results(&self, poll_id: &str) -> AppResult<PollResults> {
        let poll = self.store.get_by_id(poll_id).await?;
        Ok(aggregate(&poll))
    }

    /// Voter status of `voter` on `poll`, without committing anything.
    pub async fn voter_status(&self, poll: &Poll, voter: Option<&str>) -> AppResult<VoterStatus> {
        let option_ids: Vec<String> = match voter {
            Some(voter) if !poll.is_anonymous => self
                .ledger
                .find_by_poll_and_user(&poll.id, voter)
                .await?
                .into_iter()
                .flat_map(|v| v.option_ids)
                .collect(),
            _ => Vec::new(),
        };
        let has_voted = !option_ids.is_empty();

        // Dry run with the first option as a stand-in for any single choice
        let can_vote = match poll.options.first() {
            Some(option) => {
                let probe = [option.id.clone()];
                match self
                    .evaluator
                    .evaluate(Some(poll), &poll.id, &probe, voter, Utc::now())
                    .await
                {
                    Ok(_) => true,
                    Err(e) if e.is_server_error() => return Err(e),
                    Err(_) => false,
                }
            }
            None => false,
        };

        Ok(VoterStatus {
            option_ids,
            has_voted,
            can_vote,
        })
    }
}

/// Shape checks on the option ID list that precede eligibility.
fn check_request(option_ids: &[String]) -> AppResult<()> {
    if option_ids.is_empty() {
        return Err(AppError::field(
            "optionIds",
            "At least one option must be selected",
        ));
    }
    let mut seen = HashSet::new();
    if !option_ids.iter().all(|id| seen.insert(id.as_str())) {
        return Err(AppError::field(
            "optionIds",
            "The same option cannot be selected twice",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::poll::{CreatePollInput, PollService};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use futures::future::join_all;
    use polling_db::{
        MemoryPollStore, MemoryVoteLedger,
        models::{PollFilter, PollPage},
    };

    struct Fixture {
        polls: PollService,
        votes: VoteService,
        store: Arc<MemoryPollStore>,
        ledger: Arc<MemoryVoteLedger>,
        locks: PollLocks,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryPollStore::new());
        let ledger = Arc::new(MemoryVoteLedger::new());
        let locks = PollLocks::new();
        Fixture {
            polls: PollService::new(store.clone(), ledger.clone(), locks.clone()),
            votes: VoteService::new(store.clone(), ledger.clone(), locks.clone()),
            store,
            ledger,
            locks,
        }
    }

    async fn create(f: &Fixture, multiple: bool, anonymous: bool) -> Poll {
        f.polls
            .create(
                "owner",
                CreatePollInput {
                    title: "Favourite colour?".to_string(),
                    options: vec!["Red".to_string(), "Green".to_string(), "Blue".to_string()],
                    allow_multiple_votes: multiple,
                    is_anonymous: anonymous,
                    ..CreatePollInput::default()
                },
            )
            .await
            .unwrap()
    }

    fn option(poll: &Poll, i: usize) -> String {
        poll.options[i].id.clone()
    }

    #[tokio::test]
    async fn test_vote_increments_counts_and_total() {
        let f = fixture();
        let poll = create(&f, false, false).await;

        let outcome = f
            .votes
            .vote(&poll.id, vec![option(&poll, 1)], Some("alice"))
            .await
            .unwrap();

        assert_eq!(outcome.poll.options[1].votes, 1);
        assert_eq!(outcome.poll.total_votes, 1);
        assert_eq!(outcome.poll.total_votes, outcome.poll.option_vote_sum());
        assert_eq!(outcome.vote.user_id.as_deref(), Some("alice"));
        assert_eq!(outcome.results.results[1].percentage, 100);
    }

    #[tokio::test]
    async fn test_second_vote_rejected_and_counts_unchanged() {
        let f = fixture();
        let poll = create(&f, false, false).await;

        f.votes
            .vote(&poll.id, vec![option(&poll, 0)], Some("alice"))
            .await
            .unwrap();
        let after_first = f.store.get_by_id(&poll.id).await.unwrap();

        let second = f
            .votes
            .vote(&poll.id, vec![option(&poll, 2)], Some("alice"))
            .await;
        assert!(matches!(second, Err(AppError::AlreadyVoted)));

        let after_second = f.store.get_by_id(&poll.id).await.unwrap();
        assert_eq!(after_first.options, after_second.options);
        assert_eq!(after_first.total_votes, after_second.total_votes);
        assert_eq!(f.ledger.find_by_poll(&poll.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_multiple_choice_adds_each_option() {
        let f = fixture();
        let poll = create(&f, true, false).await;

        let outcome = f
            .votes
            .vote(
                &poll.id,
                vec![option(&poll, 0), option(&poll, 2)],
                Some("alice"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.poll.total_votes, 2);
        assert_eq!(outcome.poll.option_vote_sum(), 2);

        // Multi-vote polls accept repeat voters
        f.votes
            .vote(&poll.id, vec![option(&poll, 0)], Some("alice"))
            .await
            .unwrap();
        let poll = f.store.get_by_id(&poll.id).await.unwrap();
        assert_eq!(poll.options[0].votes, 2);
        assert_eq!(poll.total_votes, poll.option_vote_sum());
    }

    #[tokio::test]
    async fn test_anonymous_vote_records_no_voter() {
        let f = fixture();
        let poll = create(&f, false, true).await;

        let outcome = f
            .votes
            .vote(&poll.id, vec![option(&poll, 0)], Some("alice"))
            .await
            .unwrap();
        assert!(outcome.vote.user_id.is_none());

        f.votes
            .vote(&poll.id, vec![option(&poll, 0)], None)
            .await
            .unwrap();
        assert_eq!(f.store.get_by_id(&poll.id).await.unwrap().total_votes, 2);
    }

    #[tokio::test]
    async fn test_expired_poll_rejected() {
        let f = fixture();
        let mut poll = create(&f, false, false).await;
        poll.expires_at = Some(Utc::now() - Duration::minutes(5));
        f.store.update(poll.clone()).await.unwrap();

        let result = f.votes.vote(&poll.id, vec![option(&poll, 0)], Some("a")).await;
        assert!(matches!(result, Err(AppError::PollExpired)));
    }

    #[tokio::test]
    async fn test_request_shape_checks() {
        let f = fixture();
        let poll = create(&f, true, false).await;

        let empty = f.votes.vote(&poll.id, vec![], Some("a")).await;
        assert!(matches!(empty, Err(AppError::Validation(_))));

        let dup = f
            .votes
            .vote(&poll.id, vec![option(&poll, 0), option(&poll, 0)], Some("a"))
            .await;
        assert!(matches!(dup, Err(AppError::Validation(_))));

        let missing = f.votes.vote("missing", vec!["x".to_string()], Some("a")).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_votes_from_same_voter() {
        let f = fixture();
        let poll = create(&f, false, false).await;

        let attempts = (0..16).map(|i| {
            let votes = f.votes.clone();
            let poll_id = poll.id.clone();
            let choice = option(&poll, i % 3);
            tokio::spawn(async move { votes.vote(&poll_id, vec![choice], Some("alice")).await })
        });
        let outcomes = join_all(attempts).await;

        let accepted = outcomes
            .into_iter()
            .map(|joined| joined.unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(accepted, 1);

        let poll = f.store.get_by_id(&poll.id).await.unwrap();
        assert_eq!(poll.total_votes, 1);
        assert_eq!(poll.option_vote_sum(), 1);
        assert_eq!(f.ledger.find_by_poll(&poll.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_votes_on_unknown_polls_leave_no_lock_entries() {
        let f = fixture();
        let poll = create(&f, false, false).await;
        f.votes
            .vote(&poll.id, vec![option(&poll, 0)], Some("alice"))
            .await
            .unwrap();

        for i in 0..100 {
            let result = f
                .votes
                .vote(&format!("unknown-{i}"), vec!["x".to_string()], None)
                .await;
            assert!(matches!(result, Err(AppError::NotFound(_))));
        }

        assert_eq!(f.locks.len().await, 1);
    }

    /// Store whose tally update always fails.
    struct FailingTallyStore(MemoryPollStore);

    #[async_trait]
    impl PollStore for FailingTallyStore {
        async fn create(&self, poll: Poll) -> AppResult<Poll> {
            self.0.create(poll).await
        }
        async fn find_by_id(&self, id: &str) -> AppResult<Option<Poll>> {
            self.0.find_by_id(id).await
        }
        async fn update(&self, poll: Poll) -> AppResult<Poll> {
            self.0.update(poll).await
        }
        async fn delete(&self, id: &str) -> AppResult<bool> {
            self.0.delete(id).await
        }
        async fn list(&self, filter: &PollFilter) -> AppResult<PollPage> {
            self.0.list(filter).await
        }
        async fn apply_vote(
            &self,
            _poll_id: &str,
            _option_ids: &[String],
            _at: DateTime<Utc>,
        ) -> AppResult<Poll> {
            Err(AppError::Database("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_tally_update_removes_ledger_entry() {
        let store = Arc::new(FailingTallyStore(MemoryPollStore::new()));
        let ledger = Arc::new(MemoryVoteLedger::new());
        let locks = PollLocks::new();
        let polls = PollService::new(store.clone(), ledger.clone(), locks.clone());
        let votes = VoteService::new(store, ledger.clone(), locks);

        let poll = polls
            .create(
                "owner",
                CreatePollInput {
                    title: "Q".to_string(),
                    options: vec!["a".to_string(), "b".to_string()],
                    ..CreatePollInput::default()
                },
            )
            .await
            .unwrap();

        let result = votes.vote(&poll.id, vec![option(&poll, 0)], Some("alice")).await;
        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(!ledger.has_voted(&poll.id, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_voter_status() {
        let f = fixture();
        let poll = create(&f, false, false).await;

        let before = f.votes.voter_status(&poll, Some("alice")).await.unwrap();
        assert_eq!(
            before,
            VoterStatus {
                option_ids: vec![],
                has_voted: false,
                can_vote: true,
            }
        );

        f.votes
            .vote(&poll.id, vec![option(&poll, 2)], Some("alice"))
            .await
            .unwrap();
        let poll = f.store.get_by_id(&poll.id).await.unwrap();

        let after = f.votes.voter_status(&poll, Some("alice")).await.unwrap();
        assert_eq!(after.option_ids, vec![option(&poll, 2)]);
        assert!(after.has_voted);
        assert!(!after.can_vote);

        let signed_out = f.votes.voter_status(&poll, None).await.unwrap();
        assert!(!signed_out.can_vote);
        assert!(!signed_out.has_voted);
    }

    #[tokio::test]
    async fn test_results_read() {
        let f = fixture();
        let poll = create(&f, false, true).await;
        for choice in [0, 0, 1] {
            f.votes
                .vote(&poll.id, vec![option(&poll, choice)], None)
                .await
                .unwrap();
        }

        let results = f.votes.results(&poll.id).await.unwrap();
        assert_eq!(results.total_votes, 3);
        let shares: Vec<i64> = results.results.iter().map(|r| r.percentage).collect();
        assert_eq!(shares, vec![67, 33, 0]);
    }
}
