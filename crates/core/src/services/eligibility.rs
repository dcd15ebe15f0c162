//! Vote eligibility.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. the poll exists
//! 2. the poll is active
//! 3. the poll has not expired
//! 4. every referenced option belongs to the poll
//! 5. non-anonymous polls have a voter
//! 6. single-vote polls get exactly one option
//! 7. a non-anonymous single-vote poll has no earlier vote from the voter
//!
//! Nothing here mutates state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use polling_common::{AppError, AppResult};
use polling_db::{VoteLedger, models::Poll};

/// Checks 1 through 6, which need nothing beyond the poll itself.
pub fn check_poll_state<'a>(
    poll: Option<&'a Poll>,
    poll_id: &str,
    option_ids: &[String],
    voter: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<&'a Poll> {
    let poll = poll.ok_or_else(|| AppError::NotFound(format!("Poll not found: {poll_id}")))?;

    if !poll.is_active {
        return Err(AppError::PollInactive);
    }
    if poll.is_expired_at(now) {
        return Err(AppError::PollExpired);
    }
    if !option_ids.iter().all(|id| poll.has_option(id)) {
        return Err(AppError::OptionNotFound);
    }
    if !poll.is_anonymous && voter.is_none() {
        return Err(AppError::VoterRequired);
    }
    if !poll.allow_multiple_votes && option_ids.len() != 1 {
        return Err(AppError::MultipleNotAllowed);
    }

    Ok(poll)
}

/// Whether the ledger limits `poll` to one vote per voter.
#[must_use]
pub const fn one_vote_per_voter(poll: &Poll) -> bool {
    !poll.is_anonymous && !poll.allow_multiple_votes
}

/// Runs the full check sequence against a vote ledger.
#[derive(Clone)]
pub struct EligibilityEvaluator {
    ledger: Arc<dyn VoteLedger>,
}

impl EligibilityEvaluator {
    #[must_use]
    pub fn new(ledger: Arc<dyn VoteLedger>) -> Self {
        Self { ledger }
    }

    /// Decide whether a vote on `poll` is admissible.
    ///
    /// `poll` is `None` when no poll with `poll_id` exists.
    pub async fn evaluate<'a>(
        &self,
        poll: Option<&'a Poll>,
        poll_id: &str,
        option_ids: &[String],
        voter: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<&'a Poll> {
        let poll = check_poll_state(poll, poll_id, option_ids, voter, now)?;

        if one_vote_per_voter(poll)
            && let Some(voter) = voter
            && self.ledger.has_voted(&poll.id, voter).await?
        {
            return Err(AppError::AlreadyVoted);
        }

        Ok(poll)
    }
}
