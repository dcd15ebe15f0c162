//! Storage-neutral poll records.
//!
//! These are the types the [`PollStore`](crate::repositories::PollStore) and
//! [`VoteLedger`](crate::repositories::VoteLedger) traits exchange, so the
//! core never depends on a particular backend's row layout.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single answer option of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    /// Option ID, unique across polls.
    pub id: String,
    /// Trimmed option text.
    pub text: String,
    /// Votes received.
    pub votes: i64,
}

/// A poll with its ordered options and running tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    /// Poll ID.
    pub id: String,
    /// Poll title.
    pub title: String,
    /// Optional longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Options in display order.
    pub options: Vec<PollOption>,
    /// Creator user ID.
    pub created_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change to content or counts.
    pub updated_at: DateTime<Utc>,
    /// When the poll stops accepting votes (none for no expiration)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the poll accepts votes at all.
    pub is_active: bool,
    /// Whether a vote may pick several options.
    pub allow_multiple_votes: bool,
    /// Whether votes are recorded without a voter.
    pub is_anonymous: bool,
    /// Sum of all option vote counts
    pub total_votes: i64,
}

impl Poll {
    /// Whether the poll's expiry lies strictly before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Whether `option_id` names one of this poll's options.
    #[must_use]
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    /// Sum of the per-option counts.
    #[must_use]
    pub fn option_vote_sum(&self) -> i64 {
        self.options.iter().map(|o| o.votes).sum()
    }
}

/// One accepted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Vote ID.
    pub id: String,
    /// Poll voted on.
    pub poll_id: String,
    /// Chosen options, in request order.
    pub option_ids: Vec<String>,
    /// Absent for anonymous polls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// When the vote was accepted.
    pub created_at: DateTime<Utc>,
}

/// An authenticated user, as far as this service cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
    /// Last account change.
    pub updated_at: DateTime<Utc>,
}

/// Status-based category filter for poll listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollStatusFilter {
    /// No status restriction.
    #[default]
    All,
    /// Active and not yet expired.
    Active,
    /// Past their expiry.
    Expired,
    /// Anonymous polls only.
    Anonymous,
}

/// Ordering for poll listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollSort {
    /// Most recently created first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
    /// Highest total first.
    MostVotes,
    /// Earliest expiry first; polls without expiry go last.
    #[serde(alias = "ending-soon")]
    SoonestExpiry,
}

impl PollSort {
    /// Compare two polls under this ordering.
    ///
    /// Ties fall back to newest first so pagination is stable.
    #[must_use]
    pub fn compare(self, a: &Poll, b: &Poll) -> Ordering {
        let primary = match self {
            Self::Newest => b.created_at.cmp(&a.created_at),
            Self::Oldest => a.created_at.cmp(&b.created_at),
            Self::MostVotes => b.total_votes.cmp(&a.total_votes),
            Self::SoonestExpiry => match (a.expires_at, b.expires_at) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        primary
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }
}

/// Listing criteria. Pagination is applied after filtering.
#[derive(Debug, Clone, Default)]
pub struct PollFilter {
    /// Only polls by this creator.
    pub created_by: Option<String>,
    /// Only polls with this `is_active` flag.
    pub is_active: Option<bool>,
    /// Status category.
    pub status: PollStatusFilter,
    /// Case-insensitive substring matched against title and description.
    pub search: Option<String>,
    /// Result ordering.
    pub sort: PollSort,
    /// Matches to skip.
    pub offset: u64,
    /// Page size; `None` returns every match.
    pub limit: Option<u64>,
}

impl PollFilter {
    /// Whether `poll` passes every criterion at time `now`.
    #[must_use]
    pub fn matches(&self, poll: &Poll, now: DateTime<Utc>) -> bool {
        if let Some(ref owner) = self.created_by
            && poll.created_by != *owner
        {
            return false;
        }
        if let Some(active) = self.is_active
            && poll.is_active != active
        {
            return false;
        }

        let status_ok = match self.status {
            PollStatusFilter::All => true,
            PollStatusFilter::Active => poll.is_active && !poll.is_expired_at(now),
            PollStatusFilter::Expired => poll.is_expired_at(now),
            PollStatusFilter::Anonymous => poll.is_anonymous,
        };
        if !status_ok {
            return false;
        }

        match self.search_pattern() {
            Some(needle) => {
                poll.title.to_lowercase().contains(&needle)
                    || poll
                        .description
                        .as_ref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }

    /// Lower-cased search term, or `None` when the search is blank.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// One page of a poll listing.
#[derive(Debug, Clone, Default)]
pub struct PollPage {
    /// The requested page.
    pub polls: Vec<Poll>,
    /// Number of polls matching the filter before pagination.
    pub total: u64,
}
