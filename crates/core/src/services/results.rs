//! Result aggregation.
//!
//! Percentages are derived from the counts on every read and never stored.

use polling_db::models::Poll;
use serde::Serialize;

/// Tally and share of a single option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResult {
    pub option_id: String,
    pub text: String,
    pub votes: i64,
    pub percentage: i64,
}

/// Aggregated results of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll_id: String,
    pub total_votes: i64,
    pub results: Vec<OptionResult>,
}

/// Whole-number percentages of `total` for each count.
///
/// Each share is rounded half away from zero. If that pushes the sum past
/// 100, points are taken back from the shares that were rounded up the
/// most, later options first. A zero total yields all zeros.
#[must_use]
pub fn percentages(counts: &[i64], total: i64) -> Vec<i64> {
    if total <= 0 {
        return vec![0; counts.len()];
    }

    // share = votes * 100 / total, rounded: floor((2 * votes * 100 + total) / (2 * total))
    let mut shares: Vec<i64> = counts
        .iter()
        .map(|&votes| (votes.max(0) * 200 + total) / (total * 2))
        .collect();

    let overshoot = shares.iter().sum::<i64>() - 100;
    if overshoot > 0 {
        // How far each share was rounded up, in units of 1/total percent
        let mut rounded_up: Vec<(usize, i64)> = counts
            .iter()
            .zip(&shares)
            .enumerate()
            .map(|(i, (&votes, &share))| (i, share * total - votes.max(0) * 100))
            .filter(|&(_, up)| up > 0)
            .collect();
        rounded_up.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));

        for (i, _) in rounded_up.into_iter().take(overshoot as usize) {
            shares[i] -= 1;
        }
    }

    shares
}

/// Aggregate the current counts of `poll`.
#[must_use]
pub fn aggregate(poll: &Poll) -> PollResults {
    let counts: Vec<i64> = poll.options.iter().map(|o| o.votes).collect();
    let shares = percentages(&counts, poll.total_votes);

    PollResults {
        poll_id: poll.id.clone(),
        total_votes: poll.total_votes,
        results: poll
            .options
            .iter()
            .zip(shares)
            .map(|(option, percentage)| OptionResult {
                option_id: option.id.clone(),
                text: option.text.clone(),
                votes: option.votes,
                percentage,
            })
            .collect(),
    }
}
