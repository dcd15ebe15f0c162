//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod eligibility;
pub mod locks;
pub mod poll;
pub mod results;
pub mod validation;
pub mod vote;

pub use auth::{Authenticator, StaticTokenAuthenticator};
pub use eligibility::EligibilityEvaluator;
pub use locks::PollLocks;
pub use poll::{CreatePollInput, PollService, UpdatePollInput};
pub use results::{OptionResult, PollResults, aggregate};
pub use vote::{VoteOutcome, VoteService, VoterStatus};
