//! Poll endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use polling_common::AppResult;
use polling_core::{
    CreatePollInput, OptionResult, PollResults, UpdatePollInput, VoteOutcome, VoterStatus,
    aggregate,
};
use polling_db::models::{Poll, PollFilter, PollSort, PollStatusFilter};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, Paginated, Pagination},
};

const DEFAULT_PAGE_SIZE: u64 = 10;

/// Query parameters for poll listings.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListPollsQuery {
    #[validate(range(min = 1))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    #[validate(length(max = 200))]
    pub search: Option<String>,
    pub filter: Option<PollStatusFilter>,
    pub sort: Option<PollSort>,
    pub created_by: Option<String>,
    pub is_active: Option<bool>,
}

impl ListPollsQuery {
    fn page(&self) -> u64 {
        self.page.unwrap_or(1)
    }

    fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    fn to_filter(&self) -> PollFilter {
        PollFilter {
            created_by: self.created_by.clone(),
            is_active: self.is_active,
            status: self.filter.unwrap_or_default(),
            search: self.search.clone(),
            sort: self.sort.unwrap_or_default(),
            offset: (self.page() - 1) * self.limit(),
            limit: Some(self.limit()),
        }
    }
}

/// Vote request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[validate(length(min = 1, max = 10, message = "Select between one and ten options"))]
    pub option_ids: Vec<String>,
}

/// A poll with its derived state and the caller's standing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDetailResponse {
    #[serde(flatten)]
    pub poll: Poll,
    pub is_expired: bool,
    pub results: Vec<OptionResult>,
    pub voter_status: VoterStatus,
}

async fn list(state: &AppState, query: &ListPollsQuery) -> AppResult<Paginated<Poll>> {
    let page = state.poll_service.list(&query.to_filter()).await?;
    Ok(Paginated {
        data: page.polls,
        pagination: Pagination::new(query.page(), query.limit(), page.total),
    })
}

/// List polls.
async fn list_polls(
    State(state): State<AppState>,
    Query(query): Query<ListPollsQuery>,
) -> AppResult<ApiResponse<Paginated<Poll>>> {
    query.validate()?;
    Ok(ApiResponse::ok(list(&state, &query).await?))
}

/// List the caller's own polls.
async fn my_polls(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(mut query): Query<ListPollsQuery>,
) -> AppResult<ApiResponse<Paginated<Poll>>> {
    query.validate()?;
    query.created_by = Some(user.id);
    Ok(ApiResponse::ok(list(&state, &query).await?))
}

/// Create a poll.
async fn create_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreatePollInput>,
) -> AppResult<ApiResponse<Poll>> {
    let poll = state.poll_service.create(&user.id, input).await?;
    Ok(ApiResponse::created(poll).with_message("Poll created successfully"))
}

/// Get a poll with results and the caller's voter status.
async fn get_poll(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollDetailResponse>> {
    let poll = state.poll_service.get(&id).await?;
    let voter_status = state
        .vote_service
        .voter_status(&poll, user.as_ref().map(|u| u.id.as_str()))
        .await?;

    Ok(ApiResponse::ok(PollDetailResponse {
        is_expired: poll.is_expired_at(Utc::now()),
        results: aggregate(&poll).results,
        voter_status,
        poll,
    }))
}

/// Update a poll.
async fn update_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdatePollInput>,
) -> AppResult<ApiResponse<Poll>> {
    let poll = state.poll_service.update(&id, &user.id, input).await?;
    Ok(ApiResponse::ok(poll).with_message("Poll updated successfully"))
}

/// Delete a poll.
async fn delete_poll(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    state.poll_service.delete(&id, &user.id).await?;
    Ok(ApiResponse::message("Poll deleted successfully"))
}

/// Vote on a poll.
async fn vote(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<VoteOutcome>> {
    req.validate()?;

    let outcome = state
        .vote_service
        .vote(&id, req.option_ids, user.as_ref().map(|u| u.id.as_str()))
        .await?;
    Ok(ApiResponse::ok(outcome).with_message("Vote recorded successfully"))
}

/// Current results of a poll.
async fn poll_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollResults>> {
    Ok(ApiResponse::ok(state.vote_service.results(&id).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_polls).post(create_poll))
        .route("/mine", get(my_polls))
        .route(
            "/{id}",
            get(get_poll).patch(update_poll).delete(delete_poll),
        )
        .route("/{id}/vote", post(vote))
        .route("/{id}/results", get(poll_results))
}
