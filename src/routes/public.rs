use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use axum_valid::Valid;

use crate::{
    dto::{
        common::ActionResponse,
        public::{
            PollStateResponse, RunoffVoteRequest, VotesRequest, VotesResponse,
            VotesSummaryResponse,
        },
    },
    error::AppError,
    services::{poll_service, publish_cache::CacheSnapshot},
    state::{
        SharedState,
        poll::{RunoffVoteRecord, VoteRecord},
    },
};

/// Voter-facing endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/poll", get(get_poll))
        .route("/public/votes", get(get_votes).put(put_votes))
        .route("/public/votes/summary", get(get_votes_summary))
        .route("/public/runoff/votes", get(get_runoff_votes))
        .route("/public/runoff/votes/summary", get(get_runoff_votes_summary))
        .route("/public/runoff/vote", put(put_runoff_vote))
        .route("/public/cache", get(get_cache))
}

/// Current shared poll state.
#[utoipa::path(
    get,
    path = "/public/poll",
    tag = "public",
    responses(
        (status = 200, description = "Normalized poll document", body = PollStateResponse),
        (status = 503, description = "Realtime store unavailable")
    )
)]
pub async fn get_poll(State(state): State<SharedState>) -> Result<Json<PollStateResponse>, AppError> {
    Ok(Json(poll_service::get_state(&state).await?.into()))
}

/// Primary-poll voters grouped by book.
#[utoipa::path(
    get,
    path = "/public/votes",
    tag = "public",
    responses((status = 200, description = "Voters per book", body = VotesResponse))
)]
pub async fn get_votes(State(state): State<SharedState>) -> Result<Json<VotesResponse>, AppError> {
    Ok(Json(poll_service::votes(&state).await?.into()))
}

/// Primary-poll vote counts.
#[utoipa::path(
    get,
    path = "/public/votes/summary",
    tag = "public",
    responses((status = 200, description = "Voters per book, counted", body = VotesSummaryResponse))
)]
pub async fn get_votes_summary(
    State(state): State<SharedState>,
) -> Result<Json<VotesSummaryResponse>, AppError> {
    Ok(Json(poll_service::votes_summary(&state).await?.into()))
}

/// Runoff voters grouped by book.
#[utoipa::path(
    get,
    path = "/public/runoff/votes",
    tag = "public",
    responses((status = 200, description = "Runoff voters per book", body = VotesResponse))
)]
pub async fn get_runoff_votes(
    State(state): State<SharedState>,
) -> Result<Json<VotesResponse>, AppError> {
    Ok(Json(poll_service::runoff_votes(&state).await?.into()))
}

/// Runoff vote counts.
#[utoipa::path(
    get,
    path = "/public/runoff/votes/summary",
    tag = "public",
    responses((status = 200, description = "Runoff voters per book, counted", body = VotesSummaryResponse))
)]
pub async fn get_runoff_votes_summary(
    State(state): State<SharedState>,
) -> Result<Json<VotesSummaryResponse>, AppError> {
    Ok(Json(poll_service::runoff_votes_summary(&state).await?.into()))
}

/// Replace the caller's primary-poll selection.
#[utoipa::path(
    put,
    path = "/public/votes",
    tag = "public",
    request_body = VotesRequest,
    responses(
        (status = 200, description = "Vote stored", body = ActionResponse<VoteRecord>),
        (status = 400, description = "Invalid payload"),
        (status = 503, description = "Realtime store unavailable")
    )
)]
pub async fn put_votes(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<VotesRequest>>,
) -> Result<Json<ActionResponse<VoteRecord>>, AppError> {
    let outcome = poll_service::set_votes(&state, &payload.voter, payload.books).await?;
    Ok(Json(outcome.into()))
}

/// Replace the caller's runoff pick.
#[utoipa::path(
    put,
    path = "/public/runoff/vote",
    tag = "public",
    request_body = RunoffVoteRequest,
    responses(
        (status = 200, description = "Runoff vote stored", body = ActionResponse<RunoffVoteRecord>),
        (status = 400, description = "Invalid payload"),
        (status = 503, description = "Realtime store unavailable")
    )
)]
pub async fn put_runoff_vote(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RunoffVoteRequest>>,
) -> Result<Json<ActionResponse<RunoffVoteRecord>>, AppError> {
    let outcome = poll_service::set_runoff_vote(&state, &payload.voter, &payload.book).await?;
    Ok(Json(outcome.into()))
}

/// What this deployment last published, as mirrored in its local cache.
#[utoipa::path(
    get,
    path = "/public/cache",
    tag = "public",
    responses((status = 200, description = "Local publish cache", body = CacheSnapshot))
)]
pub async fn get_cache(State(state): State<SharedState>) -> Json<CacheSnapshot> {
    Json(state.cache().snapshot())
}
