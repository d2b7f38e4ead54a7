use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        admin::{RunoffRequest, WinnerRequest},
        common::{AckResponse, ActionResponse},
    },
    error::AppError,
    services::{poll_bridge::{Published, PurgeReport}, poll_service, selection_service},
    state::{
        SharedState,
        poll::{Runoff, Winner},
        selection::{SelectionChange, SelectionSnapshot},
    },
};

/// Publisher endpoints driving the reels and the poll lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/selection", get(get_selection))
        .route("/admin/selection/spin", post(spin))
        .route("/admin/selection/reels/{reel}/stop", post(stop_reel))
        .route("/admin/selection/reels/{reel}/respin", post(respin_reel))
        .route("/admin/selection/reset", post(reset_selection))
        .route("/admin/selection/publish", post(publish_selection))
        .route("/admin/candidates/reload", post(reload_candidates))
        .route("/admin/poll/clear", post(clear_poll))
        .route("/admin/poll/winner", post(announce_winner))
        .route("/admin/poll/runoff", post(start_runoff))
        .route("/admin/poll/runoff/end", post(end_runoff))
        .route("/admin/session/new", post(new_session))
}

/// Current state of the reels.
#[utoipa::path(
    get,
    path = "/admin/selection",
    tag = "selection",
    responses((status = 200, description = "Reels, claims and pool status", body = SelectionSnapshot))
)]
pub async fn get_selection(State(state): State<SharedState>) -> Json<SelectionSnapshot> {
    Json(selection_service::snapshot(&state).await)
}

/// Spin all three reels. Queued if candidates are still loading.
#[utoipa::path(
    post,
    path = "/admin/selection/spin",
    tag = "selection",
    responses((status = 200, description = "Spin result", body = ActionResponse<SelectionChange>))
)]
pub async fn spin(State(state): State<SharedState>) -> Json<ActionResponse<SelectionChange>> {
    Json(selection_service::spin(&state).await.into())
}

/// Stop one spinning reel.
#[utoipa::path(
    post,
    path = "/admin/selection/reels/{reel}/stop",
    tag = "selection",
    params(("reel" = usize, Path, description = "Reel index, 0 to 2")),
    responses((status = 200, description = "Landing", body = ActionResponse<SelectionChange>))
)]
pub async fn stop_reel(
    State(state): State<SharedState>,
    Path(reel): Path<usize>,
) -> Json<ActionResponse<SelectionChange>> {
    Json(selection_service::stop_reel(&state, reel).await.into())
}

/// Release a stopped reel's candidate and spin it alone.
#[utoipa::path(
    post,
    path = "/admin/selection/reels/{reel}/respin",
    tag = "selection",
    params(("reel" = usize, Path, description = "Reel index, 0 to 2")),
    responses((status = 200, description = "Respin result", body = ActionResponse<SelectionChange>))
)]
pub async fn respin_reel(
    State(state): State<SharedState>,
    Path(reel): Path<usize>,
) -> Json<ActionResponse<SelectionChange>> {
    Json(selection_service::respin_reel(&state, reel).await.into())
}

/// Return every reel to idle and forget the persisted session.
#[utoipa::path(
    post,
    path = "/admin/selection/reset",
    tag = "selection",
    responses((status = 200, description = "Reset result", body = ActionResponse<SelectionChange>))
)]
pub async fn reset_selection(
    State(state): State<SharedState>,
) -> Json<ActionResponse<SelectionChange>> {
    Json(selection_service::reset(&state).await.into())
}

/// Publish the landed triple as the poll.
#[utoipa::path(
    post,
    path = "/admin/selection/publish",
    tag = "selection",
    responses(
        (status = 200, description = "Publish result", body = ActionResponse<Published>),
        (status = 503, description = "Realtime store unavailable")
    )
)]
pub async fn publish_selection(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse<Published>>, AppError> {
    Ok(Json(selection_service::publish(&state).await?.into()))
}

/// Fetch the candidate feed again.
#[utoipa::path(
    post,
    path = "/admin/candidates/reload",
    tag = "selection",
    responses(
        (status = 200, description = "Reload result", body = ActionResponse<SelectionChange>),
        (status = 503, description = "Candidate feed unavailable")
    )
)]
pub async fn reload_candidates(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse<SelectionChange>>, AppError> {
    Ok(Json(selection_service::reload_candidates(&state).await?.into()))
}

/// Withdraw the poll, the winner and the runoff, and purge every vote.
#[utoipa::path(
    post,
    path = "/admin/poll/clear",
    tag = "poll",
    responses(
        (status = 200, description = "Clear result", body = ActionResponse<PurgeReport>),
        (status = 503, description = "Realtime store unavailable")
    )
)]
pub async fn clear_poll(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse<PurgeReport>>, AppError> {
    Ok(Json(poll_service::clear_poll(&state).await?.into()))
}

/// Announce the winner.
#[utoipa::path(
    post,
    path = "/admin/poll/winner",
    tag = "poll",
    request_body = WinnerRequest,
    responses(
        (status = 200, description = "Winner stored", body = ActionResponse<Winner>),
        (status = 400, description = "Invalid payload"),
        (status = 503, description = "Realtime store unavailable")
    )
)]
pub async fn announce_winner(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<WinnerRequest>>,
) -> Result<Json<ActionResponse<Winner>>, AppError> {
    let outcome =
        poll_service::announce_winner(&state, &payload.book, &payload.suggested_by).await?;
    Ok(Json(outcome.into()))
}

/// Open a runoff.
#[utoipa::path(
    post,
    path = "/admin/poll/runoff",
    tag = "poll",
    request_body = RunoffRequest,
    responses(
        (status = 200, description = "Runoff opened", body = ActionResponse<Runoff>),
        (status = 400, description = "Invalid payload"),
        (status = 503, description = "Realtime store unavailable")
    )
)]
pub async fn start_runoff(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RunoffRequest>>,
) -> Result<Json<ActionResponse<Runoff>>, AppError> {
    let ends_at = payload.deadline()?;
    let max_one = payload.max_one.unwrap_or(false);
    let outcome = poll_service::start_runoff(&state, payload.choices, ends_at, max_one).await?;
    Ok(Json(outcome.into()))
}

/// Close the runoff.
#[utoipa::path(
    post,
    path = "/admin/poll/runoff/end",
    tag = "poll",
    responses(
        (status = 200, description = "Runoff closed", body = AckResponse),
        (status = 503, description = "Realtime store unavailable")
    )
)]
pub async fn end_runoff(State(state): State<SharedState>) -> Result<Json<AckResponse>, AppError> {
    Ok(Json(poll_service::end_runoff(&state).await?.into()))
}

/// Start a new session: clear the poll, flag the reset and idle the reels.
#[utoipa::path(
    post,
    path = "/admin/session/new",
    tag = "poll",
    responses(
        (status = 200, description = "Session reset", body = ActionResponse<PurgeReport>),
        (status = 503, description = "Realtime store unavailable")
    )
)]
pub async fn new_session(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse<PurgeReport>>, AppError> {
    Ok(Json(poll_service::new_session(&state).await?.into()))
}
