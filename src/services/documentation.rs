use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the book club poll service.
#[openapi(
    info(title = "Book club poll", description = "Slot-machine selection and realtime voting"),
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::public::get_poll,
        crate::routes::public::get_votes,
        crate::routes::public::get_votes_summary,
        crate::routes::public::get_runoff_votes,
        crate::routes::public::get_runoff_votes_summary,
        crate::routes::public::put_votes,
        crate::routes::public::put_runoff_vote,
        crate::routes::public::get_cache,
        crate::routes::admin::get_selection,
        crate::routes::admin::spin,
        crate::routes::admin::stop_reel,
        crate::routes::admin::respin_reel,
        crate::routes::admin::reset_selection,
        crate::routes::admin::publish_selection,
        crate::routes::admin::reload_candidates,
        crate::routes::admin::clear_poll,
        crate::routes::admin::announce_winner,
        crate::routes::admin::start_runoff,
        crate::routes::admin::end_runoff,
        crate::routes::admin::new_session,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::VoteCountsEvent,
            crate::services::publish_cache::CacheEvent,
            crate::state::selection::ReelFrame,
            crate::outcome::Skip,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "public", description = "Voter-facing poll operations"),
        (name = "selection", description = "Slot-machine selection of the poll choices"),
        (name = "poll", description = "Poll lifecycle administration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/sse/public",
            "/public/poll",
            "/public/votes",
            "/public/runoff/vote",
            "/admin/selection/reels/{reel}/stop",
            "/admin/poll/winner",
            "/admin/session/new",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
