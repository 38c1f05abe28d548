pub mod admin;
pub mod auth;
pub mod chat;
pub mod error;
pub mod rooms;
pub mod stream;
pub mod turns;

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// `/v1/health` is public; everything else requires a verified principal,
/// and the DM routes additionally require the DM role.
pub fn router() -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(admin::health));

    let dm = Router::new()
        .route("/v1/rooms/:interaction_id/pause", post(rooms::pause_interaction))
        .route("/v1/rooms/:interaction_id/resume", post(rooms::resume_interaction))
        .route(
            "/v1/rooms/:interaction_id/complete",
            post(rooms::complete_interaction),
        )
        .route(
            "/v1/rooms/:interaction_id/turns/backtrack",
            post(turns::backtrack_turn),
        )
        .route("/v1/rooms/:interaction_id/turns/redo", post(turns::redo_turn))
        .route(
            "/v1/rooms/:interaction_id/initiative",
            put(turns::update_initiative),
        )
        .route_layer(middleware::from_fn(auth::require_dm));

    let protected = Router::new()
        // Introspection
        .route("/v1/stats", get(admin::stats))
        .route("/v1/metrics", get(admin::metrics))
        // Membership & state
        .route("/v1/rooms/:interaction_id/join", post(rooms::join_room))
        .route("/v1/rooms/:interaction_id/leave", post(rooms::leave_room))
        .route("/v1/rooms/:interaction_id", get(rooms::get_room_state))
        // Turns
        .route("/v1/rooms/:interaction_id/turns", post(turns::take_turn))
        .route("/v1/rooms/:interaction_id/turns/skip", post(turns::skip_turn))
        // Action queue
        .route(
            "/v1/rooms/:interaction_id/actions/queue",
            post(turns::queue_action),
        )
        .route(
            "/v1/rooms/:interaction_id/actions/queue/:action_id",
            delete(turns::cancel_queued_action),
        )
        // Live updates
        .route("/v1/rooms/:interaction_id/updates", get(stream::room_updates))
        // Chat
        .route(
            "/v1/rooms/:interaction_id/chat",
            post(chat::send_chat_message).get(chat::get_chat_history),
        )
        .merge(dm)
        .route_layer(middleware::from_fn(auth::require_principal));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
