//! Room membership and lifecycle endpoints.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde::Deserialize;

use wr_domain::{EntityKind, Error};

use crate::state::AppState;

use super::auth::AuthContext;
use super::error::{ApiError, ApiResult};

fn require_id(value: &str, what: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{what} must be non-empty")).into());
    }
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/rooms/:interaction_id/join
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct JoinRoomBody {
    pub entity_id: String,
    pub entity_type: EntityKind,
}

/// Join the interaction, creating its room on first join with a default
/// waiting game state.
pub async fn join_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    Json(body): Json<JoinRoomBody>,
) -> ApiResult<impl IntoResponse> {
    require_id(&interaction_id, "interaction_id")?;
    require_id(&body.entity_id, "entity_id")?;

    let info = state.manager.join_room(
        &interaction_id,
        &auth.principal.user_id,
        &body.entity_id,
        body.entity_type,
        &auth.principal.session_id,
    )?;

    Ok(Json(serde_json::json!({
        "room_id": info.room_id,
        "participant_count": info.participant_count,
        "game_state": info.game_state,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/rooms/:interaction_id/leave
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn leave_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !state
        .manager
        .leave_room(&interaction_id, &auth.principal.user_id)
    {
        return Err(Error::NotFound(format!(
            "{} is not in interaction {interaction_id}",
            auth.principal.user_id
        ))
        .into());
    }
    Ok(Json(serde_json::json!({ "left": true })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/rooms/:interaction_id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_room_state(
    State(state): State<AppState>,
    Path(interaction_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;
    let snapshot = room.snapshot();
    Ok(Json(serde_json::json!({
        "room_id": snapshot.room_id,
        "status": snapshot.status,
        "participant_count": snapshot.participant_count,
        "game_state": snapshot.game_state,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/rooms/:interaction_id/pause | /resume | /complete  (DM)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
pub struct LifecycleBody {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn pause_interaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    body: Option<Json<LifecycleBody>>,
) -> ApiResult<impl IntoResponse> {
    let reason = body.and_then(|Json(b)| b.reason);
    state
        .manager
        .pause_room(&interaction_id, &auth.principal.user_id, reason)?;
    Ok(Json(serde_json::json!({ "paused": true })))
}

pub async fn resume_interaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state
        .manager
        .resume_room(&interaction_id, &auth.principal.user_id)?;
    Ok(Json(serde_json::json!({ "resumed": true })))
}

pub async fn complete_interaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    body: Option<Json<LifecycleBody>>,
) -> ApiResult<impl IntoResponse> {
    let reason = body.and_then(|Json(b)| b.reason);
    state
        .manager
        .complete_room(&interaction_id, &auth.principal.user_id, reason)?;
    Ok(Json(serde_json::json!({ "completed": true })))
}
