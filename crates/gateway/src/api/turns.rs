//! Turn operations: take, skip, queue, and the DM's backtrack/redo/
//! initiative controls.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde::Deserialize;
use uuid::Uuid;

use wr_domain::{InitiativeEntry, TurnAction};

use crate::state::AppState;

use super::auth::AuthContext;
use super::error::ApiResult;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/rooms/:interaction_id/turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process one action for the caller's own entity. Validation failures
/// come back in `result`, not as an HTTP error.
pub async fn take_turn(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    Json(action): Json<TurnAction>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;
    let (result, game_state) = room.process_action(&auth.principal.user_id, action)?;
    Ok(Json(serde_json::json!({
        "result": result,
        "game_state": game_state,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/rooms/:interaction_id/turns/skip
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default, Deserialize)]
pub struct SkipBody {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn skip_turn(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    body: Option<Json<SkipBody>>,
) -> ApiResult<impl IntoResponse> {
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "skipped by player".to_owned());
    let room = state.manager.require_room(&interaction_id)?;
    let game_state = room.skip_turn(&auth.principal.user_id, &reason)?;
    Ok(Json(serde_json::json!({
        "skipped": true,
        "game_state": game_state,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/rooms/:interaction_id/turns/backtrack  (DM)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct BacktrackBody {
    pub turn_number: usize,
    /// Defaults to the room's current round.
    #[serde(default)]
    pub round_number: Option<u32>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn backtrack_turn(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    Json(body): Json<BacktrackBody>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;
    let round_number = body
        .round_number
        .unwrap_or_else(|| room.snapshot().game_state.round_number);
    let game_state = room.backtrack(&auth.principal.user_id, body.turn_number, round_number)?;
    Ok(Json(serde_json::json!({
        "backtracked": true,
        "game_state": game_state,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/rooms/:interaction_id/turns/redo  (DM)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct RedoBody {
    pub entity_id: String,
    pub actions: Vec<TurnAction>,
}

pub async fn redo_turn(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    Json(body): Json<RedoBody>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;
    let (success, game_state) =
        room.redo(&auth.principal.user_id, &body.entity_id, body.actions)?;
    Ok(Json(serde_json::json!({
        "success": success,
        "game_state": game_state,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /v1/rooms/:interaction_id/initiative  (DM)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct InitiativeBody {
    pub order: Vec<InitiativeEntry>,
}

pub async fn update_initiative(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    Json(body): Json<InitiativeBody>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;
    let game_state = room.update_initiative(&auth.principal.user_id, body.order)?;
    Ok(Json(serde_json::json!({
        "updated": true,
        "game_state": game_state,
    })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/rooms/:interaction_id/actions/queue
// DELETE /v1/rooms/:interaction_id/actions/queue/:action_id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn queue_action(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    Json(action): Json<TurnAction>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;
    let queued_action_id = room.queue_action(&auth.principal.user_id, action)?;
    Ok(Json(serde_json::json!({
        "queued_action_id": queued_action_id,
    })))
}

pub async fn cancel_queued_action(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((interaction_id, action_id)): Path<(String, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;
    let canceled = room.cancel_queued(&auth.principal.user_id, action_id)?;
    Ok(Json(serde_json::json!({ "canceled": canceled })))
}
