//! Chat endpoints.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use axum::Extension;
use serde::Deserialize;

use wr_chat::SendRequest;
use wr_domain::ChannelKind;

use crate::state::AppState;

use super::auth::AuthContext;
use super::error::ApiResult;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/rooms/:interaction_id/chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct SendChatBody {
    pub content: String,
    #[serde(rename = "type")]
    pub channel: ChannelKind,
    #[serde(default)]
    pub recipients: Option<Vec<String>>,
    #[serde(default)]
    pub entity_id: Option<String>,
}

pub async fn send_chat_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    Json(body): Json<SendChatBody>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;
    let message = room.send_chat(SendRequest {
        user_id: auth.principal.user_id.clone(),
        content: body.content,
        channel: body.channel,
        recipients: body.recipients,
        entity_id: body.entity_id,
    })?;
    Ok(Json(serde_json::json!({ "message": message })))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET /v1/rooms/:interaction_id/chat
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct ChatHistoryQuery {
    #[serde(default)]
    pub channel_type: Option<ChannelKind>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn get_chat_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
    Query(query): Query<ChatHistoryQuery>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;
    let limit = query.limit.clamp(1, 100);
    let (messages, total_count) =
        room.chat_history(&auth.principal.user_id, query.channel_type, limit);
    Ok(Json(serde_json::json!({
        "messages": messages,
        "total_count": total_count,
    })))
}
