//! Live room updates over SSE.
//!
//! Each open stream holds one broadcaster subscription (counted against
//! the per-user cap) fed by an unbounded channel; dropping the stream
//! unsubscribes. The stream opens with a synthetic `participant_joined`
//! for the caller, then relays room events in emission order.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Extension;
use futures_util::stream::Stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use wr_broadcast::Broadcaster;
use wr_domain::{EventFilter, EventKind, GameEvent};

use crate::state::AppState;

use super::auth::AuthContext;
use super::error::ApiResult;

pub async fn room_updates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(interaction_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let room = state.manager.require_room(&interaction_id)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let subscription_id = state.broadcaster.subscribe(
        &interaction_id,
        EventFilter::All,
        Box::new(tx),
        Some(&auth.principal.user_id),
    )?;
    let guard = Unsubscriber {
        broadcaster: Arc::clone(&state.broadcaster),
        id: subscription_id,
    };

    // Synthetic open event so the client knows the stream is live.
    let entity_id = room
        .participant(&auth.principal.user_id)
        .map(|p| p.entity_id)
        .unwrap_or_default();
    let initial = GameEvent::new(
        &interaction_id,
        EventKind::ParticipantJoined {
            user_id: auth.principal.user_id.clone(),
            entity_id,
            participant_count: room.participant_count(),
        },
    );

    Ok(Sse::new(make_event_stream(initial, rx, guard)).keep_alive(KeepAlive::default()))
}

fn make_event_stream(
    initial: GameEvent,
    mut rx: mpsc::UnboundedReceiver<GameEvent>,
    guard: Unsubscriber,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        // Held for the life of the stream; dropping it unsubscribes.
        let _guard = guard;
        yield Ok(sse_event(&initial));
        while let Some(event) = rx.recv().await {
            yield Ok(sse_event(&event));
        }
    }
}

fn sse_event(event: &GameEvent) -> Event {
    Event::default()
        .event(event.event_type().as_str())
        .data(serde_json::to_string(event).unwrap_or_default())
}

struct Unsubscriber {
    broadcaster: Arc<Broadcaster>,
    id: Uuid,
}

impl Drop for Unsubscriber {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}
