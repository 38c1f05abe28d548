use std::sync::Arc;
use std::time::Instant;

use wr_broadcast::Broadcaster;
use wr_domain::config::Config;
use wr_rooms::RoomManager;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub manager: Arc<RoomManager>,
    pub broadcaster: Arc<Broadcaster>,
    pub started_at: Instant,
}
