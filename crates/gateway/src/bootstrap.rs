//! AppState construction and background-task spawning shared by `serve`
//! and any embedding host.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;

use wr_broadcast::Broadcaster;
use wr_chat::ChatService;
use wr_domain::config::{Config, ConfigSeverity};
use wr_rooms::{PersistenceSender, RoomManager};

use crate::state::AppState;

/// Validate the config, initialize every subsystem, and return a fully
/// wired [`AppState`].
pub fn build_app_state(
    config: Arc<Config>,
    persistence: Option<PersistenceSender>,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Broadcaster ──────────────────────────────────────────────────
    let broadcaster = Arc::new(Broadcaster::new(config.broadcast.clone()));

    // ── Chat service (filter patterns compile here) ──────────────────
    let chat = Arc::new(
        ChatService::new(config.chat.clone()).context("initializing chat service")?,
    );

    // ── Room manager ─────────────────────────────────────────────────
    let manager = Arc::new(RoomManager::new(
        &config,
        Arc::clone(&broadcaster),
        chat,
        persistence,
    ));
    tracing::info!(
        inactivity_timeout_ms = config.rooms.inactivity_timeout_ms,
        turn_timeout_ms = config.engine.turn_timeout_ms,
        "room manager ready"
    );

    Ok(AppState {
        config,
        manager,
        broadcaster,
        started_at: Instant::now(),
    })
}

/// Spawn the periodic background tasks: the room inactivity sweeper and
/// the idle-subscription reaper.
pub fn spawn_background(state: &AppState) {
    state.manager.spawn_sweeper();
    state.broadcaster.spawn_cleanup();
    tracing::info!("background tasks started");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_config_boots() {
        let state = build_app_state(Arc::new(Config::default()), None).unwrap();
        assert_eq!(state.manager.room_count(), 0);
    }

    #[tokio::test]
    async fn invalid_config_refuses_to_boot() {
        let mut config = Config::default();
        config.chat.filter_patterns.push("([".into());
        assert!(build_app_state(Arc::new(config), None).is_err());
    }
}
