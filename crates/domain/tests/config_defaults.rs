//! Config defaults must hold both for `Config::default()` and for a config
//! deserialized from an empty TOML document, so partial files behave.

use wr_domain::config::{Config, ConfigSeverity};

#[test]
fn default_tree_matches_documented_defaults() {
    let config = Config::default();

    assert_eq!(config.server.port, 4750);
    assert_eq!(config.server.host, "127.0.0.1");

    assert_eq!(config.rooms.inactivity_timeout_ms, 30 * 60 * 1000);
    assert_eq!(config.rooms.sweep_interval_ms, 60 * 1000);
    assert_eq!(config.rooms.completed_grace_ms, 5 * 60 * 1000);

    assert_eq!(config.engine.turn_timeout_ms, 90_000);
    assert!(config.engine.auto_advance);
    assert!(config.engine.validate_actions);
    assert!(config.engine.queue_enabled);
    assert_eq!(config.engine.max_turn_history, 1000);
    assert_eq!(config.engine.max_move_distance, 5);
    assert_eq!(config.engine.max_attack_range, 1);
    assert_eq!(config.engine.default_map_width, 20);
    assert_eq!(config.engine.default_map_height, 20);

    assert_eq!(config.broadcast.max_subscriptions_per_user, 10);
    assert_eq!(config.broadcast.max_batch_size, 50);
    assert_eq!(config.broadcast.batch_delay_ms, 100);
    assert_eq!(config.broadcast.subscription_timeout_ms, 5 * 60 * 1000);

    assert_eq!(config.chat.rate_limit_per_minute, 30);
    assert_eq!(config.chat.max_message_length, 1000);
    assert_eq!(config.chat.max_history, 500);
    assert!(config.chat.filter_enabled);
    assert!(config.chat.filter_patterns.is_empty());
}

#[test]
fn empty_toml_yields_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config.server.port, Config::default().server.port);
    assert_eq!(config.engine.turn_timeout_ms, 90_000);
    assert_eq!(config.chat.max_history, 500);
}

#[test]
fn partial_toml_overrides_only_named_fields() {
    let config: Config = toml::from_str(
        r#"
        [engine]
        turn_timeout_ms = 30000

        [chat]
        rate_limit_per_minute = 5
        "#,
    )
    .unwrap();
    assert_eq!(config.engine.turn_timeout_ms, 30_000);
    assert_eq!(config.chat.rate_limit_per_minute, 5);
    // Untouched sections keep defaults.
    assert_eq!(config.broadcast.max_batch_size, 50);
    assert_eq!(config.engine.max_move_distance, 5);
}

#[test]
fn default_config_validates_clean() {
    let issues = Config::default().validate();
    assert!(
        !issues.iter().any(|i| i.severity == ConfigSeverity::Error),
        "default config must not carry validation errors: {issues:?}"
    );
}

#[test]
fn bad_filter_pattern_is_an_error() {
    let mut config = Config::default();
    config.chat.filter_patterns.push("([unclosed".into());
    let issues = config.validate();
    assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error));
}
