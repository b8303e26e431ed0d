//! Tests for the reconnect policy and its configuration format.

use std::time::Duration;

use ircloop_session::SessionConfig;

#[test]
fn test_defaults() {
    let cfg = SessionConfig::default();
    assert_eq!(cfg.connect_timeout(), Duration::from_secs(10));
    assert_eq!(cfg.max_reconnect_attempts, 5);
    assert!(cfg.reconnect_enabled());
}

#[test]
fn test_backoff_doubles_and_caps() {
    let cfg = SessionConfig {
        reconnect_base_delay_ms: 1_000,
        reconnect_max_delay_ms: 5_000,
        reconnect_jitter_ms: 0,
        ..SessionConfig::default()
    };
    let delays: Vec<u64> = (1..=5)
        .map(|n| cfg.backoff_delay(n).as_millis() as u64)
        .collect();
    assert_eq!(delays, vec![1_000, 2_000, 4_000, 5_000, 5_000]);
}

#[test]
fn test_backoff_saturates_with_huge_settings() {
    let cfg = SessionConfig {
        reconnect_base_delay_ms: u64::MAX,
        reconnect_max_delay_ms: u64::MAX,
        reconnect_jitter_ms: u64::MAX,
        ..SessionConfig::default()
    };
    for attempt in [1, 2, 40] {
        assert_eq!(cfg.backoff_delay(attempt), Duration::from_millis(u64::MAX));
    }
}

#[test]
fn test_backoff_jitter_stays_in_range() {
    let cfg = SessionConfig {
        reconnect_base_delay_ms: 100,
        reconnect_jitter_ms: 50,
        ..SessionConfig::default()
    };
    for _ in 0..100 {
        let d = cfg.backoff_delay(1);
        assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(150));
    }
}

#[test]
fn test_huge_attempt_number_does_not_overflow() {
    let cfg = SessionConfig {
        reconnect_jitter_ms: 0,
        ..SessionConfig::default()
    };
    assert_eq!(cfg.backoff_delay(u32::MAX), Duration::from_millis(60_000));
}

#[test]
fn test_deserialize_partial_config_uses_defaults() {
    let cfg: SessionConfig =
        serde_json::from_str(r#"{ "max_reconnect_attempts": 0 }"#).unwrap();
    assert!(!cfg.reconnect_enabled());
    assert_eq!(cfg.connect_timeout_secs, 10);
    assert_eq!(cfg.reconnect_base_delay_ms, 2_000);
}

#[test]
fn test_json_round_trip() {
    let cfg = SessionConfig {
        connect_timeout_secs: 3,
        ..SessionConfig::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    let back: SessionConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}
