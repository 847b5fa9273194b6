use std::time::Duration;

use crate::session::buffer::CapacityPolicy;

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_KEEPALIVE_URL: &str = "http://127.0.0.1:39099";

/// Policy knobs owned by whoever runs the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub capacity: CapacityPolicy,
    pub heartbeat_interval: Duration,
    pub auto_scroll: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: CapacityPolicy::default(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            auto_scroll: true,
        }
    }
}

pub struct Config {
    pub session: SessionConfig,
    pub keepalive_url: String,
    pub room_id: String,
    pub auth_token: Option<String>,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = CapacityPolicy::default();
        let high_water_mark =
            env_parse::<usize>("LIVE_HIGH_WATER_MARK").unwrap_or(defaults.high_water_mark());
        let trim_count = env_parse::<usize>("LIVE_TRIM_COUNT").unwrap_or(defaults.trim_count());
        let capacity = match CapacityPolicy::new(high_water_mark, trim_count) {
            Ok(policy) => policy,
            Err(e) => {
                tracing::warn!("{e}, using defaults");
                defaults
            }
        };

        let heartbeat_interval = env_parse::<u64>("LIVE_HEARTBEAT_INTERVAL")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS));

        let auto_scroll = std::env::var("LIVE_AUTO_SCROLL")
            .ok()
            .and_then(|v| parse_flag(&v))
            .unwrap_or(true);

        Self {
            session: SessionConfig {
                capacity,
                heartbeat_interval,
                auto_scroll,
            },
            keepalive_url: std::env::var("LIVE_KEEPALIVE_URL")
                .unwrap_or_else(|_| DEFAULT_KEEPALIVE_URL.to_string()),
            room_id: std::env::var("LIVE_ROOM_ID").unwrap_or_else(|_| "0".to_string()),
            auth_token: std::env::var("LIVE_AUTH_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}
