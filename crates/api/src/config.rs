//! Process configuration, read once from the environment at startup.
//!
//! Every field is resolved here and nowhere else — no handler or worker
//! re-reads an environment variable after `Config::from_env` returns. A
//! malformed value is a `FatalStartupError`, never a runtime surprise.

use aether_core::CommandCenterError;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_RETENTION_DAYS: i64 = 7;
const DEFAULT_DEDUP_WINDOW_SECONDS: i64 = 300;
const DEFAULT_MAX_DELIVERY_ATTEMPTS: i64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub event_db_path: String,
    pub alert_webhooks: Vec<String>,
    pub retention_interval_seconds: u64,
    pub retention_days: i64,
    pub dedup_window_seconds: i64,
    pub max_delivery_attempts: i64,
    pub bind_addr: String,
}

impl Config {
    /// Resolves every setting from the process environment. Fails fast: a
    /// missing `EVENT_DB_PATH` or an unparsable numeric override is a
    /// `FatalStartupError`, surfaced before any listener or worker starts.
    pub fn from_env() -> Result<Self, CommandCenterError> {
        let event_db_path = std::env::var("EVENT_DB_PATH")
            .map_err(|_| CommandCenterError::fatal_startup("EVENT_DB_PATH is not set"))?;

        let alert_webhooks = std::env::var("ALERT_WEBHOOKS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let retention_interval_seconds = parse_env_or(
            "EVENT_RETENTION_CRON_SECONDS",
            aether_infra::workers::retention::DEFAULT_RETENTION_INTERVAL_SECONDS,
        )?;
        let retention_days = parse_env_or("EVENT_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        let dedup_window_seconds = parse_env_or("ALERT_DEDUP_WINDOW_SECONDS", DEFAULT_DEDUP_WINDOW_SECONDS)?;
        let max_delivery_attempts = parse_env_or("ALERT_MAX_DELIVERY_ATTEMPTS", DEFAULT_MAX_DELIVERY_ATTEMPTS)?;

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        Ok(Self {
            event_db_path,
            alert_webhooks,
            retention_interval_seconds,
            retention_days,
            dedup_window_seconds,
            max_delivery_attempts,
            bind_addr,
        })
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, CommandCenterError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| CommandCenterError::fatal_startup(format!("{key} is not a valid number: {raw}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_or_falls_back_to_default_when_unset() {
        std::env::remove_var("DOES_NOT_EXIST_IN_ENV");
        let value: i64 = parse_env_or("DOES_NOT_EXIST_IN_ENV", 42).unwrap();
        assert_eq!(value, 42);
    }
}
