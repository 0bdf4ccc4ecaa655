use std::env;
use std::time::Duration;

/// Runtime configuration, resolved from environment variables with
/// the defaults named in the external-interfaces contract. Every
/// variable is optional; an unset or unparsable value falls back to
/// its default rather than failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_url: Option<String>,
    pub orchestrator_addr: String,
    pub heartbeat_interval: Duration,
    pub offline_threshold: chrono::Duration,
    pub visibility_timeout: chrono::Duration,
    pub recovery_interval: Duration,
    pub max_retries_default: u32,
    pub retention_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            db_url: env::var("DB_URL").ok(),
            orchestrator_addr: env_or("ORCHESTRATOR_ADDR", "127.0.0.1:8080"),
            heartbeat_interval: Duration::from_secs(env_secs_or("HEARTBEAT_INTERVAL", 30)),
            offline_threshold: chrono::Duration::seconds(env_secs_or("OFFLINE_THRESHOLD", 90) as i64),
            visibility_timeout: chrono::Duration::seconds(env_secs_or("VISIBILITY_TIMEOUT", 120) as i64),
            recovery_interval: Duration::from_secs(env_secs_or("RECOVERY_INTERVAL", 10)),
            max_retries_default: env_secs_or("MAX_RETRIES_DEFAULT", 3) as u32,
            retention_days: env_secs_or("RETENTION_DAYS", 30) as i64,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs_or(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_external_interfaces_contract() {
        // SAFETY: test runs single-threaded within this process and
        // cleans up after itself; avoids leaking into other tests via
        // `env::var` races on the shared process environment.
        env::remove_var("OFFLINE_THRESHOLD");
        env::remove_var("VISIBILITY_TIMEOUT");

        let config = Config::from_env();
        assert_eq!(config.offline_threshold, chrono::Duration::seconds(90));
        assert_eq!(config.visibility_timeout, chrono::Duration::seconds(120));
        assert_eq!(config.max_retries_default, 3);
    }
}
