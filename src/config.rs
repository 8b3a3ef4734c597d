use crate::error::{HoustonError, Result};
use std::time::Duration;

/// Address the coordinator is allowed to silently fall back from when the
/// networked store is unreachable.
pub const DEFAULT_REDIS_ADDR: &str = "localhost:6379";

#[derive(Debug, Clone)]
pub struct HoustonConfig {
    pub port: u16,
    pub redis_addr: String,
    pub redis_password: String,
    pub redis_db: i64,
    /// Admin password in plain text as configured; hashed and discarded at
    /// startup. Empty disables admin authentication.
    pub password: String,
    /// Missions older than this are removed by the janitor.
    pub mission_expiry: Duration,
    /// How often the janitor wakes up.
    pub monitor_interval: Duration,
    pub memory_limit_mib: i64,
}

impl Default for HoustonConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            redis_addr: DEFAULT_REDIS_ADDR.to_string(),
            redis_password: String::new(),
            redis_db: 0,
            password: String::new(),
            mission_expiry: Duration::from_secs(168 * 3600),
            monitor_interval: Duration::from_secs(12 * 3600),
            memory_limit_mib: 1024,
        }
    }
}

impl HoustonConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("HOUSTON_PORT") {
            config.port = port
                .parse()
                .map_err(|e| HoustonError::Configuration(format!("Invalid HOUSTON_PORT: {e}")))?;
        }

        if let Ok(addr) = std::env::var("REDIS_ADDR") {
            config.redis_addr = addr;
        }

        if let Ok(password) = std::env::var("REDIS_PASSWORD") {
            config.redis_password = password;
        }

        if let Ok(db) = std::env::var("REDIS_DB") {
            config.redis_db = db
                .parse()
                .map_err(|e| HoustonError::Configuration(format!("Invalid REDIS_DB: {e}")))?;
        }

        if let Ok(password) = std::env::var("HOUSTON_PASSWORD") {
            config.password = password;
        }

        if let Ok(hours) = std::env::var("HOUSTON_MISSION_EXPIRY") {
            let hours: u64 = hours.parse().map_err(|e| {
                HoustonError::Configuration(format!("Invalid HOUSTON_MISSION_EXPIRY: {e}"))
            })?;
            config.mission_expiry = Duration::from_secs(hours * 3600);
        }

        if let Ok(hours) = std::env::var("HOUSTON_MONITOR_INTERVAL") {
            let hours: u64 = hours.parse().map_err(|e| {
                HoustonError::Configuration(format!("Invalid HOUSTON_MONITOR_INTERVAL: {e}"))
            })?;
            config.monitor_interval = Duration::from_secs(hours * 3600);
        }

        if let Ok(limit) = std::env::var("HOUSTON_MEMORY_LIMIT_MIB") {
            config.memory_limit_mib = limit.parse().map_err(|e| {
                HoustonError::Configuration(format!("Invalid HOUSTON_MEMORY_LIMIT_MIB: {e}"))
            })?;
        }

        Ok(config)
    }
}
