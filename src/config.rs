//! Layered configuration: compiled-in defaults, an optional TOML file, then
//! `COLLECTOR_`-prefixed environment overrides (double underscore nests,
//! e.g. `COLLECTOR_DATABASE__HOST`).

use crate::domain::Timeframe;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default = "default_db_password")]
    pub password: String,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_db_sslmode")]
    pub sslmode: String,
}

fn default_db_host() -> String {
    "localhost".into()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_user() -> String {
    "postgres".into()
}
fn default_db_password() -> String {
    "postgres".into()
}
fn default_db_name() -> String {
    "poloniex".into()
}
fn default_db_sslmode() -> String {
    "disable".into()
}

impl DatabaseConfig {
    /// `database.name` resolves to the SQLite file stem; `host` doubles as
    /// the containing directory. See DESIGN.md for why the other
    /// Postgres-flavored keys are accepted but not load-bearing.
    pub fn sqlite_path(&self) -> std::path::PathBuf {
        std::path::PathBuf::from(&self.host).join(format!("{}.db", self.name))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_rest_url")]
    pub rest_url: String,
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,
    #[serde(default = "default_timeframes")]
    pub timeframes: Vec<String>,
}

fn default_ws_url() -> String {
    "wss://ws.poloniex.com/ws/public".into()
}
fn default_rest_url() -> String {
    "https://api.poloniex.com".into()
}
fn default_pairs() -> Vec<String> {
    ["BTC_USDT", "ETH_USDT", "TRX_USDT", "DOGE_USDT", "BCH_USDT"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_timeframes() -> Vec<String> {
    ["MINUTE_1", "MINUTE_15", "HOUR_1", "DAY_1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_pool_size() -> usize {
    10
}
fn default_queue_capacity() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// RFC 3339 instant backfill resumes from when a pair/timeframe has no
    /// persisted history yet.
    #[serde(default = "default_backfill_anchor")]
    pub backfill_anchor: String,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_backfill_anchor() -> String {
    "2024-12-01T00:00:00Z".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub poloniex: ExchangeConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: default_db_password(),
            name: default_db_name(),
            sslmode: default_db_sslmode(),
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            ws_url: default_ws_url(),
            rest_url: default_rest_url(),
            pairs: default_pairs(),
            timeframes: default_timeframes(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            pool_size: default_pool_size(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: default_log_level(),
            backfill_anchor: default_backfill_anchor(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Loads defaults, then `path` if it exists, then `COLLECTOR_*` env vars.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        } else {
            builder = builder.add_source(config::File::with_name("config").required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("COLLECTOR")
                .separator("__")
                .try_parsing(true),
        );

        let raw = builder.build()?;
        let cfg: AppConfig = raw.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poloniex.pairs.is_empty() {
            return Err(ConfigError::Invalid("poloniex.pairs must not be empty".into()));
        }
        if self.poloniex.timeframes.is_empty() {
            return Err(ConfigError::Invalid(
                "poloniex.timeframes must not be empty".into(),
            ));
        }
        for tf in &self.poloniex.timeframes {
            if Timeframe::from_exchange(tf).is_none() {
                return Err(ConfigError::Invalid(format!("unknown timeframe: {tf}")));
            }
        }
        if self.worker.pool_size == 0 {
            return Err(ConfigError::Invalid("worker.pool_size must be > 0".into()));
        }
        if self.worker.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "worker.queue_capacity must be > 0".into(),
            ));
        }
        let anchor = chrono::DateTime::parse_from_rfc3339(&self.general.backfill_anchor)
            .map_err(|e| ConfigError::Invalid(format!("general.backfill_anchor: {e}")))?;
        if anchor.timestamp_millis() > chrono::Utc::now().timestamp_millis() {
            return Err(ConfigError::Invalid(
                "general.backfill_anchor must not be in the future".into(),
            ));
        }
        Ok(())
    }

    pub fn timeframes(&self) -> Vec<Timeframe> {
        self.poloniex
            .timeframes
            .iter()
            .filter_map(|s| Timeframe::from_exchange(s))
            .collect()
    }

    pub fn backfill_anchor_ms(&self) -> i64 {
        chrono::DateTime::parse_from_rfc3339(&self.general.backfill_anchor)
            .expect("validated at load time")
            .timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_file_is_absent() {
        let cfg = AppConfig::load(Some("/nonexistent/path/to/config")).expect("defaults load");
        assert_eq!(cfg.worker.pool_size, 10);
        assert_eq!(cfg.poloniex.pairs.len(), 5);
        assert_eq!(cfg.general.backfill_anchor, "2024-12-01T00:00:00Z");
    }

    #[test]
    fn rejects_unknown_timeframe() {
        let mut cfg = AppConfig::load(Some("/nonexistent/path/to/config")).unwrap();
        cfg.poloniex.timeframes = vec!["MINUTE_5".into()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_pairs() {
        let mut cfg = AppConfig::load(Some("/nonexistent/path/to/config")).unwrap();
        cfg.poloniex.pairs.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_pool_size() {
        let mut cfg = AppConfig::load(Some("/nonexistent/path/to/config")).unwrap();
        cfg.worker.pool_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_backfill_anchor_in_the_future() {
        let mut cfg = AppConfig::load(Some("/nonexistent/path/to/config")).unwrap();
        let future = chrono::Utc::now() + chrono::Duration::days(1);
        cfg.general.backfill_anchor = future.to_rfc3339();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn environment_override_wins_over_default() {
        // SAFETY: test-only, no other test in this module reads this var.
        unsafe {
            std::env::set_var("COLLECTOR_WORKER__POOL_SIZE", "42");
        }
        let cfg = AppConfig::load(Some("/nonexistent/path/to/config")).unwrap();
        assert_eq!(cfg.worker.pool_size, 42);
        unsafe {
            std::env::remove_var("COLLECTOR_WORKER__POOL_SIZE");
        }
    }
}
