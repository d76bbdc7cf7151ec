use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::ledger::LedgerSettings;
use crate::market::{CacheSettings, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    /// Bearer token required on `/api` routes. Open when unset.
    pub api_token: Option<String>,

    // Database pool
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,

    // Ledger
    pub starting_balance: Decimal,

    // Price feed
    pub price_feed_timeout: Duration,
    pub quote_cache_ttl: Duration,
    pub quote_cache_capacity: usize,
    pub history_cache_ttl: Duration,
    pub history_cache_capacity: usize,
    pub read_retry_attempts: u32,

    // Analytics
    pub risk_lookback_days: i64,

    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let log_format = match env::var("LOG_FORMAT").unwrap_or_default().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),

            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            db_acquire_timeout: Duration::from_secs(parse_or("DB_ACQUIRE_TIMEOUT_SECS", 5)),

            starting_balance: parse_or("STARTING_BALANCE", Decimal::from(1_000_000)),

            price_feed_timeout: Duration::from_millis(parse_or("PRICE_FEED_TIMEOUT_MS", 2_000)),
            quote_cache_ttl: Duration::from_secs(parse_or("QUOTE_CACHE_TTL_SECS", 60)),
            quote_cache_capacity: parse_or("QUOTE_CACHE_CAPACITY", 1_000),
            history_cache_ttl: Duration::from_secs(parse_or("HISTORY_CACHE_TTL_SECS", 300)),
            history_cache_capacity: parse_or("HISTORY_CACHE_CAPACITY", 256),
            read_retry_attempts: parse_or("READ_RETRY_ATTEMPTS", 3),

            risk_lookback_days: parse_or("RISK_LOOKBACK_DAYS", 365),

            log_format,
        })
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            starting_balance: self.starting_balance,
            price_timeout: self.price_feed_timeout,
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            quote_ttl: self.quote_cache_ttl,
            quote_capacity: self.quote_cache_capacity,
            history_ttl: self.history_cache_ttl,
            history_capacity: self.history_cache_capacity,
            timeout: self.price_feed_timeout,
            retry: RetryPolicy {
                retries: self.read_retry_attempts,
                ..RetryPolicy::default()
            },
        }
    }
}

/// Parse an env var, falling back to `default` when unset or malformed.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            host: "0.0.0.0".into(),
            port: 8080,
            api_token: None,
            db_max_connections: 10,
            db_acquire_timeout: Duration::from_secs(5),
            starting_balance: Decimal::from(1_000_000),
            price_feed_timeout: Duration::from_millis(2_000),
            quote_cache_ttl: Duration::from_secs(60),
            quote_cache_capacity: 1_000,
            history_cache_ttl: Duration::from_secs(300),
            history_cache_capacity: 256,
            read_retry_attempts: 3,
            risk_lookback_days: 365,
            log_format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        env::set_var("PAPER_LEDGER_TEST_GARBAGE", "not-a-number");
        assert_eq!(parse_or("PAPER_LEDGER_TEST_GARBAGE", 7u32), 7);
        env::remove_var("PAPER_LEDGER_TEST_GARBAGE");
        assert_eq!(parse_or("PAPER_LEDGER_TEST_GARBAGE", 7u32), 7);
    }

    #[test]
    fn test_parse_or_reads_value() {
        env::set_var("PAPER_LEDGER_TEST_BALANCE", " 2500.50 ");
        let v: Decimal = parse_or("PAPER_LEDGER_TEST_BALANCE", Decimal::ZERO);
        assert_eq!(v, Decimal::new(250050, 2));
        env::remove_var("PAPER_LEDGER_TEST_BALANCE");
    }

    #[test]
    fn test_cache_settings_carry_retry_attempts() {
        let cfg = AppConfig {
            read_retry_attempts: 0,
            ..AppConfig::default()
        };
        assert_eq!(cfg.cache_settings().retry.retries, 0);
        assert_eq!(cfg.ledger_settings().price_timeout, Duration::from_secs(2));
    }
}
