use std::path::PathBuf;
use std::time::Duration;

use crate::{Credentials, Error, Result, TradingMode};

pub const DEFAULT_BASE_URL: &str = "https://api.btcturk.com";
pub const DEFAULT_HISTORY_PATH: &str = "trade_history.csv";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange
    pub base_url: String,
    /// Required in live mode; paper mode never signs a request.
    pub credentials: Option<Credentials>,

    // Dashboard
    pub dashboard_token: String,
    pub dashboard_port: u16,

    // Trading
    pub trading_mode: TradingMode,
    pub poll_interval: Duration,
    /// Optional TOML preset for managed pairs, amount and profit target.
    pub trading_config_path: Option<PathBuf>,

    // Ledger
    pub history_path: PathBuf,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
                Error::Config(format!(
                    "required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let trading_mode = match required("TRADING_MODE")?.to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        let credentials = match (lookup("BTCTURK_API_KEY"), lookup("BTCTURK_API_SECRET")) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(Credentials::new(key, secret))
            }
            _ if trading_mode == TradingMode::Live => {
                return Err(Error::Config(
                    "BTCTURK_API_KEY and BTCTURK_API_SECRET are required in live mode".into(),
                ))
            }
            _ => None,
        };

        let dashboard_port = parse_optional::<u16, _>(&lookup, "DASHBOARD_PORT")?.unwrap_or(8080);
        let poll_interval = parse_optional::<u64, _>(&lookup, "POLL_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(Error::Config("POLL_INTERVAL_SECS must be at least 1".into()));
        }

        Ok(Config {
            base_url: lookup("BTCTURK_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            credentials,
            dashboard_token: required("DASHBOARD_TOKEN")?,
            dashboard_port,
            trading_mode,
            poll_interval,
            trading_config_path: lookup("TRADING_CONFIG_PATH").map(PathBuf::from),
            history_path: lookup("TRADE_HISTORY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_PATH)),
        })
    }
}

fn parse_optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("'{key}' has an invalid value: '{raw}'"))),
    }
}
