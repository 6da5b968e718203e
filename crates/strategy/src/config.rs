use std::path::Path;

use serde::{Deserialize, Serialize};

use common::{Error, Result};

/// What to do with the position table when an entry or exit order fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenPolicy {
    /// Open only after a confirmed BUY; close only after a confirmed SELL.
    #[default]
    OnConfirmedBuy,
    /// Legacy behavior: the table changes whether or not the order went
    /// through. A failed BUY leaves a phantom position open.
    Unconditional,
}

/// Operator-supplied parameters for one automated trading session.
///
/// Example `config/trading.toml`:
/// ```toml
/// pairs = ["BTCUSDT", "ETHUSDT"]
/// trade_amount = 0.001
/// profit_target_pct = 5.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingParams {
    /// Managed pair set. Not mutated by the trade loop.
    pub pairs: Vec<String>,
    /// Fixed amount for every BUY and SELL.
    pub trade_amount: f64,
    /// Exit once last price is this many percent above the entry basis.
    pub profit_target_pct: f64,
    #[serde(default)]
    pub open_policy: OpenPolicy,
}

impl TradingParams {
    pub fn new(pairs: Vec<String>, trade_amount: f64, profit_target_pct: f64) -> Self {
        Self {
            pairs,
            trade_amount,
            profit_target_pct,
            open_policy: OpenPolicy::default(),
        }
    }

    pub fn with_open_policy(mut self, policy: OpenPolicy) -> Self {
        self.open_policy = policy;
        self
    }

    pub fn manages(&self, pair: &str) -> bool {
        self.pairs.iter().any(|p| p == pair)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            return Err(Error::Config("select at least one pair to trade".into()));
        }
        if !self.trade_amount.is_finite() || self.trade_amount <= 0.0 {
            return Err(Error::Config(format!(
                "trade amount must be positive, got {}",
                self.trade_amount
            )));
        }
        if !self.profit_target_pct.is_finite() || self.profit_target_pct <= 0.0 {
            return Err(Error::Config(format!(
                "profit target must be a positive percentage, got {}",
                self.profit_target_pct
            )));
        }
        Ok(())
    }

    /// Load and validate a TOML preset.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read trading config at '{}': {e}", path.display()))
        })?;
        let params: TradingParams = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse trading config at '{}': {e}", path.display()))
        })?;
        params.validate()?;
        Ok(params)
    }
}
