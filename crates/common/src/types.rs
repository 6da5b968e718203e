use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One row of the exchange ticker. Produced fresh on every poll; only the
/// pair key carries identity across polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub pair: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub last: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub high: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub low: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub volume: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub average: f64,
}

/// BTCTurk has served these fields both as JSON numbers and as
/// string-encoded decimals.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Buy => write!(f, "BUY"),
            OrderType::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "BUY" => Ok(OrderType::Buy),
            "SELL" => Ok(OrderType::Sell),
            other => Err(format!("unknown order type '{other}'")),
        }
    }
}

/// An order to be submitted to the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub pair: String,
    pub order_type: OrderType,
    pub amount: f64,
}

impl Order {
    pub fn market(pair: impl Into<String>, order_type: OrderType, amount: f64) -> Self {
        Self {
            pair: pair.into(),
            order_type,
            amount,
        }
    }
}

/// Confirmation that the exchange accepted an order.
///
/// The fill price is not part of the acknowledgement: the order endpoint
/// only reports success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub pair: String,
    pub order_type: OrderType,
    pub amount: f64,
    pub placed_at: DateTime<Utc>,
}

impl Ack {
    pub fn for_order(order: &Order) -> Self {
        Self {
            pair: order.pair.clone(),
            order_type: order.order_type,
            amount: order.amount,
            placed_at: Utc::now(),
        }
    }
}

/// Immutable trade history entry. Owned by the ledger once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: NaiveDateTime,
    pub pair: String,
    pub order_type: OrderType,
    pub amount: f64,
}

impl TradeRecord {
    /// Record an acknowledged order, stamped in local wall-clock time.
    pub fn from_ack(ack: &Ack) -> Self {
        Self {
            timestamp: ack.placed_at.with_timezone(&Local).naive_local(),
            pair: ack.pair.clone(),
            order_type: ack.order_type,
            amount: ack.amount,
        }
    }
}

/// Key pair for the private API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Whether orders go to the real exchange or are simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// Current state of the trading engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
        }
    }
}

/// Operator-facing notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BotEvent {
    Started {
        pairs: Vec<String>,
    },
    Stopped,
    OrderPlaced {
        order_type: OrderType,
        pair: String,
        amount: f64,
    },
    OrderFailed {
        order_type: OrderType,
        pair: String,
        error: String,
    },
    /// The exchange accepted the order but the ledger append failed.
    OrderNotRecorded {
        order_type: OrderType,
        pair: String,
        amount: f64,
        error: String,
    },
    MarketDataUnavailable {
        error: String,
    },
    PositionOpened {
        pair: String,
        entry_price: f64,
    },
    PositionClosed {
        pair: String,
        entry_price: f64,
        exit_price: f64,
    },
}

impl BotEvent {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            BotEvent::OrderFailed { .. }
                | BotEvent::OrderNotRecorded { .. }
                | BotEvent::MarketDataUnavailable { .. }
        )
    }
}

impl std::fmt::Display for BotEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotEvent::Started { pairs } => {
                write!(f, "Automated trading started for {}", pairs.join(", "))
            }
            BotEvent::Stopped => write!(f, "Trading bot stopped"),
            BotEvent::OrderPlaced {
                order_type,
                pair,
                amount,
            } => write!(f, "{order_type} order placed for {pair} - Amount: {amount}"),
            BotEvent::OrderFailed {
                order_type,
                pair,
                error,
            } => write!(f, "Failed to execute {order_type} on {pair}: {error}"),
            BotEvent::OrderNotRecorded {
                order_type,
                pair,
                amount,
                error,
            } => write!(
                f,
                "{order_type} order for {pair} - Amount: {amount} is live but missing from trade history: {error}"
            ),
            BotEvent::MarketDataUnavailable { error } => {
                write!(f, "Failed to fetch market data: {error}")
            }
            BotEvent::PositionOpened { pair, entry_price } => {
                write!(f, "Position opened on {pair} at {entry_price:.8}")
            }
            BotEvent::PositionClosed {
                pair,
                entry_price,
                exit_price,
            } => write!(
                f,
                "Position closed on {pair}: entry {entry_price:.8}, exit {exit_price:.8}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticker_accepts_string_encoded_numbers() {
        let raw = r#"{"pair":"BTCUSDT","last":"96","high":"101.5","low":"90","volume":"12.25","average":"100"}"#;
        let ticker: Ticker = serde_json::from_str(raw).unwrap();
        assert_eq!(ticker.pair, "BTCUSDT");
        assert_eq!(ticker.last, 96.0);
        assert_eq!(ticker.high, 101.5);
        assert_eq!(ticker.average, 100.0);
    }

    #[test]
    fn ticker_accepts_plain_numbers_and_ignores_extra_fields() {
        let raw = r#"{"pair":"ETHTRY","pairNormalized":"ETH_TRY","last":3.5,"high":4,"low":3,"volume":1000,"average":3.25,"daily":0.1}"#;
        let ticker: Ticker = serde_json::from_str(raw).unwrap();
        assert_eq!(ticker.last, 3.5);
        assert_eq!(ticker.volume, 1000.0);
    }

    #[test]
    fn ticker_rejects_non_numeric_price() {
        let raw = r#"{"pair":"X","last":"abc","high":"1","low":"1","volume":"1","average":"1"}"#;
        assert!(serde_json::from_str::<Ticker>(raw).is_err());
    }

    #[test]
    fn order_type_round_trips_through_text() {
        assert_eq!(OrderType::Buy.to_string(), "BUY");
        assert_eq!("SELL".parse::<OrderType>().unwrap(), OrderType::Sell);
        assert!("HOLD".parse::<OrderType>().is_err());
        assert_eq!(serde_json::to_string(&OrderType::Sell).unwrap(), "\"SELL\"");
    }

    #[test]
    fn credentials_debug_never_shows_secret() {
        let creds = Credentials::new("public-key", "very-secret");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("public-key"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn order_placed_message_matches_operator_wording() {
        let event = BotEvent::OrderPlaced {
            order_type: OrderType::Buy,
            pair: "BTCUSDT".into(),
            amount: 0.001,
        };
        assert_eq!(event.to_string(), "BUY order placed for BTCUSDT - Amount: 0.001");
        assert!(!event.is_error());
    }

    #[test]
    fn unrecorded_order_is_an_error_that_says_it_is_live() {
        let event = BotEvent::OrderNotRecorded {
            order_type: OrderType::Sell,
            pair: "ETHUSDT".into(),
            amount: 2.0,
            error: "disk full".into(),
        };
        assert!(event.is_error());
        let message = event.to_string();
        assert!(message.contains("is live"));
        assert!(message.contains("disk full"));
    }
}
