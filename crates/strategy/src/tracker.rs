//! Per-pair position tracking for the profit-target rule.
//!
//! Each managed pair is a two-state machine: FLAT until first observed,
//! OPEN until the last price reaches the exit target, then FLAT again.
//! [`plan`] is the pure half of a tick; [`PositionBook::apply`] commits a
//! decision once the order outcome is known.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{OrderType, Ticker};

use crate::config::{OpenPolicy, TradingParams};

/// Entry basis as a fraction of the ticker's average price.
///
/// The order endpoint does not report a fill price, so the basis is
/// synthetic rather than the price actually paid.
pub const ENTRY_DISCOUNT: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pair: String,
    pub entry_price: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn exit_price(&self, profit_target_pct: f64) -> f64 {
        self.entry_price * (1.0 + profit_target_pct / 100.0)
    }
}

/// What the trade loop should do for one pair on this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Open {
        pair: String,
        entry_price: f64,
    },
    Close {
        pair: String,
        entry_price: f64,
        exit_price: f64,
        last: f64,
    },
}

impl Decision {
    pub fn pair(&self) -> &str {
        match self {
            Decision::Open { pair, .. } | Decision::Close { pair, .. } => pair,
        }
    }

    pub fn order_type(&self) -> OrderType {
        match self {
            Decision::Open { .. } => OrderType::Buy,
            Decision::Close { .. } => OrderType::Sell,
        }
    }
}

/// Open positions keyed by pair. At most one position per pair.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    positions: HashMap<String, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pair: &str) -> Option<&Position> {
        self.positions.get(pair)
    }

    pub fn is_open(&self, pair: &str) -> bool {
        self.positions.contains_key(pair)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Snapshot of open positions, sorted by pair.
    pub fn positions(&self) -> Vec<Position> {
        let mut all: Vec<Position> = self.positions.values().cloned().collect();
        all.sort_by(|a, b| a.pair.cmp(&b.pair));
        all
    }

    /// Commit a decision given whether its order was confirmed.
    /// Returns true if the table changed.
    pub fn apply(&mut self, decision: &Decision, confirmed: bool, policy: OpenPolicy) -> bool {
        if !confirmed && policy == OpenPolicy::OnConfirmedBuy {
            return false;
        }
        match decision {
            Decision::Open { pair, entry_price } => {
                if self.positions.contains_key(pair) {
                    return false;
                }
                self.positions.insert(
                    pair.clone(),
                    Position {
                        pair: pair.clone(),
                        entry_price: *entry_price,
                        opened_at: Utc::now(),
                    },
                );
                true
            }
            Decision::Close { pair, .. } => self.positions.remove(pair).is_some(),
        }
    }
}

/// Decide entries and exits for one snapshot.
///
/// Tickers are visited in snapshot order. Unmanaged pairs are ignored, as are
/// managed pairs missing from the snapshot. A pair that is flat produces an
/// `Open` and is not checked for exit until the next tick.
pub fn plan(snapshot: &[Ticker], book: &PositionBook, params: &TradingParams) -> Vec<Decision> {
    let mut decisions = Vec::new();

    for ticker in snapshot.iter().filter(|t| params.manages(&t.pair)) {
        match book.get(&ticker.pair) {
            None => {
                // Duplicate rows in one snapshot must not open twice.
                if decisions.iter().any(|d: &Decision| d.pair() == ticker.pair) {
                    continue;
                }
                decisions.push(Decision::Open {
                    pair: ticker.pair.clone(),
                    entry_price: ticker.average * ENTRY_DISCOUNT,
                });
            }
            Some(position) => {
                let exit_price = position.exit_price(params.profit_target_pct);
                if ticker.last >= exit_price {
                    if decisions.iter().any(|d: &Decision| d.pair() == ticker.pair) {
                        continue;
                    }
                    decisions.push(Decision::Close {
                        pair: ticker.pair.clone(),
                        entry_price: position.entry_price,
                        exit_price,
                        last: ticker.last,
                    });
                } else {
                    debug!(
                        pair = %ticker.pair,
                        last = ticker.last,
                        target = exit_price,
                        "Holding position"
                    );
                }
            }
        }
    }

    decisions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(pair: &str, average: f64, last: f64) -> Ticker {
        Ticker {
            pair: pair.into(),
            last,
            high: last,
            low: last,
            volume: 1.0,
            average,
        }
    }

    fn params(pairs: &[&str], target: f64) -> TradingParams {
        TradingParams::new(pairs.iter().map(|p| p.to_string()).collect(), 0.5, target)
    }

    fn open_in(book: &mut PositionBook, pair: &str, entry_price: f64) {
        let decision = Decision::Open {
            pair: pair.into(),
            entry_price,
        };
        assert!(book.apply(&decision, true, OpenPolicy::OnConfirmedBuy));
    }

    #[test]
    fn first_observation_opens_at_discounted_average() {
        let book = PositionBook::new();
        let decisions = plan(&[ticker("BTCUSDT", 100.0, 96.0)], &book, &params(&["BTCUSDT"], 5.0));
        assert_eq!(decisions.len(), 1);
        match &decisions[0] {
            Decision::Open { pair, entry_price } => {
                assert_eq!(pair, "BTCUSDT");
                assert!((entry_price - 95.0).abs() < 1e-9);
            }
            other => panic!("expected Open, got {other:?}"),
        }
        assert_eq!(decisions[0].order_type(), OrderType::Buy);
    }

    #[test]
    fn unmanaged_pairs_are_ignored() {
        let book = PositionBook::new();
        let snapshot = [ticker("ETHUSDT", 10.0, 10.0), ticker("XRPUSDT", 1.0, 1.0)];
        assert!(plan(&snapshot, &book, &params(&["BTCUSDT"], 5.0)).is_empty());
    }

    #[test]
    fn holds_below_target_and_sells_at_target() {
        let mut book = PositionBook::new();
        open_in(&mut book, "BTCUSDT", 95.0);
        let p = params(&["BTCUSDT"], 5.0);

        assert!(plan(&[ticker("BTCUSDT", 100.0, 96.0)], &book, &p).is_empty());

        let decisions = plan(&[ticker("BTCUSDT", 100.0, 100.0)], &book, &p);
        match &decisions[..] {
            [Decision::Close {
                exit_price, last, ..
            }] => {
                assert!((exit_price - 99.75).abs() < 1e-9);
                assert_eq!(*last, 100.0);
            }
            other => panic!("expected one Close, got {other:?}"),
        }

        assert!(book.apply(&decisions[0], true, OpenPolicy::OnConfirmedBuy));
        assert!(!book.is_open("BTCUSDT"));
    }

    #[test]
    fn decisions_follow_snapshot_order() {
        let mut book = PositionBook::new();
        open_in(&mut book, "ETHUSDT", 10.0);
        let snapshot = [
            ticker("ETHUSDT", 10.0, 20.0),
            ticker("BTCUSDT", 100.0, 100.0),
            ticker("AVAXUSDT", 30.0, 30.0),
        ];
        let decisions = plan(&snapshot, &book, &params(&["AVAXUSDT", "BTCUSDT", "ETHUSDT"], 5.0));
        let pairs: Vec<&str> = decisions.iter().map(Decision::pair).collect();
        assert_eq!(pairs, vec!["ETHUSDT", "BTCUSDT", "AVAXUSDT"]);
    }

    #[test]
    fn duplicate_snapshot_rows_open_once() {
        let book = PositionBook::new();
        let snapshot = [ticker("BTCUSDT", 100.0, 100.0), ticker("BTCUSDT", 101.0, 101.0)];
        assert_eq!(plan(&snapshot, &book, &params(&["BTCUSDT"], 5.0)).len(), 1);
    }

    #[test]
    fn failed_buy_leaves_pair_flat_by_default() {
        let mut book = PositionBook::new();
        let decision = Decision::Open {
            pair: "BTCUSDT".into(),
            entry_price: 95.0,
        };
        assert!(!book.apply(&decision, false, OpenPolicy::OnConfirmedBuy));
        assert!(book.is_empty());
    }

    #[test]
    fn failed_buy_opens_phantom_position_under_legacy_policy() {
        let mut book = PositionBook::new();
        let decision = Decision::Open {
            pair: "BTCUSDT".into(),
            entry_price: 95.0,
        };
        assert!(book.apply(&decision, false, OpenPolicy::Unconditional));
        assert_eq!(book.get("BTCUSDT").map(|p| p.entry_price), Some(95.0));
    }

    #[test]
    fn failed_sell_keeps_position_by_default() {
        let mut book = PositionBook::new();
        open_in(&mut book, "BTCUSDT", 95.0);
        let close = Decision::Close {
            pair: "BTCUSDT".into(),
            entry_price: 95.0,
            exit_price: 99.75,
            last: 100.0,
        };
        assert!(!book.apply(&close, false, OpenPolicy::OnConfirmedBuy));
        assert!(book.is_open("BTCUSDT"));
        assert!(book.apply(&close, false, OpenPolicy::Unconditional));
        assert!(!book.is_open("BTCUSDT"));
    }

    #[test]
    fn reopening_an_open_pair_is_a_no_op() {
        let mut book = PositionBook::new();
        open_in(&mut book, "BTCUSDT", 95.0);
        let again = Decision::Open {
            pair: "BTCUSDT".into(),
            entry_price: 1.0,
        };
        assert!(!book.apply(&again, true, OpenPolicy::OnConfirmedBuy));
        assert_eq!(book.len(), 1);
        assert_eq!(book.positions()[0].entry_price, 95.0);
    }
}
