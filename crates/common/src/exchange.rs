use async_trait::async_trait;

use crate::{Ack, Order, Result, Ticker};

/// Source of ticker snapshots. Every call is a fresh fetch; nothing is cached.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch one entry per tradable pair.
    ///
    /// A non-success response must surface as `Error::Network`, never as an
    /// empty snapshot.
    async fn fetch_snapshot(&self) -> Result<Vec<Ticker>>;
}

/// Abstraction over the order endpoint.
///
/// `BtcTurkClient` implements this for live trading.
/// `PaperClient` implements this for simulation.
///
/// Only `OrderExecutor` in `crates/engine` should call `submit_order`, so that
/// every acknowledged order is mirrored into the trade ledger.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Submit an order and return the exchange acknowledgement.
    async fn submit_order(&self, order: &Order) -> Result<Ack>;
}
