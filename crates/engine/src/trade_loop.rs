use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use common::{BotEvent, Error, MarketData};
use strategy::{plan, Decision, OpenPolicy, PositionBook, TradingParams};

use crate::executor::OrderExecutor;
use crate::scheduler::TickSource;

/// Outcome of a single pass over the managed pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Market data could not be fetched; nothing else was attempted.
    pub skipped: bool,
    pub opened: Vec<String>,
    pub closed: Vec<String>,
    /// Pairs whose order failed this tick.
    pub failed: Vec<String>,
}

/// The position-tracking loop. Owns the position table exclusively.
pub struct TradeLoop {
    params: TradingParams,
    book: PositionBook,
    market: Arc<dyn MarketData>,
    executor: OrderExecutor,
    event_tx: broadcast::Sender<BotEvent>,
}

impl TradeLoop {
    pub fn new(
        params: TradingParams,
        market: Arc<dyn MarketData>,
        executor: OrderExecutor,
        event_tx: broadcast::Sender<BotEvent>,
    ) -> Self {
        if params.open_policy == OpenPolicy::Unconditional {
            warn!("Legacy open policy active: failed orders still change the position table");
        }
        Self {
            params,
            book: PositionBook::new(),
            market,
            executor,
            event_tx,
        }
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    /// Run one tick: fetch, decide, execute sequentially, commit.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        let snapshot = match self.market.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Market data unavailable, skipping tick");
                let _ = self.event_tx.send(BotEvent::MarketDataUnavailable {
                    error: e.to_string(),
                });
                report.skipped = true;
                return report;
            }
        };

        for decision in plan(&snapshot, &self.book, &self.params) {
            let pair = decision.pair().to_string();
            let result = self
                .executor
                .place_order(decision.order_type(), &pair, self.params.trade_amount)
                .await;

            // A ledger failure still means the exchange took the order.
            let confirmed = matches!(result, Ok(_) | Err(Error::Storage(_)));
            if !confirmed {
                report.failed.push(pair.clone());
            }

            if !self.book.apply(&decision, confirmed, self.params.open_policy) {
                continue;
            }
            match decision {
                Decision::Open { entry_price, .. } => {
                    info!(pair = %pair, entry_price, confirmed, "Position opened");
                    let _ = self.event_tx.send(BotEvent::PositionOpened {
                        pair: pair.clone(),
                        entry_price,
                    });
                    report.opened.push(pair);
                }
                Decision::Close {
                    entry_price, last, ..
                } => {
                    info!(pair = %pair, entry_price, exit_price = last, confirmed, "Position closed");
                    let _ = self.event_tx.send(BotEvent::PositionClosed {
                        pair: pair.clone(),
                        entry_price,
                        exit_price: last,
                    });
                    report.closed.push(pair);
                }
            }
        }

        report
    }

    /// Tick until `stop` flips to true or the tick source ends.
    ///
    /// Stop is only observed between ticks; a tick in progress always runs
    /// to completion. Returns the final position table.
    pub async fn run<T: TickSource>(mut self, mut ticks: T, mut stop: watch::Receiver<bool>) -> PositionBook {
        info!(pairs = ?self.params.pairs, amount = self.params.trade_amount, target_pct = self.params.profit_target_pct, "Trade loop running");

        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
                tick = ticks.next_tick() => {
                    if tick.is_none() {
                        break;
                    }
                }
            }

            let report = self.tick().await;
            if !report.opened.is_empty() || !report.closed.is_empty() || !report.failed.is_empty() {
                info!(
                    opened = report.opened.len(),
                    closed = report.closed.len(),
                    failed = report.failed.len(),
                    open_positions = self.book.len(),
                    "Tick complete"
                );
            }
        }

        info!(open_positions = self.book.len(), "Trade loop stopped");
        self.book
    }
}
