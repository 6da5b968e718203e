use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};

use common::{Ack, BotEvent, Error, ExchangeClient, Order, OrderType, Result, TradeRecord};
use ledger::CsvLedger;

/// Submits orders to the exchange and mirrors every acknowledged order into
/// the trade ledger.
///
/// This is the ONLY component that calls `ExchangeClient::submit_order`.
/// A failed submission writes nothing to the ledger and is not retried.
#[derive(Clone)]
pub struct OrderExecutor {
    client: Arc<dyn ExchangeClient>,
    ledger: CsvLedger,
    event_tx: broadcast::Sender<BotEvent>,
}

impl OrderExecutor {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        ledger: CsvLedger,
        event_tx: broadcast::Sender<BotEvent>,
    ) -> Self {
        Self {
            client,
            ledger,
            event_tx,
        }
    }

    /// Place one order.
    ///
    /// Returns `Error::Storage` when the exchange acknowledged the order but
    /// the ledger append failed; the order is live in that case.
    pub async fn place_order(&self, order_type: OrderType, pair: &str, amount: f64) -> Result<Ack> {
        let order = Order::market(pair, order_type, amount);
        info!(pair = %order.pair, order_type = %order.order_type, amount = order.amount, "Executing order");

        let ack = match self.client.submit_order(&order).await {
            Ok(ack) => ack,
            Err(e) => {
                error!(pair = %order.pair, order_type = %order.order_type, error = %e, "Order submission failed");
                self.notify(BotEvent::OrderFailed {
                    order_type,
                    pair: order.pair.clone(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        // Announce only once the ledger row exists.
        if let Err(e) = self.record(&ack).await {
            error!(pair = %ack.pair, order_type = %ack.order_type, error = %e, "Order placed but not recorded in ledger");
            self.notify(BotEvent::OrderNotRecorded {
                order_type,
                pair: ack.pair.clone(),
                amount: ack.amount,
                error: e.to_string(),
            });
            return Err(e);
        }

        info!(pair = %ack.pair, order_type = %ack.order_type, amount = ack.amount, "Order placed");
        self.notify(BotEvent::OrderPlaced {
            order_type,
            pair: ack.pair.clone(),
            amount: ack.amount,
        });
        Ok(ack)
    }

    async fn record(&self, ack: &Ack) -> Result<()> {
        let record = TradeRecord::from_ack(ack);
        let ledger = self.ledger.clone();
        tokio::task::spawn_blocking(move || ledger.append(&record))
            .await
            .map_err(|e| Error::Storage(format!("ledger writer task failed: {e}")))?
    }

    fn notify(&self, event: BotEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
